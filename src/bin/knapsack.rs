use std::io::IsTerminal;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use knapsack_search::app::App;
use knapsack_search::config::{ConfigLoader, SearchSettings};
use knapsack_search::domain::{Keyword, SearchRequest, SearchType};
use knapsack_search::error::KnapsackError;
use knapsack_search::export;
use knapsack_search::knapsack::KnapsackHttpClient;
use knapsack_search::output::{JsonOutput, LineOutput, OutputMode, print_summary};
use knapsack_search::tui::Tui;

/// Search the KNApSAcK Core database by metabolite or organism.
///
/// Writes a CSV with KNApSAcK ID, name(s), CAS number and SMILES for every
/// compound found. Run without arguments for the interactive form.
#[derive(Parser)]
#[command(name = "knapsack")]
#[command(version, author, about)]
struct Cli {
    /// Type of search
    #[arg(value_enum)]
    search_type: Option<SearchType>,

    /// Term to search for (e.g. "flavones", "Bacillus")
    #[arg(short = 'k', long)]
    keyword: Option<String>,

    /// CSV destination (default: results_KNApSAcK_<type>_<keyword>.csv)
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// JSON config file (default: ./knapsack.json, then the user config dir)
    #[arg(long)]
    config: Option<String>,

    /// Stop after this many result pages
    #[arg(long)]
    max_pages: Option<usize>,

    /// Delay between consecutive requests in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Print the result set as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Never open the terminal UI, even on a TTY
    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<KnapsackError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KnapsackError) -> u8 {
    if error.is_input_error() {
        2
    } else if error.is_fetch_error() {
        3
    } else {
        1
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.non_interactive || cli.json || !std::io::stdout().is_terminal() {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter(&cli, output_mode))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = resolve_settings(&cli)?;

    match (cli.search_type, cli.keyword.as_deref()) {
        (Some(search_type), Some(keyword)) => {
            let request = SearchRequest::new(search_type, keyword.parse::<Keyword>()?);
            let output = output_path(cli.output.as_deref(), &request);
            let app = App::new(KnapsackHttpClient::new(&settings)?, settings)?;
            if cli.json {
                let outcome = app.run(&request, Some(&output), &JsonOutput)?;
                JsonOutput::print_outcome(&outcome).into_diagnostic()?;
            } else {
                let outcome = app.run(&request, Some(&output), &LineOutput)?;
                print_summary(&outcome);
            }
            Ok(())
        }
        (None, None) if opens_tui(&cli, output_mode) => {
            run_interactive(settings, cli.output)
        }
        (Some(_), None) => Err(KnapsackError::EmptyKeyword.into()),
        _ => Err(miette::Report::msg(
            "search type and keyword are required (try `knapsack organism -k Baccharis`)",
        )),
    }
}

fn opens_tui(cli: &Cli, output_mode: OutputMode) -> bool {
    cli.search_type.is_none()
        && cli.keyword.is_none()
        && matches!(output_mode, OutputMode::Interactive)
}

/// Stderr logging stays off under the TUI unless `RUST_LOG` asks for it;
/// skipped rows and the page limit reach the event log instead.
fn default_log_filter(cli: &Cli, output_mode: OutputMode) -> &'static str {
    if opens_tui(cli, output_mode) { "off" } else { "warn" }
}

fn run_interactive(settings: SearchSettings, output: Option<String>) -> miette::Result<()> {
    let mut tui = Tui::new();
    let Some(request) = tui.form()? else {
        return Ok(());
    };
    let output = output_path(output.as_deref(), &request);
    let app = App::new(KnapsackHttpClient::new(&settings)?, settings)?;

    let worker_request = request.clone();
    let worker_output = output.clone();
    let outcome = tui.run(move |sink| app.run(&worker_request, Some(&worker_output), sink))?;
    tui.finish(&outcome)?;
    print_summary(&outcome);
    Ok(())
}

fn resolve_settings(cli: &Cli) -> Result<SearchSettings, KnapsackError> {
    let mut settings = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(max_pages) = cli.max_pages {
        settings.max_pages = max_pages;
    }
    if let Some(delay_ms) = cli.delay_ms {
        settings.request_delay_ms = delay_ms;
    }
    settings.validate()?;
    Ok(settings)
}

fn output_path(output: Option<&str>, request: &SearchRequest) -> Utf8PathBuf {
    output
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| export::default_output_path(request))
}
