use std::io::{self, Write};
use std::time::Duration;

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, SearchOutcome, format_elapsed};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_outcome(outcome: &SearchOutcome) -> io::Result<()> {
        Self::print_json(outcome)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Plain-text progress on stderr for non-TUI runs.
pub struct LineOutput;

impl ProgressSink for LineOutput {
    fn event(&self, event: ProgressEvent) {
        if let Some((done, total)) = event.progress {
            if total > 0 {
                eprint!("\rCompounds: {done}/{total}");
                if done == total {
                    eprintln!();
                }
            }
        }
    }
}

pub fn print_summary(outcome: &SearchOutcome) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    let results = &outcome.results;
    let request = results.request();
    println!(
        "{cyan}KNApSAcK {} search: {}{reset}",
        request.search_type(),
        request.keyword()
    );
    if results.is_empty() {
        println!("{yellow}No results were found!{reset}");
    } else {
        println!("{green}Compounds found: {}{reset}", results.len());
    }
    if !results.skipped().is_empty() {
        println!(
            "{yellow}Skipped rows: {}{reset}",
            results.skipped().len()
        );
        for row in results.skipped() {
            println!("{yellow}   {} ({}){reset}", row.link, row.reason);
        }
    }
    if let Some(path) = &outcome.output_path {
        println!("{cyan}Saved to: {path}{reset}");
    }
    println!(
        "Execution time: {}",
        format_elapsed(Duration::from_millis(outcome.elapsed_ms as u64))
    );
}
