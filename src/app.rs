use std::collections::HashSet;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SearchSettings;
use crate::domain::{CompoundRecord, KnapsackId, ResultSet, SearchRequest, SkippedRow};
use crate::error::KnapsackError;
use crate::export;
use crate::extract::{self, CompoundExtractor, KnapsackHtml};
use crate::knapsack::KnapsackClient;
use crate::query::{PageDescriptor, PageKind, QueryBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Fetching { page: usize },
    Parsing { page: usize },
    Done,
    Failed,
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchState::Idle => write!(f, "Idle"),
            SearchState::Fetching { page } => write!(f, "Fetching(page={page})"),
            SearchState::Parsing { page } => write!(f, "Parsing(page={page})"),
            SearchState::Done => write!(f, "Done"),
            SearchState::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub state: SearchState,
    pub message: String,
    /// Compounds resolved so far and compounds discovered so far.
    pub progress: Option<(usize, usize)>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Result of [`App::run`]: the records plus where they were written.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: ResultSet,
    pub output_path: Option<String>,
    pub elapsed_ms: u128,
    pub finished_at: String,
}

#[derive(Clone)]
pub struct App<K: KnapsackClient, E: CompoundExtractor = KnapsackHtml> {
    client: K,
    extractor: E,
    settings: SearchSettings,
    query: QueryBuilder,
}

impl<K: KnapsackClient> App<K, KnapsackHtml> {
    pub fn new(client: K, settings: SearchSettings) -> Result<Self, KnapsackError> {
        Self::with_extractor(client, KnapsackHtml, settings)
    }
}

impl<K: KnapsackClient, E: CompoundExtractor> App<K, E> {
    pub fn with_extractor(
        client: K,
        extractor: E,
        settings: SearchSettings,
    ) -> Result<Self, KnapsackError> {
        settings.validate()?;
        let query = QueryBuilder::new(&settings.base_url)?;
        Ok(Self {
            client,
            extractor,
            settings,
            query,
        })
    }

    pub fn client(&self) -> &K {
        &self.client
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    pub fn query(&self) -> &QueryBuilder {
        &self.query
    }

    /// Searches and, when `output` is given, writes the CSV export.
    pub fn run(
        &self,
        request: &SearchRequest,
        output: Option<&Utf8PathBuf>,
        sink: &dyn ProgressSink,
    ) -> Result<SearchOutcome, KnapsackError> {
        let start = Instant::now();
        let results = self.search(request, sink)?;
        if let Some(path) = output {
            export::write_csv(&results, path)?;
            info!(path = %path, records = results.len(), "wrote csv export");
        }
        let elapsed = start.elapsed();
        info!(elapsed = %format_elapsed(elapsed), "execution time");
        Ok(SearchOutcome {
            results,
            output_path: output.map(|path| path.to_string()),
            elapsed_ms: elapsed.as_millis(),
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Collects every compound matching `request`, page by page, in site
    /// order. A fetch failure anywhere aborts the whole search.
    pub fn search(
        &self,
        request: &SearchRequest,
        sink: &dyn ProgressSink,
    ) -> Result<ResultSet, KnapsackError> {
        let mut session = Session::new(self, sink);
        session.progress(format!(
            "searching {} {}",
            request.search_type(),
            request.keyword()
        ));
        match session.collect(request) {
            Ok(()) => {
                session.transition(
                    SearchState::Done,
                    format!("{} compounds collected", session.records.len()),
                );
                if session.records.is_empty() {
                    info!(
                        search_type = %request.search_type(),
                        keyword = %request.keyword(),
                        "no results were found"
                    );
                } else {
                    info!(
                        records = session.records.len(),
                        skipped = session.skipped.len(),
                        "search finished"
                    );
                }
                Ok(ResultSet::new(
                    request.clone(),
                    session.records,
                    session.skipped,
                ))
            }
            Err(err) => {
                session.transition(SearchState::Failed, err.to_string());
                Err(err)
            }
        }
    }
}

/// State owned by a single search call.
struct Session<'a, K: KnapsackClient, E: CompoundExtractor> {
    app: &'a App<K, E>,
    sink: &'a dyn ProgressSink,
    state: SearchState,
    records: Vec<CompoundRecord>,
    skipped: Vec<SkippedRow>,
    seen: HashSet<KnapsackId>,
    discovered: usize,
    resolved: usize,
    requests: usize,
}

impl<'a, K: KnapsackClient, E: CompoundExtractor> Session<'a, K, E> {
    fn new(app: &'a App<K, E>, sink: &'a dyn ProgressSink) -> Self {
        Self {
            app,
            sink,
            state: SearchState::Idle,
            records: Vec::new(),
            skipped: Vec::new(),
            seen: HashSet::new(),
            discovered: 0,
            resolved: 0,
            requests: 0,
        }
    }

    fn collect(&mut self, request: &SearchRequest) -> Result<(), KnapsackError> {
        let mut pending = self.app.query.descriptors(request)?;
        pending.reverse();
        let mut visited = HashSet::new();

        while let Some(descriptor) = pending.pop() {
            let PageKind::Results { page } = descriptor.kind else {
                continue;
            };
            if !visited.insert(descriptor.url.clone()) {
                debug!(url = %descriptor, "pagination loops back, stopping");
                break;
            }

            self.transition(SearchState::Fetching { page }, format!("fetching {descriptor}"));
            let html = self.fetch(&descriptor)?;

            self.transition(SearchState::Parsing { page }, format!("parsing result page {page}"));
            let result_page = self.app.extractor.result_page(&html);
            self.discovered += result_page.compound_links.len();
            self.progress(format!(
                "page {page}: {} compound rows",
                result_page.compound_links.len()
            ));

            for link in &result_page.compound_links {
                self.collect_compound(&descriptor, link)?;
            }

            if let Some(next) = result_page.next_page {
                if page >= self.app.settings.max_pages {
                    warn!(
                        max_pages = self.app.settings.max_pages,
                        "page limit reached, remaining result pages are not fetched"
                    );
                    self.progress(format!(
                        "page limit {} reached, remaining pages skipped",
                        self.app.settings.max_pages
                    ));
                    break;
                }
                pending.push(self.app.query.resolve(
                    &descriptor,
                    &next,
                    PageKind::Results { page: page + 1 },
                )?);
            }
        }
        Ok(())
    }

    fn collect_compound(
        &mut self,
        page: &PageDescriptor,
        link: &str,
    ) -> Result<(), KnapsackError> {
        let link_id = extract::link_id(link);
        if let Some(id) = &link_id {
            if self.seen.contains(id) {
                debug!(id = %id, "duplicate compound row");
                self.discovered = self.discovered.saturating_sub(1);
                return Ok(());
            }
        }

        let target = self.app.query.resolve(page, link, PageKind::Compound)?;
        let html = self.fetch(&target)?;
        match self.app.extractor.compound(&html, link_id.as_ref()) {
            Ok(record) => {
                if self.seen.insert(record.knapsack_id.clone()) {
                    self.records.push(record);
                } else {
                    debug!(id = %record.knapsack_id, "duplicate compound record");
                }
            }
            Err(issue) => {
                if let Some(id) = link_id {
                    self.seen.insert(id);
                }
                warn!(url = %target, reason = %issue, "skipping compound row");
                self.progress(format!("skipped {target}: {issue}"));
                self.skipped.push(SkippedRow {
                    link: target.to_string(),
                    reason: issue.to_string(),
                });
            }
        }
        self.resolved += 1;
        self.progress(format!("resolved {link}"));
        Ok(())
    }

    fn fetch(&mut self, descriptor: &PageDescriptor) -> Result<String, KnapsackError> {
        if self.requests > 0 && self.app.settings.request_delay_ms > 0 {
            thread::sleep(Duration::from_millis(self.app.settings.request_delay_ms));
        }
        self.requests += 1;
        self.app.client.fetch_page(descriptor.as_str())
    }

    fn transition(&mut self, next: SearchState, message: String) {
        debug!(from = %self.state, to = %next, "search state");
        self.state = next;
        self.sink.event(ProgressEvent {
            state: next,
            message,
            progress: Some((self.resolved, self.discovered)),
        });
    }

    fn progress(&self, message: String) {
        self.sink.event(ProgressEvent {
            state: self.state,
            message,
            progress: Some((self.resolved, self.discovered)),
        });
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        return format!("{:.4} s", elapsed.as_secs_f64());
    }
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
