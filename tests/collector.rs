use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;

use knapsack_search::app::{App, ProgressEvent, ProgressSink, SearchState};
use knapsack_search::config::SearchSettings;
use knapsack_search::domain::SearchRequest;
use knapsack_search::error::KnapsackError;
use knapsack_search::knapsack::KnapsackClient;
use knapsack_search::output::JsonOutput;

const BASE: &str = "http://www.knapsackfamily.com/knapsack_core/";

enum Page {
    Html(String),
    Status(u16),
}

#[derive(Default)]
struct FixtureClient {
    pages: HashMap<String, Page>,
    calls: Mutex<Vec<String>>,
}

impl FixtureClient {
    fn html(mut self, path: &str, body: impl Into<String>) -> Self {
        self.pages
            .insert(format!("{BASE}{path}"), Page::Html(body.into()));
        self
    }

    fn fixture(self, path: &str, file: &str) -> Self {
        let file = format!("{}/tests/fixtures/{file}", env!("CARGO_MANIFEST_DIR"));
        let body = fs::read_to_string(&file).unwrap();
        self.html(path, body)
    }

    fn status(mut self, path: &str, status: u16) -> Self {
        self.pages.insert(format!("{BASE}{path}"), Page::Status(status));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl KnapsackClient for FixtureClient {
    fn fetch_page(&self, url: &str) -> Result<String, KnapsackError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(Page::Html(body)) => Ok(body.clone()),
            Some(Page::Status(status)) => Err(KnapsackError::FetchStatus {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(KnapsackError::Fetch {
                url: url.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    states: Mutex<Vec<SearchState>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.states.lock().unwrap().push(event.state);
    }
}

fn result_page(ids: &[&str], next: Option<&str>) -> String {
    let mut html = String::from("<html><body><table>");
    for id in ids {
        html.push_str(&format!(
            r#"<tr><td class="d1"><a href="information.php?word={id}">{id}</a></td><td class="d1">-</td></tr>"#
        ));
    }
    html.push_str("</table>");
    if let Some(next) = next {
        html.push_str(&format!(r#"<a href="{next}">Next</a>"#));
    }
    html.push_str("</body></html>");
    html
}

fn detail_page(id: &str, name: &str, smiles: &str) -> String {
    format!(
        r#"<html><body><table>
        <tr><th class="inf">Name</th><td colspan="4" class="inf">{name}</td></tr>
        <tr><th class="inf">Formula</th><td colspan="4" class="inf">C1</td></tr>
        <tr><th class="inf">Mw</th><td colspan="4" class="inf">1.0</td></tr>
        <tr><th class="inf">CAS RN</th><td colspan="4" class="inf">1-1-1</td></tr>
        <tr><th class="inf">C_ID</th><td colspan="4" class="inf">{id}</td></tr>
        <tr><th class="inf">SMILES</th><td colspan="4" class="inf">{smiles}</td></tr>
        </table></body></html>"#
    )
}

fn three_page_client(page_two: Option<u16>) -> FixtureClient {
    let client = FixtureClient::default()
        .html(
            "result.php?sname=metabolite&word=flavone",
            result_page(
                &["C00000001", "C00000002"],
                Some("result.php?sname=metabolite&amp;word=flavone&amp;page=2"),
            ),
        )
        .html(
            "result.php?sname=metabolite&word=flavone&page=3",
            result_page(&["C00000005"], None),
        )
        .html("information.php?word=C00000001", detail_page("C00000001", "Flavone", "O=c1cc(oc2ccccc12)-c1ccccc1"))
        .html("information.php?word=C00000002", detail_page("C00000002", "Chrysin", "Oc1cc(O)c2c(c1)oc(cc2=O)-c1ccccc1"))
        .html("information.php?word=C00000003", detail_page("C00000003", "Luteolin", "Oc1cc(O)c2c(c1)oc(cc2=O)-c1ccc(O)c(O)c1"))
        .html("information.php?word=C00000004", detail_page("C00000004", "Baicalein", "Oc1c(O)c(O)c2c(c1)oc(cc2=O)-c1ccccc1"))
        .html("information.php?word=C00000005", detail_page("C00000005", "Acacetin", "COc1ccc(cc1)-c1cc(=O)c2c(O)cc(O)cc2o1"));
    match page_two {
        Some(status) => client.status("result.php?sname=metabolite&word=flavone&page=2", status),
        None => client.html(
            "result.php?sname=metabolite&word=flavone&page=2",
            result_page(
                &["C00000003", "C00000004"],
                Some("result.php?sname=metabolite&amp;word=flavone&amp;page=3"),
            ),
        ),
    }
}

#[test]
fn organism_search_returns_both_baccharis_compounds() {
    let client = FixtureClient::default()
        .fixture(
            "result.php?sname=organism&word=Baccharis",
            "result_organism_baccharis.html",
        )
        .fixture("information.php?word=C00001025", "information_C00001025.html")
        .fixture("information.php?word=C00003812", "information_C00003812.html");
    let app = App::new(client, SearchSettings::default()).unwrap();
    let request = SearchRequest::parse("organism", "Baccharis").unwrap();

    let results = app.search(&request, &JsonOutput).unwrap();

    assert_eq!(results.len(), 2);
    let ids: Vec<&str> = results.iter().map(|r| r.knapsack_id.as_str()).collect();
    assert_eq!(ids, vec!["C00001025", "C00003812"]);
    for record in &results {
        assert!(record.smiles.as_deref().is_some_and(|s| !s.is_empty()));
    }
    assert_eq!(
        results.records()[0].common_names,
        vec!["Taxifolin", "Dihydroquercetin", "(+)-Taxifolin"]
    );
    assert_eq!(results.records()[1].cas_number.as_deref(), Some("520-36-5"));
    assert!(results.skipped().is_empty());
    assert_eq!(results.request(), &request);
}

#[test]
fn collects_every_page_in_site_order() {
    let client = three_page_client(None);
    let app = App::new(client, SearchSettings::default()).unwrap();
    let request = SearchRequest::parse("metabolite", "flavone").unwrap();
    let sink = RecordingSink::default();

    let results = app.search(&request, &sink).unwrap();

    let ids: Vec<String> = results.iter().map(|r| r.knapsack_id.to_string()).collect();
    assert_eq!(
        ids,
        vec!["C00000001", "C00000002", "C00000003", "C00000004", "C00000005"]
    );

    let states = sink.states.lock().unwrap();
    assert!(states.contains(&SearchState::Fetching { page: 3 }));
    assert!(states.contains(&SearchState::Parsing { page: 3 }));
    assert_eq!(states.last(), Some(&SearchState::Done));
}

#[test]
fn fetch_failure_on_second_page_aborts_search() {
    let client = three_page_client(Some(503));
    let app = App::new(client, SearchSettings::default()).unwrap();
    let request = SearchRequest::parse("metabolite", "flavone").unwrap();
    let sink = RecordingSink::default();

    let err = app.search(&request, &sink).unwrap_err();

    assert!(err.is_fetch_error());
    assert_matches!(err, KnapsackError::FetchStatus { status: 503, ref url } if url.ends_with("page=2"));
    assert_eq!(sink.states.lock().unwrap().last(), Some(&SearchState::Failed));
}

#[test]
fn fetch_failure_on_compound_page_aborts_search() {
    let client = FixtureClient::default()
        .fixture(
            "result.php?sname=organism&word=Baccharis",
            "result_organism_baccharis.html",
        )
        .fixture("information.php?word=C00001025", "information_C00001025.html");
    let app = App::new(client, SearchSettings::default()).unwrap();
    let request = SearchRequest::parse("organism", "Baccharis").unwrap();

    let err = app.search(&request, &JsonOutput).unwrap_err();
    assert_matches!(err, KnapsackError::Fetch { ref url, .. } if url.ends_with("word=C00003812"));
    assert_eq!(app.client().calls().len(), 3);
}

#[test]
fn page_limit_stops_pagination() {
    let settings = SearchSettings {
        max_pages: 2,
        ..SearchSettings::default()
    };
    let app = App::new(three_page_client(None), settings).unwrap();
    let request = SearchRequest::parse("metabolite", "flavone").unwrap();

    let results = app.search(&request, &JsonOutput).unwrap();
    assert_eq!(results.len(), 4);
}

#[test]
fn row_without_smiles_is_kept() {
    let client = FixtureClient::default()
        .html(
            "result.php?sname=metabolite&word=Bacchotricuneatin",
            result_page(&["C00050001"], None),
        )
        .fixture("information.php?word=C00050001", "information_no_smiles.html");
    let app = App::new(client, SearchSettings::default()).unwrap();
    let request = SearchRequest::parse("metabolite", "Bacchotricuneatin").unwrap();

    let results = app.search(&request, &JsonOutput).unwrap();

    assert_eq!(results.len(), 1);
    let record = &results.records()[0];
    assert_eq!(record.knapsack_id.as_str(), "C00050001");
    assert_eq!(record.common_names, vec!["Bacchotricuneatin A"]);
    assert_eq!(record.smiles, None);
    assert_eq!(record.cas_number, None);
}

#[test]
fn malformed_compound_page_is_skipped() {
    let client = FixtureClient::default()
        .fixture(
            "result.php?sname=organism&word=Baccharis",
            "result_organism_baccharis.html",
        )
        .fixture("information.php?word=C00001025", "information_not_found.html")
        .fixture("information.php?word=C00003812", "information_C00003812.html");
    let app = App::new(client, SearchSettings::default()).unwrap();
    let request = SearchRequest::parse("organism", "Baccharis").unwrap();

    let results = app.search(&request, &JsonOutput).unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results.records()[0].knapsack_id.as_str(), "C00003812");
    assert_eq!(results.skipped().len(), 1);
    assert!(results.skipped()[0].link.ends_with("word=C00001025"));
}

#[test]
fn empty_result_is_not_an_error() {
    let client = FixtureClient::default().fixture(
        "result.php?sname=metabolite&word=zzzz",
        "result_empty.html",
    );
    let app = App::new(client, SearchSettings::default()).unwrap();
    let request = SearchRequest::parse("metabolite", "zzzz").unwrap();

    let results = app.search(&request, &JsonOutput).unwrap();
    assert!(results.is_empty());
}

#[test]
fn duplicate_rows_fetch_compound_once() {
    let client = FixtureClient::default()
        .html(
            "result.php?sname=organism&word=Baccharis",
            result_page(
                &["C00000001", "C00000002"],
                Some("result.php?sname=organism&amp;word=Baccharis&amp;page=2"),
            ),
        )
        .html(
            "result.php?sname=organism&word=Baccharis&page=2",
            result_page(&["C00000001"], None),
        )
        .html("information.php?word=C00000001", detail_page("C00000001", "Flavone", "C"))
        .html("information.php?word=C00000002", detail_page("C00000002", "Chrysin", "CC"));
    let app = App::new(client, SearchSettings::default()).unwrap();
    let request = SearchRequest::parse("organism", "Baccharis").unwrap();

    let results = app.search(&request, &JsonOutput).unwrap();

    assert_eq!(results.len(), 2);
    let compound_calls = app
        .client()
        .calls()
        .into_iter()
        .filter(|url| url.contains("information.php"))
        .count();
    assert_eq!(compound_calls, 2);
}

#[test]
fn skipped_compound_is_fetched_once() {
    let client = FixtureClient::default()
        .html(
            "result.php?sname=organism&word=Baccharis",
            result_page(
                &["C00001025", "C00003812"],
                Some("result.php?sname=organism&amp;word=Baccharis&amp;page=2"),
            ),
        )
        .html(
            "result.php?sname=organism&word=Baccharis&page=2",
            result_page(&["C00001025"], None),
        )
        .fixture("information.php?word=C00001025", "information_not_found.html")
        .fixture("information.php?word=C00003812", "information_C00003812.html");
    let app = App::new(client, SearchSettings::default()).unwrap();
    let request = SearchRequest::parse("organism", "Baccharis").unwrap();

    let results = app.search(&request, &JsonOutput).unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results.skipped().len(), 1);
    let broken_calls = app
        .client()
        .calls()
        .into_iter()
        .filter(|url| url.ends_with("word=C00001025"))
        .count();
    assert_eq!(broken_calls, 1);
}
