//! HTML extraction for KNApSAcK result and compound pages.
//!
//! Everything that depends on the site's markup lives here, behind
//! [`CompoundExtractor`].

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::domain::{CompoundRecord, KnapsackId};

const COMPOUND_LINK_MARKER: &str = "information.php";
const RESULT_LINK_MARKER: &str = "result.php";
static LINK_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"word=(C\d+)").unwrap());
static COMPOUND_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bC\d+\b").unwrap());

const NEXT_LABELS: &[&str] = &["next", ">", ">>", "»", "次"];

// Cell positions on the compound page when rows carry no `th` label.
const NAME_POS: usize = 0;
const CAS_POS: usize = 3;
const ID_POS: usize = 4;
const SMILES_POS: usize = 7;

/// Structural mismatch on a single compound page. The row is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowIssue {
    #[error("compound page has no data table")]
    MissingTable,
    #[error("compound page has no KNApSAcK id")]
    MissingId,
    #[error("compound page has malformed KNApSAcK id: {0}")]
    InvalidId(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    /// Compound links in row order, as written in the page.
    pub compound_links: Vec<String>,
    pub next_page: Option<String>,
}

pub trait CompoundExtractor: Send + Sync {
    fn result_page(&self, html: &str) -> ResultPage;
    fn compound(
        &self,
        html: &str,
        fallback_id: Option<&KnapsackId>,
    ) -> Result<CompoundRecord, RowIssue>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KnapsackHtml;

impl CompoundExtractor for KnapsackHtml {
    fn result_page(&self, html: &str) -> ResultPage {
        let document = Html::parse_document(html);
        let Some(anchors) = selector("a[href]") else {
            return ResultPage::default();
        };

        let mut page = ResultPage::default();
        let mut seen = HashSet::new();
        for anchor in document.select(&anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if href.contains(COMPOUND_LINK_MARKER) {
                if seen.insert(href.to_string()) {
                    page.compound_links.push(href.to_string());
                }
            } else if page.next_page.is_none()
                && href.contains(RESULT_LINK_MARKER)
                && is_next_label(&element_text(&anchor))
            {
                page.next_page = Some(href.to_string());
            }
        }
        page
    }

    fn compound(
        &self,
        html: &str,
        fallback_id: Option<&KnapsackId>,
    ) -> Result<CompoundRecord, RowIssue> {
        let document = Html::parse_document(html);
        let cells_selector = selector(r#"td[colspan="4"]"#).ok_or(RowIssue::MissingTable)?;
        let cells: Vec<ElementRef> = document.select(&cells_selector).collect();
        if cells.is_empty() {
            return Err(RowIssue::MissingTable);
        }

        let fields = CompoundCells::labelled(&cells).unwrap_or_else(|| CompoundCells {
            name: cells.get(NAME_POS).copied(),
            cas: cells.get(CAS_POS).copied(),
            id: cells.get(ID_POS).copied(),
            smiles: cells.get(SMILES_POS).copied(),
        });

        let knapsack_id = match fields.id.map(|cell| element_text(&cell)) {
            Some(text) if !text.is_empty() => {
                let token = find_id(&text).ok_or_else(|| RowIssue::InvalidId(text.clone()))?;
                token
                    .parse::<KnapsackId>()
                    .map_err(|_| RowIssue::InvalidId(text))?
            }
            _ => fallback_id.cloned().ok_or(RowIssue::MissingId)?,
        };

        let common_names = fields
            .name
            .map(|cell| {
                cell.text()
                    .map(normalize_ws)
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(CompoundRecord {
            knapsack_id,
            common_names,
            cas_number: fields.cas.map(|cell| element_text(&cell)).and_then(non_empty),
            smiles: fields
                .smiles
                .map(|cell| element_text(&cell))
                .and_then(non_empty),
        })
    }
}

struct CompoundCells<'a> {
    name: Option<ElementRef<'a>>,
    cas: Option<ElementRef<'a>>,
    id: Option<ElementRef<'a>>,
    smiles: Option<ElementRef<'a>>,
}

impl<'a> CompoundCells<'a> {
    /// Picks cells by the `th` label in the same row. `None` when the page
    /// carries none of the known labels.
    fn labelled(cells: &[ElementRef<'a>]) -> Option<Self> {
        let mut found = Self {
            name: None,
            cas: None,
            id: None,
            smiles: None,
        };
        let mut any = false;
        for cell in cells {
            let Some(label) = row_label(cell) else {
                continue;
            };
            let slot = match label.as_str() {
                "name" => &mut found.name,
                "cas rn" | "cas" | "cas no." => &mut found.cas,
                "c_id" | "c-id" | "knapsack id" => &mut found.id,
                "smiles" => &mut found.smiles,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(*cell);
                any = true;
            }
        }
        any.then_some(found)
    }
}

fn row_label(cell: &ElementRef) -> Option<String> {
    let row = cell.parent().and_then(ElementRef::wrap)?;
    let header = row
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == "th")?;
    let label = element_text(&header)
        .trim_end_matches(':')
        .trim()
        .to_lowercase();
    (!label.is_empty()).then_some(label)
}

/// Extracts the compound id from a `information.php?word=C...` link.
pub fn link_id(href: &str) -> Option<KnapsackId> {
    LINK_ID.captures(href)?.get(1)?.as_str().parse().ok()
}

fn find_id(text: &str) -> Option<String> {
    COMPOUND_ID.find(text).map(|m| m.as_str().to_string())
}

fn is_next_label(text: &str) -> bool {
    let label = text.trim().to_lowercase();
    NEXT_LABELS.contains(&label.as_str()) || label.starts_with("next")
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(element: &ElementRef) -> String {
    normalize_ws(&element.text().collect::<String>())
}

fn normalize_ws(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
