use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KnapsackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Metabolite,
    Organism,
}

impl SearchType {
    pub const ALL: [SearchType; 2] = [SearchType::Metabolite, SearchType::Organism];

    /// Value of the `sname` parameter on `result.php`.
    pub fn as_param(&self) -> &'static str {
        match self {
            SearchType::Metabolite => "metabolite",
            SearchType::Organism => "organism",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_param())
    }
}

impl FromStr for SearchType {
    type Err = KnapsackError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "metabolite" => Ok(SearchType::Metabolite),
            "organism" => Ok(SearchType::Organism),
            _ => Err(KnapsackError::InvalidSearchType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keyword(String);

impl Keyword {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Keyword {
    type Err = KnapsackError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(KnapsackError::EmptyKeyword);
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// One search invocation. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    search_type: SearchType,
    keyword: Keyword,
}

impl SearchRequest {
    pub fn new(search_type: SearchType, keyword: Keyword) -> Self {
        Self {
            search_type,
            keyword,
        }
    }

    /// Validates raw form or CLI input.
    pub fn parse(search_type: &str, keyword: &str) -> Result<Self, KnapsackError> {
        Ok(Self::new(search_type.parse()?, keyword.parse()?))
    }

    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    pub fn keyword(&self) -> &Keyword {
        &self.keyword
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnapsackId(String);

impl KnapsackId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KnapsackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KnapsackId {
    type Err = KnapsackError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let is_valid = normalized.len() > 1
            && normalized.starts_with('C')
            && normalized[1..].chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(KnapsackError::InvalidKnapsackId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompoundRecord {
    pub knapsack_id: KnapsackId,
    pub common_names: Vec<String>,
    pub cas_number: Option<String>,
    pub smiles: Option<String>,
}

/// A compound row that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub link: String,
    pub reason: String,
}

/// Records of one search in site order.
#[derive(Debug, Clone, Serialize)]
pub struct ResultSet {
    request: SearchRequest,
    records: Vec<CompoundRecord>,
    skipped: Vec<SkippedRow>,
}

impl ResultSet {
    pub fn new(
        request: SearchRequest,
        records: Vec<CompoundRecord>,
        skipped: Vec<SkippedRow>,
    ) -> Self {
        Self {
            request,
            records,
            skipped,
        }
    }

    pub fn empty(request: SearchRequest) -> Self {
        Self::new(request, Vec::new(), Vec::new())
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    pub fn records(&self) -> &[CompoundRecord] {
        &self.records
    }

    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompoundRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a CompoundRecord;
    type IntoIter = std::slice::Iter<'a, CompoundRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_search_type_case_insensitive() {
        let kind: SearchType = " Organism ".parse().unwrap();
        assert_eq!(kind, SearchType::Organism);
        assert_eq!(kind.as_param(), "organism");
    }

    #[test]
    fn parse_search_type_invalid() {
        let err = "enzyme".parse::<SearchType>().unwrap_err();
        assert_matches!(err, KnapsackError::InvalidSearchType(value) if value == "enzyme");
    }

    #[test]
    fn parse_keyword_trims() {
        let keyword: Keyword = "  flavone ".parse().unwrap();
        assert_eq!(keyword.as_str(), "flavone");
    }

    #[test]
    fn parse_keyword_empty() {
        let err = "   ".parse::<Keyword>().unwrap_err();
        assert_matches!(err, KnapsackError::EmptyKeyword);
    }

    #[test]
    fn parse_knapsack_id() {
        let id: KnapsackId = "c00001234".parse().unwrap();
        assert_eq!(id.as_str(), "C00001234");

        let err = "X123".parse::<KnapsackId>().unwrap_err();
        assert_matches!(err, KnapsackError::InvalidKnapsackId(_));
        assert!("C".parse::<KnapsackId>().is_err());
    }
}
