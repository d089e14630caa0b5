use serde::{Deserialize, Serialize};

/// Classification label attached to a URL, either from a prior run or computed now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// The page could not be fetched.
    FetchError,
    NotEcommerce,
    Ecommerce,
}

impl Label {
    /// The integer written to CSV files: -99, 0 or 1.
    pub fn code(self) -> i32 {
        match self {
            Label::FetchError => -99,
            Label::NotEcommerce => 0,
            Label::Ecommerce => 1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -99 => Some(Label::FetchError),
            0 => Some(Label::NotEcommerce),
            1 => Some(Label::Ecommerce),
            _ => None,
        }
    }

    /// Parse a CSV cell. Accepts integer and float spellings ("1", "1.0", "-99.0");
    /// empty cells and `nan` are unknown.
    pub fn parse_cell(cell: &str) -> Option<Self> {
        let cell = cell.trim();
        if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
            return None;
        }
        if let Ok(code) = cell.parse::<i32>() {
            return Self::from_code(code);
        }
        let value = cell.parse::<f64>().ok()?;
        if value.fract() != 0.0 {
            return None;
        }
        Self::from_code(value as i32)
    }
}

/// One input row: a URL with whatever was already known about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Zero-based position in the input, after filtering. Used to restore input order
    /// after the worker results are gathered.
    pub index: usize,
    pub url: String,
    pub prior_label: Option<Label>,
    /// Score from a previous run, in [0,100].
    pub prior_score: Option<f64>,
}

impl UrlRecord {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            prior_label: None,
            prior_score: None,
        }
    }

    pub fn with_label(mut self, label: Option<Label>) -> Self {
        self.prior_label = label;
        self
    }
}

/// How a single URL was resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// Keyword score in [0,100].
    Scored(f64),
    /// An exclusion token or domain fragment matched; the score is forced to zero.
    Excluded { token: String },
    /// The fetch failed; no score exists.
    FetchFailed { error: String },
}

/// The single result produced for a `UrlRecord`. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub index: usize,
    pub url: String,
    pub prior_label: Option<Label>,
    pub outcome: Outcome,
}

/// Value written to the score column when a fetch failed.
pub const ERROR_SENTINEL: f64 = -99.0;

impl ScoreResult {
    pub fn new(record: &UrlRecord, outcome: Outcome) -> Self {
        Self {
            index: record.index,
            url: record.url.clone(),
            prior_label: record.prior_label,
            outcome,
        }
    }

    /// The score, or `None` when the fetch failed.
    pub fn score(&self) -> Option<f64> {
        match &self.outcome {
            Outcome::Scored(score) => Some(*score),
            Outcome::Excluded { .. } => Some(0.0),
            Outcome::FetchFailed { .. } => None,
        }
    }

    /// The score column value, with `ERROR_SENTINEL` standing in for failures.
    pub fn score_or_sentinel(&self) -> f64 {
        self.score().unwrap_or(ERROR_SENTINEL)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::FetchFailed { .. })
    }

    /// Updated label: a score at or above `threshold` promotes the URL to e-commerce,
    /// otherwise the prior label is kept. Fetch failures are always `FetchError`.
    pub fn updated_label(&self, threshold: f64) -> Option<Label> {
        match self.score() {
            None => Some(Label::FetchError),
            Some(score) if score >= threshold => Some(Label::Ecommerce),
            Some(_) => self.prior_label,
        }
    }
}
