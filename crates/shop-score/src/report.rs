/// Per-URL keyword report: cookie usage, "rent" mentions and the rules that matched.
///
/// Only URLs fetched during this run carry observations. Rows served from the input's
/// score column or from the cache leave the three columns empty.
use std::io::Write;

use shopscan_common::dispatch::Indexed;
use shopscan_common::error::CommonError;
use shopscan_common::io::write_rows;
use shopscan_common::model::ScoreResult;

pub const REPORT_HEADER: [&str; 4] = ["URL", "Uses Cookies", "Contains Rent", "Matched Keywords"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageReport {
    pub sets_cookies: bool,
    /// Lowercase "rent" anywhere in the page source (rental offers).
    pub mentions_rent: bool,
    /// Matched rule tokens, in rule order.
    pub matched: Vec<String>,
}

/// A score plus whatever was observed while fetching the page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredUrl {
    pub result: ScoreResult,
    pub report: Option<PageReport>,
}

impl Indexed for ScoredUrl {
    fn index(&self) -> usize {
        self.result.index
    }
}

pub fn write_report<W: Write>(writer: W, scored: &[ScoredUrl]) -> Result<(), CommonError> {
    let rows = scored.iter().map(|s| match &s.report {
        Some(report) => vec![
            s.result.url.clone(),
            yes_no(report.sets_cookies),
            yes_no(report.mentions_rent),
            report.matched.join("; "),
        ],
        None => vec![s.result.url.clone(), String::new(), String::new(), String::new()],
    });
    write_rows(writer, &REPORT_HEADER, rows)
}

fn yes_no(value: bool) -> String {
    let text = if value { "Yes" } else { "No" };
    text.to_string()
}
