use std::sync::Arc;

use tracing::{debug, info, warn};

use shopscan_common::fetch::{FetchedPage, Fetcher};
use shopscan_common::html::PageSignals;
use shopscan_common::model::{Outcome, ScoreResult, UrlRecord};
use shopscan_common::rules::RuleSet;
use shopscan_common::scoring::score_page;

use crate::cache::ScoreCache;
use crate::report::{PageReport, ScoredUrl};

/// Per-URL scoring job shared by every worker.
#[derive(Clone)]
pub struct Scorer {
    fetcher: Fetcher,
    rules: Arc<RuleSet>,
    cache: Arc<ScoreCache>,
}

impl Scorer {
    pub fn new(fetcher: Fetcher, rules: Arc<RuleSet>, cache: Arc<ScoreCache>) -> Self {
        Self {
            fetcher,
            rules,
            cache,
        }
    }

    /// Resolve one record. Always yields exactly one result; fetch failures become
    /// `Outcome::FetchFailed`.
    pub async fn score(&self, record: UrlRecord) -> ScoredUrl {
        if let Some(prior) = record.prior_score {
            debug!(url = %record.url, score = prior, "reusing score from input");
            return unreported(&record, Outcome::Scored(prior));
        }

        if let Some(outcome) = self.cache.get(&record.url).await {
            debug!(url = %record.url, "score cache hit");
            return unreported(&record, outcome);
        }

        let scored = match self.fetcher.fetch(&record.url).await {
            Ok(page) => self.score_fetched(&record, &page),
            Err(e) => {
                warn!(url = %record.url, error = %e, "fetch failed");
                unreported(
                    &record,
                    Outcome::FetchFailed {
                        error: e.to_string(),
                    },
                )
            }
        };
        self.cache.set(&record.url, &scored.result.outcome).await;
        scored
    }

    /// URL bonuses look at the URL as given in the input, not where redirects ended up.
    fn score_fetched(&self, record: &UrlRecord, page: &FetchedPage) -> ScoredUrl {
        debug!(
            url = %record.url,
            final_url = %page.final_url,
            status = page.status,
            "page fetched"
        );
        let (outcome, report) = evaluate(&record.url, page, &self.rules);
        ScoredUrl {
            result: ScoreResult::new(record, outcome),
            report: Some(report),
        }
    }
}

fn unreported(record: &UrlRecord, outcome: Outcome) -> ScoredUrl {
    ScoredUrl {
        result: ScoreResult::new(record, outcome),
        report: None,
    }
}

/// Score a fetched page and collect its report observations.
pub fn evaluate(url: &str, page: &FetchedPage, rules: &RuleSet) -> (Outcome, PageReport) {
    let signals = PageSignals::from_html(&page.body, rules.buy_phrases());
    let breakdown = score_page(url, &page.body, &signals, rules);
    let report = PageReport {
        sets_cookies: page.sets_cookies,
        mentions_rent: page.body.contains("rent"),
        matched: breakdown.matched.clone(),
    };

    if let Some(token) = breakdown.excluded_by {
        info!(url, token = %token, "excluded by token");
        return (Outcome::Excluded { token }, report);
    }

    info!(
        url,
        score = breakdown.score,
        matched = breakdown.matched.len(),
        bonus = breakdown.bonus_weight,
        "scored"
    );
    debug!(url, matched = ?breakdown.matched, "matched keywords");
    (Outcome::Scored(breakdown.score), report)
}
