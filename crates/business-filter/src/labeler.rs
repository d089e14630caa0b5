use std::sync::Arc;

use tracing::{info, warn};

use shopscan_common::fetch::Fetcher;
use shopscan_common::filter::{classify_domain, classify_page, FilterMode, FilterResult};
use shopscan_common::model::UrlRecord;
use shopscan_common::rules::RuleSet;

#[derive(Clone)]
pub struct Labeler {
    fetcher: Fetcher,
    rules: Arc<RuleSet>,
    mode: FilterMode,
}

impl Labeler {
    pub fn new(fetcher: Fetcher, rules: Arc<RuleSet>, mode: FilterMode) -> Self {
        Self {
            fetcher,
            rules,
            mode,
        }
    }

    pub async fn label(&self, record: UrlRecord) -> FilterResult {
        let result = match self.mode {
            FilterMode::Domain => classify_domain(&record, &self.rules),
            FilterMode::Page => match self.fetcher.fetch(&record.url).await {
                Ok(page) => classify_page(&record, &page.body, &self.rules),
                Err(e) => {
                    warn!(url = %record.url, error = %e, "fetch failed");
                    FilterResult::fetch_failed(&record, e.to_string())
                }
            },
        };
        if let Some(matched) = &result.matched {
            info!(url = %result.url, matched = %matched, "excluded");
        }
        result
    }
}
