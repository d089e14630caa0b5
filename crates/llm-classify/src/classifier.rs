use tracing::{info, warn};

use shopscan_common::completion::CompletionClient;
use shopscan_common::fetch::Fetcher;
use shopscan_common::html::{truncate_chars, visible_text};
use shopscan_common::model::UrlRecord;

use crate::analysis::{analyze, build_prompt, ClassifyRow, PageAnalysis};

#[derive(Clone)]
pub struct Classifier {
    fetcher: Fetcher,
    client: CompletionClient,
    max_page_chars: usize,
}

impl Classifier {
    pub fn new(fetcher: Fetcher, client: CompletionClient, max_page_chars: usize) -> Self {
        Self {
            fetcher,
            client,
            max_page_chars,
        }
    }

    /// Fetch, analyse and ask the model about one URL. Failures leave the row with an
    /// empty response instead of dropping it.
    pub async fn classify(&self, record: UrlRecord) -> ClassifyRow {
        let mut row = ClassifyRow {
            index: record.index,
            url: record.url,
            analysis: PageAnalysis::default(),
            response: String::new(),
        };

        let page = match self.fetcher.fetch(&row.url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %row.url, error = %e, "fetch failed");
                return row;
            }
        };

        let text = visible_text(&page.body);
        if text.is_empty() {
            warn!(url = %row.url, "no visible text on page");
            return row;
        }
        row.analysis = analyze(&text, &page.body);

        let prompt = build_prompt(&truncate_chars(&text, self.max_page_chars));
        match self.client.complete(&prompt).await {
            Ok(response) => {
                info!(
                    url = %row.url,
                    ecommerce = row.analysis.ecommerce,
                    response_chars = response.len(),
                    "classified"
                );
                row.response = response;
            }
            Err(e) => warn!(url = %row.url, error = %e, "completion failed"),
        }
        row
    }
}
