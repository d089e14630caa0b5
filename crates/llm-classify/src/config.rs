use std::path::PathBuf;

use shopscan_common::completion::CompletionConfig;
use shopscan_common::env::is_truthy;
use shopscan_common::fetch::FetchConfig;
use shopscan_common::io::{InputLayout, RecordFilter};

use crate::error::AppError;

const DEFAULT_MAX_PAGE_CHARS: usize = 6_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub input_csv: PathBuf,
    pub output_csv: PathBuf,
    pub layout: InputLayout,
    pub filter: RecordFilter,
    /// Visible page text is cut to this many characters before prompting.
    pub max_page_chars: usize,
    /// Start even if the completion server does not answer its health check.
    pub skip_health_check: bool,
    pub completion: CompletionConfig,
    pub fetch: FetchConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `INPUT_CSV`, `OUTPUT_CSV`
    ///
    /// Optional:
    /// - `URL_COLUMN` (1), `LIMIT`
    /// - `MAX_PAGE_CHARS` (6000), `SKIP_HEALTH_CHECK` (false)
    /// - the `COMPLETION_*` and `FETCH_*` variables
    pub fn from_env() -> Result<Self, AppError> {
        let input_csv = std::env::var("INPUT_CSV").map_err(|_| {
            AppError::Config("INPUT_CSV environment variable is required".to_string())
        })?;
        let output_csv = std::env::var("OUTPUT_CSV").map_err(|_| {
            AppError::Config("OUTPUT_CSV environment variable is required".to_string())
        })?;

        let url_column = std::env::var("URL_COLUMN")
            .ok()
            .map(|s| {
                s.trim()
                    .parse::<usize>()
                    .map_err(|e| AppError::Config(format!("invalid URL_COLUMN '{s}': {e}")))
            })
            .transpose()?
            .unwrap_or(1);

        let limit = std::env::var("LIMIT")
            .ok()
            .map(|s| {
                s.trim()
                    .parse::<usize>()
                    .map_err(|e| AppError::Config(format!("invalid LIMIT '{s}': {e}")))
            })
            .transpose()?;

        let max_page_chars = std::env::var("MAX_PAGE_CHARS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_PAGE_CHARS);

        let skip_health_check = std::env::var("SKIP_HEALTH_CHECK").is_ok_and(|s| is_truthy(&s));

        Ok(Self {
            input_csv: PathBuf::from(input_csv),
            output_csv: PathBuf::from(output_csv),
            layout: InputLayout {
                url_column,
                ..InputLayout::default()
            },
            filter: RecordFilter {
                only_label: None,
                limit,
            },
            max_page_chars,
            skip_health_check,
            completion: CompletionConfig::from_env(),
            fetch: FetchConfig::from_env(),
        })
    }
}
