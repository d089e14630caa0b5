use std::path::PathBuf;
use std::str::FromStr;

use shopscan_common::env::is_truthy;
use shopscan_common::fetch::FetchConfig;
use shopscan_common::io::{InputLayout, RecordFilter};
use shopscan_common::model::Label;
use shopscan_common::rules::{Country, MatchPolicy};

use crate::error::AppError;

const DEFAULT_THRESHOLD: f64 = 20.0;
const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

/// Scoring run configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub input_csv: PathBuf,
    pub output_csv: PathBuf,
    /// Optional single-column list of URLs whose final score is 0.
    pub zero_score_csv: Option<PathBuf>,
    pub country: Country,
    /// JSON rule set that replaces the built-in set for `country`.
    pub rules_path: Option<PathBuf>,
    /// Overrides the rule set's own match policy when present.
    pub match_policy: Option<MatchPolicy>,
    pub layout: InputLayout,
    pub filter: RecordFilter,
    pub workers: usize,
    pub worker_concurrency: usize,
    /// Score at or above which a URL is relabelled as e-commerce.
    pub threshold: f64,
    /// Redis connection URL. `None` disables the score cache.
    pub redis_url: Option<String>,
    pub cache_ttl_secs: u64,
    /// Drop every cached score before the run.
    pub reset_cache: bool,
    /// Optional per-URL cookies / rent / matched-keywords report.
    pub report_csv: Option<PathBuf>,
    pub fetch: FetchConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `INPUT_CSV`, `OUTPUT_CSV`
    ///
    /// Optional:
    /// - `COUNTRY` (DE, AT, NL or PL; default DE)
    /// - `RULES_PATH`: JSON rule set, takes precedence over `COUNTRY`
    /// - `MATCH_POLICY` (substring or token)
    /// - `URL_COLUMN` (0), `LABEL_COLUMN`, `SCORE_COLUMN`, `ONLY_LABEL`, `LIMIT`
    /// - `WORKERS` (available parallelism), `WORKER_CONCURRENCY` (1)
    /// - `ECOMMERCE_THRESHOLD` (20), `ZERO_SCORE_CSV`, `KEYWORD_REPORT_CSV`
    /// - `REDIS_URL`, `SCORE_CACHE_TTL_SECS` (86400), `SCORE_CACHE_RESET`
    /// - the shared `FETCH_*` variables
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let input_csv = required(&lookup, "INPUT_CSV")?;
        let output_csv = required(&lookup, "OUTPUT_CSV")?;

        let only_label = match parsed::<i32>(&lookup, "ONLY_LABEL")? {
            Some(code) => Some(Label::from_code(code).ok_or_else(|| {
                AppError::Config(format!("ONLY_LABEL must be -99, 0 or 1, got {code}"))
            })?),
            None => None,
        };

        let workers = parsed::<usize>(&lookup, "WORKERS")?
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));
        if workers == 0 {
            return Err(AppError::Config("WORKERS must be at least 1".to_string()));
        }

        let threshold = parsed::<f64>(&lookup, "ECOMMERCE_THRESHOLD")?.unwrap_or(DEFAULT_THRESHOLD);
        if !(0.0..=100.0).contains(&threshold) {
            return Err(AppError::Config(format!(
                "ECOMMERCE_THRESHOLD must be within 0..=100, got {threshold}"
            )));
        }

        Ok(Self {
            input_csv: PathBuf::from(input_csv),
            output_csv: PathBuf::from(output_csv),
            zero_score_csv: lookup("ZERO_SCORE_CSV").map(PathBuf::from),
            country: parsed(&lookup, "COUNTRY")?.unwrap_or(Country::De),
            rules_path: lookup("RULES_PATH").map(PathBuf::from),
            match_policy: parsed(&lookup, "MATCH_POLICY")?,
            layout: InputLayout {
                url_column: parsed(&lookup, "URL_COLUMN")?.unwrap_or(0),
                label_column: parsed(&lookup, "LABEL_COLUMN")?,
                score_column: parsed(&lookup, "SCORE_COLUMN")?,
                has_header: true,
            },
            filter: RecordFilter {
                only_label,
                limit: parsed(&lookup, "LIMIT")?,
            },
            workers,
            worker_concurrency: parsed::<usize>(&lookup, "WORKER_CONCURRENCY")?
                .unwrap_or(1)
                .max(1),
            threshold,
            redis_url: lookup("REDIS_URL"),
            cache_ttl_secs: parsed(&lookup, "SCORE_CACHE_TTL_SECS")?
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
            reset_cache: lookup("SCORE_CACHE_RESET").is_some_and(|v| is_truthy(&v)),
            report_csv: lookup("KEYWORD_REPORT_CSV").map(PathBuf::from),
            fetch: FetchConfig::from_env(),
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, AppError> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{key} environment variable is required")))
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| AppError::Config(format!("invalid {key} '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, AppError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[("INPUT_CSV", "in.csv"), ("OUTPUT_CSV", "out/scores.csv")]).unwrap();
        assert_eq!(config.country, Country::De);
        assert_eq!(config.layout.url_column, 0);
        assert_eq!(config.threshold, 20.0);
        assert_eq!(config.worker_concurrency, 1);
        assert_eq!(config.cache_ttl_secs, 86_400);
        assert!(config.workers >= 1);
        assert!(config.match_policy.is_none());
        assert!(!config.reset_cache);
        assert!(config.report_csv.is_none());
    }

    #[test]
    fn missing_input_is_config_error() {
        let err = load(&[("OUTPUT_CSV", "out.csv")]).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("INPUT_CSV")));
    }

    #[test]
    fn parses_austrian_relabel_run() {
        let config = load(&[
            ("INPUT_CSV", "at.csv"),
            ("OUTPUT_CSV", "at_scored.csv"),
            ("COUNTRY", "at"),
            ("URL_COLUMN", "1"),
            ("LABEL_COLUMN", "2"),
            ("ONLY_LABEL", "1"),
            ("LIMIT", "500"),
            ("WORKERS", "8"),
            ("MATCH_POLICY", "token"),
        ])
        .unwrap();
        assert_eq!(config.country, Country::At);
        assert_eq!(config.layout.label_column, Some(2));
        assert_eq!(config.filter.only_label, Some(Label::Ecommerce));
        assert_eq!(config.filter.limit, Some(500));
        assert_eq!(config.workers, 8);
        assert_eq!(config.match_policy, Some(MatchPolicy::Token));
    }

    #[test]
    fn cache_reset_accepts_numeric_switch() {
        let base = [("INPUT_CSV", "a.csv"), ("OUTPUT_CSV", "b.csv")];
        for (value, expected) in [("1", true), ("yes", true), ("true", true), ("0", false)] {
            let mut vars = base.to_vec();
            vars.push(("SCORE_CACHE_RESET", value));
            assert_eq!(load(&vars).unwrap().reset_cache, expected, "{value}");
        }
    }

    #[test]
    fn rejects_bad_values() {
        let base = [("INPUT_CSV", "a.csv"), ("OUTPUT_CSV", "b.csv")];
        for bad in [
            ("WORKERS", "0"),
            ("ONLY_LABEL", "2"),
            ("COUNTRY", "FR"),
            ("ECOMMERCE_THRESHOLD", "120"),
            ("URL_COLUMN", "first"),
        ] {
            let mut vars = base.to_vec();
            vars.push(bad);
            assert!(load(&vars).is_err(), "{bad:?} should be rejected");
        }
    }
}
