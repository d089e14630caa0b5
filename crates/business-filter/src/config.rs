use std::path::PathBuf;
use std::str::FromStr;

use shopscan_common::fetch::FetchConfig;
use shopscan_common::filter::FilterMode;
use shopscan_common::io::InputLayout;
use shopscan_common::rules::Country;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub input_csv: PathBuf,
    pub output_csv: PathBuf,
    /// Optional single-column list of the URLs labelled 0.
    pub non_ecommerce_csv: Option<PathBuf>,
    pub country: Country,
    pub mode: FilterMode,
    pub layout: InputLayout,
    pub workers: usize,
    pub worker_concurrency: usize,
    pub fetch: FetchConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `INPUT_CSV`, `OUTPUT_CSV`
    ///
    /// Optional:
    /// - `COUNTRY` (default DE), `FILTER_MODE` (page or domain; default page)
    /// - `URL_COLUMN` (1), `NON_ECOMMERCE_CSV`
    /// - `WORKERS` (available parallelism), `WORKER_CONCURRENCY` (1)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let input_csv = lookup("INPUT_CSV")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::Config("INPUT_CSV environment variable is required".to_string()))?;
        let output_csv = lookup("OUTPUT_CSV")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config("OUTPUT_CSV environment variable is required".to_string())
            })?;

        let workers = parsed::<usize>(&lookup, "WORKERS")?
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));
        if workers == 0 {
            return Err(AppError::Config("WORKERS must be at least 1".to_string()));
        }

        Ok(Self {
            input_csv: PathBuf::from(input_csv),
            output_csv: PathBuf::from(output_csv),
            non_ecommerce_csv: lookup("NON_ECOMMERCE_CSV").map(PathBuf::from),
            country: parsed(&lookup, "COUNTRY")?.unwrap_or(Country::De),
            mode: parsed(&lookup, "FILTER_MODE")?.unwrap_or(FilterMode::Page),
            layout: InputLayout {
                url_column: parsed(&lookup, "URL_COLUMN")?.unwrap_or(1),
                ..InputLayout::default()
            },
            workers,
            worker_concurrency: parsed::<usize>(&lookup, "WORKER_CONCURRENCY")?
                .unwrap_or(1)
                .max(1),
            fetch: FetchConfig::from_env(),
        })
    }
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
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        Config::from_lookup(|key| map.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_to_page_mode_on_second_column() {
        let config = load(&[("INPUT_CSV", "nl.csv"), ("OUTPUT_CSV", "nl_labels.csv")]).unwrap();
        assert_eq!(config.mode, FilterMode::Page);
        assert_eq!(config.layout.url_column, 1);
        assert!(config.layout.has_header);
        assert!(config.non_ecommerce_csv.is_none());
    }

    #[test]
    fn domain_mode_for_dutch_list() {
        let config = load(&[
            ("INPUT_CSV", "nl.csv"),
            ("OUTPUT_CSV", "nl_labels.csv"),
            ("COUNTRY", "NL"),
            ("FILTER_MODE", "domain"),
            ("NON_ECOMMERCE_CSV", "nl_non_ecommerce.csv"),
        ])
        .unwrap();
        assert_eq!(config.country, Country::Nl);
        assert_eq!(config.mode, FilterMode::Domain);
        assert_eq!(
            config.non_ecommerce_csv,
            Some(PathBuf::from("nl_non_ecommerce.csv"))
        );
    }

    #[test]
    fn missing_output_and_bad_mode() {
        assert!(matches!(
            load(&[("INPUT_CSV", "a.csv")]),
            Err(AppError::Config(msg)) if msg.contains("OUTPUT_CSV")
        ));
        assert!(load(&[
            ("INPUT_CSV", "a.csv"),
            ("OUTPUT_CSV", "b.csv"),
            ("FILTER_MODE", "whois"),
        ])
        .is_err());
    }
}
