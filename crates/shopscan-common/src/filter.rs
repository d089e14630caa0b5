/// Business-type pre-filter.
///
/// Assigns each URL a coarse label before scoring: 0 when the site is clearly a
/// non-shopping business (an exclusion token on the page, or an excluded fragment in the
/// domain), 1 otherwise, -99 when the page could not be fetched.
use std::io::Write;
use std::str::FromStr;

use crate::dispatch::Indexed;
use crate::error::CommonError;
use crate::io::write_rows;
use crate::model::{Label, UrlRecord};
use crate::rules::RuleSet;
use crate::scoring::{find_domain_exclusion, find_exclusion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Fetch each page and look for exclusion tokens in it.
    Page,
    /// Inspect the host name only; nothing is fetched.
    Domain,
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "page" => Ok(FilterMode::Page),
            "domain" => Ok(FilterMode::Domain),
            other => Err(format!("unknown filter mode '{other}' (expected page or domain)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub index: usize,
    pub url: String,
    pub label: Label,
    /// Exclusion token or domain fragment that produced a 0 label.
    pub matched: Option<String>,
    /// Fetch error text for -99 labels.
    pub error: Option<String>,
}

impl Indexed for FilterResult {
    fn index(&self) -> usize {
        self.index
    }
}

impl FilterResult {
    fn new(record: &UrlRecord, label: Label) -> Self {
        Self {
            index: record.index,
            url: record.url.clone(),
            label,
            matched: None,
            error: None,
        }
    }

    pub fn fetch_failed(record: &UrlRecord, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(record, Label::FetchError)
        }
    }
}

/// Label a URL from its host alone.
pub fn classify_domain(record: &UrlRecord, rules: &RuleSet) -> FilterResult {
    match find_domain_exclusion(&record.url, rules) {
        Some(fragment) => FilterResult {
            matched: Some(fragment.to_string()),
            ..FilterResult::new(record, Label::NotEcommerce)
        },
        None => FilterResult::new(record, Label::Ecommerce),
    }
}

/// Label a URL from its fetched page text.
pub fn classify_page(record: &UrlRecord, page_text: &str, rules: &RuleSet) -> FilterResult {
    match find_exclusion(page_text, rules) {
        Some(token) => FilterResult {
            matched: Some(token.to_string()),
            ..FilterResult::new(record, Label::NotEcommerce)
        },
        None => FilterResult::new(record, Label::Ecommerce),
    }
}

/// Write `URL, E-commerce Indicator` rows.
pub fn write_labels<W: Write>(writer: W, results: &[FilterResult]) -> Result<(), CommonError> {
    write_rows(
        writer,
        &["URL", "E-commerce Indicator"],
        results
            .iter()
            .map(|r| vec![r.url.clone(), r.label.code().to_string()]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Country;

    #[test]
    fn domain_mode_labels() {
        let rules = RuleSet::for_country(Country::Nl);
        let barber = UrlRecord::new(0, "https://www.barbershop-utrecht.nl/prijzen");
        let dentist = UrlRecord::new(1, "tandartsdentalcare.nl");
        let shop = UrlRecord::new(2, "https://www.fietsenwinkel.nl");

        let r = classify_domain(&barber, &rules);
        assert_eq!(r.label, Label::NotEcommerce);
        assert_eq!(r.matched.as_deref(), Some("barb"));
        assert_eq!(classify_domain(&dentist, &rules).label, Label::NotEcommerce);
        assert_eq!(classify_domain(&shop, &rules).label, Label::Ecommerce);
    }

    #[test]
    fn page_mode_labels() {
        let rules = RuleSet::for_country(Country::De);
        let record = UrlRecord::new(4, "https://salon.de");
        let excluded = classify_page(&record, "<h1>Ihr Friseursalon in Köln</h1>", &rules);
        assert_eq!(excluded.label, Label::NotEcommerce);
        assert_eq!(excluded.matched.as_deref(), Some("Friseursalon"));
        assert_eq!(excluded.index, 4);

        let kept = classify_page(&record, "<h1>Online-Shop</h1>", &rules);
        assert_eq!(kept.label, Label::Ecommerce);
        assert!(kept.matched.is_none());
    }

    #[test]
    fn fetch_failure_label() {
        let record = UrlRecord::new(0, "https://down.de");
        let r = FilterResult::fetch_failed(&record, "connection refused");
        assert_eq!(r.label.code(), -99);
        assert_eq!(r.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn writes_label_csv() {
        let a = UrlRecord::new(0, "https://a.nl");
        let b = UrlRecord::new(1, "https://b.nl");
        let results = vec![
            FilterResult::fetch_failed(&a, "timeout"),
            FilterResult {
                matched: None,
                ..FilterResult::new(&b, Label::Ecommerce)
            },
        ];
        let mut out = Vec::new();
        write_labels(&mut out, &results).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "URL,E-commerce Indicator\nhttps://a.nl,-99\nhttps://b.nl,1\n"
        );
    }

    #[test]
    fn parse_mode() {
        assert_eq!("Domain".parse::<FilterMode>(), Ok(FilterMode::Domain));
        assert!("dns".parse::<FilterMode>().is_err());
    }
}
