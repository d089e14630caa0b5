/// Weighted keyword scoring engine.
///
/// score = (matched rule weights + URL bonuses + signal bonuses) / total rule weight * 100,
/// clamped to [0, 100]. An exclusion token anywhere in the page forces the score to 0.
/// The engine is a pure function of (url, page text, signals, rule set).
use crate::html::PageSignals;
use crate::rules::{MatchPolicy, RuleSet};

/// Full account of how a score was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    /// Final score in [0, 100].
    pub score: f64,
    /// Tokens of the rules that matched, in rule order.
    pub matched: Vec<String>,
    /// Sum of matched rule weights.
    pub keyword_weight: u32,
    /// Sum of URL and structural bonuses.
    pub bonus_weight: u32,
    /// The exclusion token that forced the score to zero, if any.
    pub excluded_by: Option<String>,
}

/// Score a fetched page.
pub fn score_page(url: &str, text: &str, signals: &PageSignals, rules: &RuleSet) -> ScoreBreakdown {
    let matcher = Matcher::new(text, rules.policy());

    if let Some(token) = rules.exclusions().iter().find(|t| matcher.contains(t)) {
        return ScoreBreakdown {
            score: 0.0,
            matched: Vec::new(),
            keyword_weight: 0,
            bonus_weight: 0,
            excluded_by: Some(token.clone()),
        };
    }

    let mut matched = Vec::new();
    let mut keyword_weight = 0u32;
    for rule in rules.rules() {
        if matcher.contains(&rule.token) {
            keyword_weight = keyword_weight.saturating_add(rule.weight);
            matched.push(rule.token.clone());
        }
    }

    let bonus_weight = url_bonus(url, rules).saturating_add(signal_bonus(signals, rules));

    let total = rules.total_weight();
    let score = if total == 0 {
        0.0
    } else {
        let raw = f64::from(keyword_weight.saturating_add(bonus_weight)) * 100.0 / f64::from(total);
        raw.clamp(0.0, 100.0)
    };

    ScoreBreakdown {
        score,
        matched,
        keyword_weight,
        bonus_weight,
        excluded_by: None,
    }
}

/// First exclusion token present in `text`, using the rule set's match policy.
pub fn find_exclusion<'a>(text: &str, rules: &'a RuleSet) -> Option<&'a str> {
    let matcher = Matcher::new(text, rules.policy());
    rules
        .exclusions()
        .iter()
        .find(|t| matcher.contains(t))
        .map(String::as_str)
}

/// First domain exclusion fragment contained in the URL's host.
pub fn find_domain_exclusion<'a>(url: &str, rules: &'a RuleSet) -> Option<&'a str> {
    let host = host_of(url).to_ascii_lowercase();
    rules
        .domain_exclusions()
        .iter()
        .find(|fragment| host.contains(fragment.as_str()))
        .map(String::as_str)
}

/// Host part of a URL. Falls back to plain string splitting for values that do not
/// parse as absolute URLs (bare domains in input files).
pub fn host_of(url: &str) -> String {
    if let Some(host) = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
    {
        return host;
    }
    let after_scheme = url.rsplit("//").next().unwrap_or(url);
    after_scheme.split('/').next().unwrap_or(after_scheme).to_string()
}

fn url_bonus(url: &str, rules: &RuleSet) -> u32 {
    let url = url.to_lowercase();
    rules
        .url_bonuses()
        .iter()
        .filter(|b| url.contains(b.fragment.as_str()))
        .fold(0u32, |acc, b| acc.saturating_add(b.weight))
}

fn signal_bonus(signals: &PageSignals, rules: &RuleSet) -> u32 {
    let bonuses = rules.signals();
    let mut total = 0u32;
    if signals.checkout_form {
        total = total.saturating_add(bonuses.checkout_form);
    }
    if signals.buy_button {
        total = total.saturating_add(bonuses.buy_button);
    }
    total
}

/// Page text prepared once for repeated token lookups.
enum Matcher<'a> {
    Substring(&'a str),
    Token(Vec<String>),
}

impl<'a> Matcher<'a> {
    fn new(text: &'a str, policy: MatchPolicy) -> Self {
        match policy {
            MatchPolicy::Substring => Matcher::Substring(text),
            MatchPolicy::Token => Matcher::Token(tokenize(text)),
        }
    }

    fn contains(&self, needle: &str) -> bool {
        match self {
            Matcher::Substring(text) => text.contains(needle),
            Matcher::Token(words) => {
                let phrase = tokenize(needle);
                if phrase.is_empty() || phrase.len() > words.len() {
                    return false;
                }
                words.windows(phrase.len()).any(|window| window == phrase.as_slice())
            }
        }
    }
}

/// Lowercased maximal runs of alphanumeric characters.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
