/// Keyword rule sets.
///
/// A rule set is immutable configuration loaded once per run, either from the built-in
/// per-country tables below or from a JSON file. Tokens are matched against raw page
/// text by the scoring engine according to the set's `MatchPolicy`.
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::CommonError;

/// Language corpus a keyword belongs to. English tokens show up in every country's set
/// because many regional sites use English booking and checkout wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    German,
    Dutch,
    Polish,
    English,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub token: String,
    pub weight: u32,
    pub language: Language,
}

/// How rule tokens are compared with page text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Literal, case-sensitive substring. No stemming, no word boundaries.
    #[default]
    Substring,
    /// Case-insensitive whole-token match. Multi-word tokens match consecutive words.
    Token,
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "substring" => Ok(MatchPolicy::Substring),
            "token" => Ok(MatchPolicy::Token),
            other => Err(format!("unknown match policy '{other}' (expected substring or token)")),
        }
    }
}

/// A fixed bonus added when `fragment` occurs in the lowercased URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlBonus {
    pub fragment: String,
    pub weight: u32,
}

/// Fixed bonuses for structural page signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalBonuses {
    /// A `<form>` whose `action` contains "checkout".
    pub checkout_form: u32,
    /// A `<button>` whose text contains one of the buy phrases.
    pub buy_button: u32,
}

impl Default for SignalBonuses {
    fn default() -> Self {
        Self {
            checkout_form: 5,
            buy_button: 5,
        }
    }
}

/// Country a built-in rule set targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Country {
    De,
    At,
    Nl,
    Pl,
}

impl Country {
    pub fn code(self) -> &'static str {
        match self {
            Country::De => "DE",
            Country::At => "AT",
            Country::Nl => "NL",
            Country::Pl => "PL",
        }
    }
}

impl FromStr for Country {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DE" => Ok(Country::De),
            "AT" => Ok(Country::At),
            "NL" => Ok(Country::Nl),
            "PL" => Ok(Country::Pl),
            other => Err(format!("unknown country '{other}' (expected DE, AT, NL or PL)")),
        }
    }
}

/// On-disk shape of a rule set. Everything except `name` and `rules` is optional.
#[derive(Debug, Deserialize)]
struct RuleSetFile {
    name: String,
    #[serde(default)]
    policy: MatchPolicy,
    rules: Vec<KeywordRule>,
    #[serde(default)]
    exclusions: Vec<String>,
    #[serde(default)]
    domain_exclusions: Vec<String>,
    #[serde(default)]
    url_bonuses: Vec<UrlBonus>,
    #[serde(default)]
    signals: SignalBonuses,
    #[serde(default = "default_buy_phrases")]
    buy_phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSet {
    name: String,
    policy: MatchPolicy,
    rules: Vec<KeywordRule>,
    exclusions: Vec<String>,
    domain_exclusions: Vec<String>,
    url_bonuses: Vec<UrlBonus>,
    signals: SignalBonuses,
    buy_phrases: Vec<String>,
}

impl RuleSet {
    /// Build a rule set from keyword rules with default bonuses and no exclusions.
    ///
    /// Duplicate tokens keep their first occurrence. Fails on empty tokens or zero weights.
    pub fn new(name: impl Into<String>, rules: Vec<KeywordRule>) -> Result<Self, CommonError> {
        let name = name.into();
        let rules = dedup_rules(&name, rules)?;
        Ok(Self {
            name,
            policy: MatchPolicy::default(),
            rules,
            exclusions: Vec::new(),
            domain_exclusions: Vec::new(),
            url_bonuses: Vec::new(),
            signals: SignalBonuses::default(),
            buy_phrases: default_buy_phrases(),
        })
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_exclusions(mut self, tokens: &[&str]) -> Self {
        self.exclusions = tokens.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_domain_exclusions(mut self, fragments: &[&str]) -> Self {
        self.domain_exclusions = fragments.iter().map(|f| f.to_ascii_lowercase()).collect();
        self
    }

    pub fn with_url_bonuses(mut self, bonuses: &[(&str, u32)]) -> Self {
        self.url_bonuses = bonuses
            .iter()
            .map(|(fragment, weight)| UrlBonus {
                fragment: fragment.to_ascii_lowercase(),
                weight: *weight,
            })
            .collect();
        self
    }

    pub fn with_signal_bonuses(mut self, signals: SignalBonuses) -> Self {
        self.signals = signals;
        self
    }

    /// Built-in rule set for a country.
    pub fn for_country(country: Country) -> Self {
        let (rules, name) = match country {
            Country::De => (german_rules(), "german-de"),
            Country::At => (german_rules(), "german-at"),
            Country::Nl => (dutch_rules(), "dutch-nl"),
            Country::Pl => (polish_rules(), "polish-pl"),
        };
        // Built-in tables are unique with positive weights, so they skip validation.
        let base = Self {
            name: name.to_string(),
            policy: MatchPolicy::default(),
            rules: rules
                .into_iter()
                .map(|(token, weight, language)| KeywordRule {
                    token: token.to_string(),
                    weight,
                    language,
                })
                .collect(),
            exclusions: Vec::new(),
            domain_exclusions: Vec::new(),
            url_bonuses: Vec::new(),
            signals: SignalBonuses::default(),
            buy_phrases: default_buy_phrases(),
        };

        base.with_exclusions(&["Barbershop", "Notarfachangestellte", "Friseursalon"])
            .with_domain_exclusions(&["barb", "dent", "orthodont", "law"])
            .with_url_bonuses(&[("pension", 15), ("hotel", 15), ("cityhotel", 15)])
    }

    /// Parse a rule set from JSON.
    pub fn from_json(json: &str) -> Result<Self, CommonError> {
        let file: RuleSetFile = serde_json::from_str(json)
            .map_err(|e| CommonError::RuleSet(format!("invalid rule set JSON: {e}")))?;
        let rules = dedup_rules(&file.name, file.rules)?;
        reject_blank(&file.name, "exclusion token", file.exclusions.iter())?;
        reject_blank(&file.name, "domain exclusion", file.domain_exclusions.iter())?;
        reject_blank(
            &file.name,
            "url bonus fragment",
            file.url_bonuses.iter().map(|b| &b.fragment),
        )?;
        reject_blank(&file.name, "buy phrase", file.buy_phrases.iter())?;
        Ok(Self {
            name: file.name,
            policy: file.policy,
            rules,
            exclusions: file.exclusions,
            domain_exclusions: file
                .domain_exclusions
                .iter()
                .map(|f| f.to_ascii_lowercase())
                .collect(),
            url_bonuses: file
                .url_bonuses
                .into_iter()
                .map(|b| UrlBonus {
                    fragment: b.fragment.to_ascii_lowercase(),
                    weight: b.weight,
                })
                .collect(),
            signals: file.signals,
            buy_phrases: file
                .buy_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        })
    }

    /// Load a JSON rule set from disk.
    pub fn load(path: &Path) -> Result<Self, CommonError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    pub fn domain_exclusions(&self) -> &[String] {
        &self.domain_exclusions
    }

    pub fn url_bonuses(&self) -> &[UrlBonus] {
        &self.url_bonuses
    }

    pub fn signals(&self) -> SignalBonuses {
        self.signals
    }

    pub fn buy_phrases(&self) -> &[String] {
        &self.buy_phrases
    }

    /// Sum of all rule weights: the denominator of the score.
    pub fn total_weight(&self) -> u32 {
        self.rules.iter().map(|r| r.weight).sum()
    }

    /// Stable hex digest of the whole rule set, used to namespace cached scores.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        match serde_json::to_vec(self) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(self.name.as_bytes()),
        }
        let hash = hasher.finalize();
        format!("{:x}", hash)
    }
}

fn dedup_rules(name: &str, rules: Vec<KeywordRule>) -> Result<Vec<KeywordRule>, CommonError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rules.len());
    for rule in rules {
        if rule.token.is_empty() {
            return Err(CommonError::RuleSet(format!("rule set '{name}' has an empty token")));
        }
        if rule.weight == 0 {
            return Err(CommonError::RuleSet(format!(
                "rule set '{name}': token '{}' has zero weight",
                rule.token
            )));
        }
        if !seen.insert(rule.token.clone()) {
            warn!(rule_set = name, token = %rule.token, "duplicate keyword, keeping first weight");
            continue;
        }
        out.push(rule);
    }
    Ok(out)
}

/// Blank entries would match every page or host, so they are refused outright.
fn reject_blank<'a>(
    name: &str,
    what: &str,
    mut values: impl Iterator<Item = &'a String>,
) -> Result<(), CommonError> {
    if values.any(|v| v.trim().is_empty()) {
        return Err(CommonError::RuleSet(format!("rule set '{name}' has an empty {what}")));
    }
    Ok(())
}

fn default_buy_phrases() -> Vec<String> {
    ["buy", "add to cart", "kaufen", "in den warenkorb", "in winkelwagen", "do koszyka"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn german_rules() -> Vec<(&'static str, u32, Language)> {
    use Language::{English, German};
    vec![
        ("Kundenerkennung", 1, German),
        ("Individuelle Preisgestaltung", 1, German),
        ("Sitzungsmanagement", 1, German),
        ("cart", 10, English),
        ("online", 3, English),
        ("shop", 3, English),
        ("Online-Shop", 10, German),
        ("leistungen", 10, German),
        ("Leinstungen", 10, German),
        ("service", 1, English),
        ("Service", 1, English),
        ("familien", 1, German),
        ("Reservierung", 10, German),
        ("versicherung", 10, German),
        ("Mitgliedschaft", 10, German),
        ("datenshutz", 1, German),
        ("BUCHEN", 10, German),
        ("Buchen", 10, German),
        ("buchen", 10, German),
        ("Buchung", 10, German),
        ("buchung", 10, German),
        ("DIRECTBUCHUNG", 10, German),
        ("Book", 10, English),
        ("BOOK", 10, English),
        ("Booking", 10, English),
        ("booking", 10, English),
        ("rentcar", 4, English),
        ("rentacar", 4, English),
        ("rent", 4, English),
        ("Rental", 6, English),
        ("reservation", 5, English),
        ("checkout", 10, English),
        ("payment", 5, English),
        ("pay", 5, English),
        ("Transporter Mieten", 5, German),
        ("Kostenlose Rücksendung", 10, German),
        ("been blocked by bot", 10, English),
        ("robots", 5, English),
        ("Vorteilswelt", 5, German),
        ("Zimmer", 5, German),
        ("ZIMMER", 5, German),
        ("Einkaufswagen", 10, German),
        ("wellness", 5, English),
        ("suiten", 5, German),
        ("SUITEN", 5, German),
        ("ANFRAGE", 5, German),
        ("Anfrage", 5, German),
        ("delivery", 10, English),
    ]
}

fn dutch_rules() -> Vec<(&'static str, u32, Language)> {
    use Language::{Dutch, English};
    vec![
        ("Klantenherkenning", 1, Dutch),
        ("Individuele prijsstelling", 1, Dutch),
        ("Sessiebeheer", 1, Dutch),
        ("cart", 10, English),
        ("online", 3, English),
        ("shop", 3, English),
        ("Online-winkel", 10, Dutch),
        ("diensten", 10, Dutch),
        ("service", 1, English),
        ("Service", 1, English),
        ("gezinnen", 1, Dutch),
        ("Reservering", 10, Dutch),
        ("verzekering", 10, Dutch),
        ("lidmaatschap", 10, Dutch),
        ("gegevensbescherming", 1, Dutch),
        ("Book", 10, English),
        ("BOOK", 10, English),
        ("Booking", 10, English),
        ("booking", 10, English),
        ("Boek", 10, Dutch),
        ("Boeken", 10, Dutch),
        ("Kamer", 5, Dutch),
        ("rentcar", 4, English),
        ("rentacar", 4, English),
        ("rent", 4, English),
        ("Rental", 6, English),
        ("reservation", 5, English),
        ("Reservation", 5, English),
        ("checkout", 10, English),
        ("payment", 5, English),
        ("pay", 5, English),
        ("Vrachtwagen huren", 5, Dutch),
        ("Gratis retourzending", 10, Dutch),
        ("been blocked by bot", 10, English),
        ("robots", 5, English),
        ("Voordelenwereld", 5, Dutch),
        ("Kamers", 5, Dutch),
        ("KAMERS", 5, Dutch),
        ("Winkelwagentje", 10, Dutch),
        ("wellness", 5, English),
        ("suites", 15, English),
        ("SUITES", 15, English),
        ("Rooms", 15, English),
        ("AANVRAAG", 5, Dutch),
        ("Aanvraag", 5, Dutch),
        ("delivery", 10, English),
    ]
}

fn polish_rules() -> Vec<(&'static str, u32, Language)> {
    use Language::{English, Polish};
    vec![
        ("koszyk", 10, Polish),
        ("Koszyk", 10, Polish),
        ("kasa", 5, Polish),
        ("sklep", 3, Polish),
        ("sklep internetowy", 10, Polish),
        ("rezerwacja", 10, Polish),
        ("Rezerwacja", 10, Polish),
        ("rezerwuj", 10, Polish),
        ("pokój", 5, Polish),
        ("pokoje", 5, Polish),
        ("bilet", 5, Polish),
        ("ubezpieczenie", 10, Polish),
        ("produkt", 3, Polish),
        ("zamówienie", 10, Polish),
        ("dostawa", 10, Polish),
        ("płatność", 5, Polish),
        ("cart", 10, English),
        ("online", 3, English),
        ("shop", 3, English),
        ("checkout", 10, English),
        ("Booking", 10, English),
        ("booking", 10, English),
        ("payment", 5, English),
        ("delivery", 10, English),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(token: &str, weight: u32) -> KeywordRule {
        KeywordRule {
            token: token.to_string(),
            weight,
            language: Language::English,
        }
    }

    #[test]
    fn builtin_sets_are_valid() {
        for country in [Country::De, Country::At, Country::Nl, Country::Pl] {
            let set = RuleSet::for_country(country);
            assert!(!set.rules().is_empty(), "{} has no rules", country.code());
            let unique: HashSet<&str> = set.rules().iter().map(|r| r.token.as_str()).collect();
            assert_eq!(unique.len(), set.rules().len(), "{} has duplicate tokens", country.code());
            assert!(set.total_weight() > 0);
            assert!(set.rules().iter().all(|r| r.weight > 0));
            assert_eq!(set.exclusions().len(), 3);
        }
    }

    #[test]
    fn duplicate_tokens_keep_first() {
        let set = RuleSet::new("dups", vec![rule("shop", 3), rule("cart", 7), rule("shop", 9)])
            .expect("valid rule set");
        assert_eq!(set.rules().len(), 2);
        assert_eq!(set.total_weight(), 10);
        assert_eq!(set.rules()[0].weight, 3);
    }

    #[test]
    fn zero_weight_rejected() {
        let err = RuleSet::new("bad", vec![rule("shop", 0)]).unwrap_err();
        assert!(err.to_string().contains("zero weight"));
        assert!(RuleSet::new("bad", vec![rule("", 1)]).is_err());
    }

    #[test]
    fn json_round_trip_defaults() {
        let json = r#"{
            "name": "custom",
            "policy": "token",
            "rules": [
                {"token": "shop", "weight": 3, "language": "english"},
                {"token": "Warenkorb", "weight": 7, "language": "german"}
            ],
            "exclusions": ["Friseursalon"],
            "url_bonuses": [{"fragment": "Hotel", "weight": 15}]
        }"#;
        let set = RuleSet::from_json(json).expect("valid JSON rule set");
        assert_eq!(set.name(), "custom");
        assert_eq!(set.policy(), MatchPolicy::Token);
        assert_eq!(set.total_weight(), 10);
        assert_eq!(set.url_bonuses()[0].fragment, "hotel");
        assert_eq!(set.signals(), SignalBonuses::default());
        assert!(set.buy_phrases().iter().any(|p| p == "add to cart"));
    }

    #[test]
    fn json_rejects_unknown_language() {
        let json = r#"{"name": "x", "rules": [{"token": "a", "weight": 1, "language": "klingon"}]}"#;
        assert!(matches!(RuleSet::from_json(json), Err(CommonError::RuleSet(_))));
    }

    #[test]
    fn json_rejects_blank_fragments_and_phrases() {
        let rules = r#""rules": [{"token": "shop", "weight": 3, "language": "english"}]"#;
        for (extra, what) in [
            (r#""exclusions": ["Barbershop", ""]"#, "exclusion token"),
            (r#""domain_exclusions": ["barb", ""]"#, "domain exclusion"),
            (r#""url_bonuses": [{"fragment": " ", "weight": 15}]"#, "url bonus fragment"),
            (r#""buy_phrases": ["kaufen", ""]"#, "buy phrase"),
        ] {
            let json = format!(r#"{{"name": "broken", {rules}, {extra}}}"#);
            match RuleSet::from_json(&json) {
                Err(CommonError::RuleSet(msg)) => assert!(msg.contains(what), "{msg}"),
                other => panic!("{extra} should be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = RuleSet::new("a", vec![rule("shop", 3)]).unwrap();
        let b = RuleSet::new("a", vec![rule("shop", 4)]).unwrap();
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), a.clone().with_policy(MatchPolicy::Token).fingerprint());
    }

    #[test]
    fn parse_country_and_policy() {
        assert_eq!("at".parse::<Country>(), Ok(Country::At));
        assert!("FR".parse::<Country>().is_err());
        assert_eq!("Token".parse::<MatchPolicy>(), Ok(MatchPolicy::Token));
        assert!("regex".parse::<MatchPolicy>().is_err());
    }
}
