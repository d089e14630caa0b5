/// Keyword and social media analysis of a fetched page, plus prompt construction.
use std::sync::OnceLock;

use regex::Regex;

use shopscan_common::dispatch::Indexed;

/// E-commerce terms: English word followed by its German, Dutch and Polish translations.
const ECOMMERCE_TERMS: &[(&str, [&str; 3])] = &[
    ("cart", ["warenkorb", "winkelwagen", "koszyk"]),
    ("checkout", ["kasse", "afrekenen", "kasa"]),
    ("book", ["buch", "boek", "książka"]),
    ("product", ["produkt", "product", "produkt"]),
    ("shop", ["geschäft", "winkel", "sklep"]),
    ("online shop", ["onlineshop", "webwinkel", "sklep internetowy"]),
    ("booking", ["buchung", "boeking", "rezerwacja"]),
    ("room", ["zimmer", "kamer", "pokój"]),
    ("ticket", ["ticket", "ticket", "bilet"]),
    ("insurance", ["versicherung", "verzekering", "ubezpieczenie"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Twitter,
    YouTube,
    TikTok,
    LinkedIn,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::YouTube,
        Platform::TikTok,
        Platform::LinkedIn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Platform::Twitter => "Twitter",
            Platform::YouTube => "YouTube",
            Platform::TikTok => "TikTok",
            Platform::LinkedIn => "LinkedIn",
        }
    }

    fn pattern(self) -> &'static Regex {
        static TWITTER: OnceLock<Regex> = OnceLock::new();
        static YOUTUBE: OnceLock<Regex> = OnceLock::new();
        static TIKTOK: OnceLock<Regex> = OnceLock::new();
        static LINKEDIN: OnceLock<Regex> = OnceLock::new();
        match self {
            Platform::Twitter => TWITTER.get_or_init(|| {
                Regex::new(r"(?i)twitter\.com/([A-Za-z0-9_]+)").expect("valid regex")
            }),
            Platform::YouTube => YOUTUBE.get_or_init(|| {
                Regex::new(r"(?i)youtube\.com/(channel|user)/([A-Za-z0-9_-]+)").expect("valid regex")
            }),
            Platform::TikTok => TIKTOK.get_or_init(|| {
                Regex::new(r"(?i)tiktok\.com/@([A-Za-z0-9_.]+)").expect("valid regex")
            }),
            Platform::LinkedIn => LINKEDIN.get_or_init(|| {
                Regex::new(r"(?i)linkedin\.com/in/([A-Za-z0-9_-]+)").expect("valid regex")
            }),
        }
    }

    /// First profile link for this platform, as matched (e.g. `twitter.com/acme`).
    pub fn find(self, text: &str) -> Option<String> {
        self.pattern().find(text).map(|m| m.as_str().to_string())
    }
}

/// Heuristic findings for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageAnalysis {
    pub ecommerce: bool,
    /// Profile link per platform, in `Platform::ALL` order.
    pub social: [Option<String>; 4],
}

/// Analyse a page. E-commerce terms are looked up in the visible text; social links in
/// the raw markup, where the hrefs live.
pub fn analyze(visible_text: &str, html: &str) -> PageAnalysis {
    PageAnalysis {
        ecommerce: mentions_ecommerce(visible_text),
        social: Platform::ALL.map(|platform| platform.find(html)),
    }
}

/// True when any term, in any of the four languages, occurs in the lowercased text.
pub fn mentions_ecommerce(text: &str) -> bool {
    let text = text.to_lowercase();
    ECOMMERCE_TERMS.iter().any(|(english, translations)| {
        text.contains(english) || translations.iter().any(|term| text.contains(term))
    })
}

pub fn build_prompt(page_text: &str) -> String {
    let questions = Platform::ALL
        .iter()
        .enumerate()
        .map(|(i, platform)| {
            let account = match platform {
                Platform::YouTube => "channel",
                _ => "account",
            };
            format!(
                "{}. Does this website have a {} {account}? Answer with \"Yes\" or \"No\" and provide the {} handle if available.",
                i + 2,
                platform.name(),
                platform.name()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Here is the content of the webpage:\n{page_text}\n\n\
         Based on this content, please answer the following:\n\n\
         1. Is this an eCommerce site? Answer with \"Yes\" or \"No\".\n\
         {questions}\n\n\
         Please provide the answers in a clear and concise format.\n"
    )
}

pub const OUTPUT_HEADER: [&str; 11] = [
    "URL",
    "eCommerce",
    "Twitter",
    "Twitter_value",
    "YouTube",
    "YouTube_value",
    "TikTok",
    "TikTok_value",
    "LinkedIn",
    "LinkedIn_value",
    "llama_response",
];

/// One output row. Produced for every input URL, including ones that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyRow {
    pub index: usize,
    pub url: String,
    pub analysis: PageAnalysis,
    /// Model answer; empty when the page or the model could not be reached.
    pub response: String,
}

impl Indexed for ClassifyRow {
    fn index(&self) -> usize {
        self.index
    }
}

impl ClassifyRow {
    pub fn to_record(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(OUTPUT_HEADER.len());
        row.push(self.url.clone());
        row.push(yes_no(self.analysis.ecommerce));
        for handle in &self.analysis.social {
            row.push(yes_no(handle.is_some()));
            row.push(handle.clone().unwrap_or_default());
        }
        row.push(self.response.clone());
        row
    }
}

fn yes_no(value: bool) -> String {
    let text = if value { "Yes" } else { "No" };
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecommerce_terms_in_all_languages() {
        assert!(mentions_ecommerce("Zum WARENKORB hinzufügen"));
        assert!(mentions_ecommerce("Ga naar afrekenen"));
        assert!(mentions_ecommerce("Dodaj do koszyka"));
        assert!(mentions_ecommerce("Rezerwuj pokój"));
        assert!(mentions_ecommerce("Add to Cart"));
        assert!(!mentions_ecommerce("Tandartspraktijk Delft, openingstijden en contact"));
    }

    #[test]
    fn extracts_social_links() {
        let html = r#"
            <a href="https://Twitter.com/AcmeWinkel">tw</a>
            <a href="https://www.youtube.com/channel/UC_abc-123">yt</a>
            <a href="https://www.linkedin.com/company/acme">li company page</a>
        "#;
        let analysis = analyze("welkom", html);
        assert!(!analysis.ecommerce);
        assert_eq!(analysis.social[0].as_deref(), Some("Twitter.com/AcmeWinkel"));
        assert_eq!(analysis.social[1].as_deref(), Some("youtube.com/channel/UC_abc-123"));
        assert_eq!(analysis.social[2], None);
        assert_eq!(analysis.social[3], None);
    }

    #[test]
    fn tiktok_handles_keep_dots() {
        assert_eq!(
            Platform::TikTok.find("see tiktok.com/@acme.shop_nl now").as_deref(),
            Some("tiktok.com/@acme.shop_nl")
        );
    }

    #[test]
    fn prompt_lists_five_questions() {
        let prompt = build_prompt("Fietsen kopen online");
        assert!(prompt.starts_with("Here is the content of the webpage:\nFietsen kopen online\n"));
        assert!(prompt.contains("1. Is this an eCommerce site?"));
        assert!(prompt.contains("3. Does this website have a YouTube channel?"));
        assert!(prompt.contains("5. Does this website have a LinkedIn account?"));
    }

    #[test]
    fn row_layout_matches_header() {
        let row = ClassifyRow {
            index: 0,
            url: "https://acme.nl".to_string(),
            analysis: PageAnalysis {
                ecommerce: true,
                social: [None, None, Some("tiktok.com/@acme".to_string()), None],
            },
            response: "1. Yes".to_string(),
        };
        let record = row.to_record();
        assert_eq!(record.len(), OUTPUT_HEADER.len());
        assert_eq!(
            record,
            vec![
                "https://acme.nl", "Yes", "No", "", "No", "", "Yes", "tiktok.com/@acme", "No", "",
                "1. Yes",
            ]
        );
    }
}
