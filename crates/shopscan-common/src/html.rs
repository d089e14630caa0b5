/// HTML inspection helpers built on `scraper`.
///
/// Keyword scoring runs against raw response text; this module only extracts the
/// structural signals (checkout forms, buy buttons) and the visible text used for
/// prompt construction.
use std::sync::OnceLock;

use scraper::{Html, Node, Selector};

static FORM_SELECTOR: OnceLock<Selector> = OnceLock::new();
static BUTTON_SELECTOR: OnceLock<Selector> = OnceLock::new();

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Structural purchase signals found in a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSignals {
    pub checkout_form: bool,
    pub buy_button: bool,
}

impl PageSignals {
    /// Inspect forms and buttons. `buy_phrases` must already be lowercase.
    pub fn from_html(html: &str, buy_phrases: &[String]) -> Self {
        let document = Html::parse_document(html);

        let form_selector = FORM_SELECTOR
            .get_or_init(|| Selector::parse("form").expect("static 'form' CSS selector is valid"));
        let button_selector = BUTTON_SELECTOR.get_or_init(|| {
            Selector::parse("button").expect("static 'button' CSS selector is valid")
        });

        let checkout_form = document.select(form_selector).any(|form| {
            form.value()
                .attr("action")
                .is_some_and(|action| action.to_lowercase().contains("checkout"))
        });

        let buy_button = document.select(button_selector).any(|button| {
            let text = button.text().collect::<String>().to_lowercase();
            buy_phrases.iter().any(|phrase| text.contains(phrase.as_str()))
        });

        Self {
            checkout_form,
            buy_button,
        }
    }
}

/// Text a visitor would see: every text node outside script/style blocks, with
/// whitespace runs collapsed to single spaces.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(element) => HIDDEN_ELEMENTS.contains(&element.name()),
            _ => false,
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            out.push_str(trimmed);
            out.push(' ');
        }
    }

    compress_whitespace(&out)
}

pub fn compress_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
