use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;

use super::{is_question, Extractor};
use crate::client::RawPage;
use crate::html::{
    clean_text, document_text, element_text, json_ld_blocks, json_ld_is_type, json_ld_nodes,
    selector, truncate_chars, TextScope,
};
use crate::record::{Faq, PartialResult};

static Q_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)Q(?:uestion)?\s*:\s*").expect("valid question regex"));
static A_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\sA(?:nswer)?\s*:\s*").expect("valid answer regex"));

/// Toggle elements of accordion/collapsible widgets.
const ACCORDION_QUESTION_SELECTORS: &str = "[class*='accordion'] button, \
    [class*='accordion__title'], [class*='accordion-title'], \
    [class*='accordion__header'], [class*='accordion-header'], \
    [class*='faq'] button, [class*='faq__question'], [class*='faq-question'], \
    [class*='collapsible'] button, [class*='toggle'] button, [aria-controls]";

const HEADING_SELECTORS: &str = "h2, h3, h4, h5, h6";

const MIN_QUESTION_CHARS: usize = 3;
const MAX_QUESTION_CHARS: usize = 300;
const MAX_ANSWER_CHARS: usize = 2_000;

/// Siblings scanned after a question heading.
const MAX_HEADING_ANSWER_BLOCKS: usize = 3;

/// Extracts question/answer pairs.
///
/// Techniques run in a fixed order and the first one that yields at least
/// one pair wins for the page.
#[derive(Debug)]
pub struct FaqExtractor {
    min_answer_chars: usize,
    max_entries: usize,
}

impl FaqExtractor {
    #[must_use]
    pub fn new(min_answer_chars: usize, max_entries: usize) -> Self {
        Self {
            min_answer_chars,
            max_entries,
        }
    }

    fn collect(&self, raw: impl IntoIterator<Item = (String, String)>) -> Vec<Faq> {
        let mut seen = HashSet::new();
        raw.into_iter()
            .filter_map(|(q, a)| {
                let question = clean_text(&q);
                let answer = truncate_chars(&clean_text(&a), MAX_ANSWER_CHARS);
                let q_len = question.chars().count();
                let valid = (MIN_QUESTION_CHARS..=MAX_QUESTION_CHARS).contains(&q_len)
                    && answer.chars().count() >= self.min_answer_chars
                    && answer != question;
                valid.then_some(Faq { question, answer })
            })
            .filter(|faq| seen.insert(faq.question.to_lowercase()))
            .take(self.max_entries)
            .collect()
    }
}

type Technique = fn(&Html) -> Vec<(String, String)>;

const TECHNIQUES: &[(&str, Technique)] = &[
    ("json_ld", from_json_ld),
    ("details_summary", from_details),
    ("accordion", from_accordion),
    ("question_headings", from_headings),
    ("definition_list", from_definition_lists),
    ("qa_text", from_qa_text),
];

impl Extractor for FaqExtractor {
    type Output = Vec<Faq>;

    fn name(&self) -> &'static str {
        "faq_markup"
    }

    fn extract(&self, page: &RawPage) -> PartialResult<Vec<Faq>> {
        let doc = Html::parse_document(&page.body);
        for (technique, run) in TECHNIQUES {
            let faqs = self.collect(run(&doc));
            if !faqs.is_empty() {
                return PartialResult::found(faqs, &page.url, self.name())
                    .with_technique(*technique);
            }
        }
        PartialResult::not_found(format!("no question/answer pairs on {}", page.url))
    }
}

fn from_json_ld(doc: &Html) -> Vec<(String, String)> {
    let blocks = json_ld_blocks(doc);
    json_ld_nodes(&blocks)
        .into_iter()
        .filter(|node| json_ld_is_type(node, "FAQPage"))
        .flat_map(|node| match node.get("mainEntity") {
            Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
            Some(item @ Value::Object(_)) => vec![item],
            _ => Vec::new(),
        })
        .filter_map(|question| {
            let name = question.get("name")?.as_str()?;
            let answer = match question.get("acceptedAnswer")? {
                Value::Array(answers) => answers.first()?.get("text")?.as_str()?,
                other => other.get("text")?.as_str()?,
            };
            Some((name.to_owned(), strip_markup(answer)))
        })
        .collect()
}

fn strip_markup(text: &str) -> String {
    if text.contains('<') {
        element_text(Html::parse_fragment(text).root_element(), TextScope::Visible)
    } else {
        text.to_owned()
    }
}

fn from_details(doc: &Html) -> Vec<(String, String)> {
    let (Some(details_sel), Some(summary_sel)) = (selector("details"), selector("summary")) else {
        return Vec::new();
    };
    doc.select(&details_sel)
        .filter_map(|details| {
            let summary = details.select(&summary_sel).next()?;
            let question = element_text(summary, TextScope::Visible);
            let answer = details
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() != "summary")
                .map(|child| element_text(child, TextScope::Visible))
                .collect::<Vec<_>>()
                .join(" ");
            Some((question, answer))
        })
        .collect()
}

fn from_accordion(doc: &Html) -> Vec<(String, String)> {
    let Some(sel) = selector(ACCORDION_QUESTION_SELECTORS) else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|toggle| {
            let question = element_text(toggle, TextScope::Visible);
            if !is_question(&question) {
                return None;
            }
            let answer = controlled_panel(doc, toggle).or_else(|| following_panel(toggle))?;
            Some((question, element_text(answer, TextScope::Visible)))
        })
        .collect()
}

/// The element named by the toggle's `aria-controls`.
fn controlled_panel<'a>(doc: &'a Html, toggle: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let id = toggle.value().attr("aria-controls")?.trim();
    if id.is_empty() {
        return None;
    }
    let sel = selector("[id]")?;
    doc.select(&sel).find(|el| el.value().id() == Some(id))
}

/// The next element after the toggle, or after one of its two nearest ancestors.
fn following_panel(toggle: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut current = toggle;
    for _ in 0..3 {
        if let Some(next) = current.next_siblings().find_map(ElementRef::wrap) {
            return Some(next);
        }
        current = current.parent().and_then(ElementRef::wrap)?;
    }
    None
}

fn from_headings(doc: &Html) -> Vec<(String, String)> {
    let Some(sel) = selector(HEADING_SELECTORS) else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|heading| {
            let question = element_text(heading, TextScope::Visible);
            if !is_question(&question) {
                return None;
            }
            let answer = heading
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .take_while(|sib| !is_heading(sib.value().name()))
                .take(MAX_HEADING_ANSWER_BLOCKS)
                .map(|sib| element_text(sib, TextScope::Visible))
                .collect::<Vec<_>>()
                .join(" ");
            Some((question, answer))
        })
        .collect()
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn from_definition_lists(doc: &Html) -> Vec<(String, String)> {
    let Some(sel) = selector("dl") else {
        return Vec::new();
    };
    let mut pairs = Vec::new();
    for dl in doc.select(&sel) {
        let mut pending: Option<String> = None;
        for child in dl.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "dt" => pending = Some(element_text(child, TextScope::Visible)),
                "dd" => {
                    if let Some(question) = pending.take() {
                        pairs.push((question, element_text(child, TextScope::Visible)));
                    }
                }
                _ => {}
            }
        }
    }
    pairs
}

fn from_qa_text(doc: &Html) -> Vec<(String, String)> {
    let text = document_text(doc, TextScope::Content);
    Q_MARKER_RE
        .split(&text)
        .skip(1)
        .filter_map(|segment| {
            let mut parts = A_MARKER_RE.splitn(segment, 2);
            let question = parts.next()?;
            let answer = parts.next()?;
            Some((question.to_owned(), answer.to_owned()))
        })
        .collect()
}

#[cfg(test)]
#[path = "faq_test.rs"]
mod tests;
