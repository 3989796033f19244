use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde_json::Value;

use super::Extractor;
use crate::client::RawPage;
use crate::html::{
    document_text, element_text, json_ld_blocks, json_ld_nodes, selector, TextScope,
};
use crate::record::{phone_digits, ContactDetails, PartialResult};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex")
});
/// Separated digit groups, e.g. `+1 (555) 123-4567` or `020 7946 0958`.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+\d{1,3}[\s.-]?)?(?:\(\d{2,4}\)|\d{2,4})[\s.-]\d{3,4}[\s.-]\d{3,4}")
        .expect("valid phone regex")
});

/// File extensions that show up in `name@2x.png`-style asset names.
const ASSET_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".js", ".css"];

const ADDRESS_SELECTORS: &str = "address, [class*='address'], [itemprop='address']";
const MAX_ADDRESS_CHARS: usize = 300;

/// Extracts emails, phone numbers and a postal address.
#[derive(Debug, Default)]
pub struct ContactExtractor;

impl Extractor for ContactExtractor {
    type Output = ContactDetails;

    fn name(&self) -> &'static str {
        "contact_patterns"
    }

    fn extract(&self, page: &RawPage) -> PartialResult<ContactDetails> {
        let doc = Html::parse_document(&page.body);
        let text = document_text(&doc, TextScope::Visible);

        let mut details = ContactDetails::default();
        details.merge(ContactDetails {
            emails: link_targets(&doc, "mailto:"),
            phone_numbers: link_targets(&doc, "tel:"),
            address: None,
        });
        details.merge(ContactDetails {
            emails: EMAIL_RE
                .find_iter(&text)
                .map(|m| m.as_str().to_owned())
                .collect(),
            phone_numbers: PHONE_RE
                .find_iter(&text)
                .map(|m| m.as_str().trim().to_owned())
                .collect(),
            address: json_ld_address(&doc).or_else(|| markup_address(&doc)),
        });

        details.emails = details
            .emails
            .into_iter()
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| is_plausible_email(e))
            .collect();
        details.phone_numbers.retain(|p| is_plausible_phone(p));

        if details.is_empty() {
            return PartialResult::not_found(format!("no contact details on {}", page.url));
        }
        PartialResult::found(details, &page.url, self.name())
    }
}

/// Values of `mailto:`/`tel:` links, without the scheme or query.
fn link_targets(doc: &Html, scheme: &str) -> Vec<String> {
    let Some(sel) = selector(&format!("a[href^='{scheme}' i]")) else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let value = href.get(scheme.len()..)?.split('?').next()?.trim();
            (!value.is_empty()).then(|| value.to_owned())
        })
        .collect()
}

fn is_plausible_email(email: &str) -> bool {
    !ASSET_SUFFIXES.iter().any(|suffix| email.ends_with(suffix))
}

fn is_plausible_phone(phone: &str) -> bool {
    (7..=15).contains(&phone_digits(phone).len())
}

fn json_ld_address(doc: &Html) -> Option<String> {
    const PARTS: &[&str] = &[
        "streetAddress",
        "addressLocality",
        "addressRegion",
        "postalCode",
        "addressCountry",
    ];

    let blocks = json_ld_blocks(doc);
    json_ld_nodes(&blocks).into_iter().find_map(|node| {
        let address = node.get("address")?;
        if let Value::String(single_line) = address {
            let trimmed = single_line.trim();
            return (!trimmed.is_empty()).then(|| trimmed.to_owned());
        }
        let joined = PARTS
            .iter()
            .filter_map(|key| match address.get(key)? {
                Value::String(s) => Some(s.trim().to_owned()),
                Value::Object(country) => country.get("name")?.as_str().map(str::to_owned),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        (!joined.is_empty()).then_some(joined)
    })
}

fn markup_address(doc: &Html) -> Option<String> {
    let sel = selector(ADDRESS_SELECTORS)?;
    doc.select(&sel)
        .map(|el| element_text(el, TextScope::Visible))
        .find(|text| {
            (10..=MAX_ADDRESS_CHARS).contains(&text.chars().count())
                && text.chars().any(|c| c.is_ascii_digit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> PartialResult<ContactDetails> {
        ContactExtractor.extract(&RawPage::new("https://shop.example.com/pages/contact", html))
    }

    #[test]
    fn mailto_tel_and_text_patterns_are_unioned() {
        let html = r#"
        <footer>
          <a href="mailto:Hello@Shop.example.com?subject=Hi">Email us</a>
          <a href="tel:+15551234567">Call</a>
          <p>Press: press@shop.example.com or hello@shop.example.com</p>
          <p>Phone: +1 (555) 123-4567</p>
          <img src="/logo@2x.png">
        </footer>
        "#;
        let details = extract(html).into_value().unwrap();
        assert_eq!(
            details.emails,
            vec!["hello@shop.example.com", "press@shop.example.com"]
        );
        assert_eq!(details.phone_numbers, vec!["+15551234567"]);
    }

    #[test]
    fn dates_and_prices_are_not_phone_numbers() {
        let html = "<p>Sale ends 2024-01-01. Boots from $1,299.00. Order 12345.</p>";
        assert!(!extract(html).is_found());
    }

    #[test]
    fn address_prefers_json_ld() {
        let html = r#"
        <script type="application/ld+json">
        {"@type":"Organization","address":{"@type":"PostalAddress","streetAddress":"12 Mill St","addressLocality":"Portland","addressRegion":"OR","postalCode":"97201","addressCountry":"US"}}
        </script>
        <address>PO Box 99, Somewhere 00000</address>
        "#;
        let details = extract(html).into_value().unwrap();
        assert_eq!(details.address.as_deref(), Some("12 Mill St, Portland, OR, 97201, US"));
    }

    #[test]
    fn address_from_markup() {
        let html = "<div class='store-address'>12 Mill St, Portland, OR 97201</div>";
        let details = extract(html).into_value().unwrap();
        assert_eq!(details.address.as_deref(), Some("12 Mill St, Portland, OR 97201"));
    }

    #[test]
    fn asset_names_are_not_emails() {
        assert!(!extract("<p>icon@2x.png sprite@3x.webp</p>").is_found());
    }
}
