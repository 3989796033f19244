use std::collections::BTreeMap;

use reqwest::Url;
use scraper::Html;

use super::Extractor;
use crate::client::RawPage;
use crate::html::{absolutize_url, anchors, meta_content, selector};
use crate::record::{PartialResult, SocialPlatform};

/// Regions scanned before the whole document; the first handle found per
/// platform wins.
const REGIONS: &[&str] = &[
    "footer, [class*='footer'], [id*='footer']",
    "header, [class*='header'], [id*='header']",
];

/// First path segments that are never a profile (share dialogs, posts, embeds).
const NON_PROFILE_SEGMENTS: &[&str] = &[
    "share", "sharer", "sharer.php", "intent", "dialog", "plugins", "tr", "home", "p", "reel",
    "reels", "watch", "embed", "hashtag", "search", "explore", "pin", "login", "signup",
];

/// Segments that prefix the actual handle (`/company/acme`, `/channel/UC...`).
const HANDLE_PREFIXES: &[&str] = &["company", "in", "channel", "c", "user", "add", "pages", "school"];

impl SocialPlatform {
    fn from_host(host: &str) -> Option<Self> {
        let host = host
            .trim_start_matches("www.")
            .trim_start_matches("m.")
            .trim_start_matches("mobile.");
        let platform = match host {
            "instagram.com" | "instagr.am" => SocialPlatform::Instagram,
            "facebook.com" | "fb.com" | "fb.me" => SocialPlatform::Facebook,
            "twitter.com" | "x.com" => SocialPlatform::Twitter,
            "youtube.com" => SocialPlatform::Youtube,
            "tiktok.com" => SocialPlatform::Tiktok,
            "linkedin.com" => SocialPlatform::Linkedin,
            "snapchat.com" => SocialPlatform::Snapchat,
            "wa.me" | "whatsapp.com" | "api.whatsapp.com" => SocialPlatform::Whatsapp,
            h if h == "pinterest.com" || h.starts_with("pinterest.") => SocialPlatform::Pinterest,
            _ => return None,
        };
        Some(platform)
    }
}

/// Finds social profile links and maps each platform to a handle.
#[derive(Debug, Default)]
pub struct SocialExtractor;

impl Extractor for SocialExtractor {
    type Output = BTreeMap<SocialPlatform, String>;

    fn name(&self) -> &'static str {
        "social_links"
    }

    fn extract(&self, page: &RawPage) -> PartialResult<BTreeMap<SocialPlatform, String>> {
        let doc = Html::parse_document(&page.body);
        let mut handles = BTreeMap::new();

        if let Some(anchor_sel) = selector("a[href]") {
            for region_sel in REGIONS.iter().filter_map(|css| selector(css)) {
                for region in doc.select(&region_sel) {
                    for href in region.select(&anchor_sel).filter_map(|a| a.value().attr("href")) {
                        record_handle(&mut handles, &page.url, href);
                    }
                }
            }
        }
        for (_, url) in anchors(&doc, &page.url) {
            record_handle(&mut handles, &page.url, &url);
        }

        if !handles.contains_key(&SocialPlatform::Twitter) {
            if let Some(site) = meta_content(&doc, "twitter:site") {
                let handle = site.trim_start_matches('@').trim();
                if is_valid_handle(handle) {
                    handles.insert(SocialPlatform::Twitter, handle.to_owned());
                }
            }
        }

        if handles.is_empty() {
            return PartialResult::not_found(format!("no social profile links on {}", page.url));
        }
        PartialResult::found(handles, &page.url, self.name())
    }
}

fn record_handle(handles: &mut BTreeMap<SocialPlatform, String>, base_url: &str, href: &str) {
    let Some((platform, handle)) = absolutize_url(base_url, href)
        .as_deref()
        .and_then(parse_profile)
    else {
        return;
    };
    handles.entry(platform).or_insert(handle);
}

/// Maps a profile URL to its platform and handle.
fn parse_profile(url: &str) -> Option<(SocialPlatform, String)> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let platform = SocialPlatform::from_host(&host)?;

    if platform == SocialPlatform::Whatsapp {
        let number = parsed
            .query_pairs()
            .find(|(k, _)| k == "phone")
            .map(|(_, v)| v.into_owned())
            .or_else(|| parsed.path_segments()?.find(|s| !s.is_empty()).map(str::to_owned))?;
        return is_valid_handle(&number).then_some((platform, number));
    }

    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
    let mut first = segments.next()?;
    if NON_PROFILE_SEGMENTS.contains(&first.to_ascii_lowercase().as_str()) {
        return None;
    }
    if HANDLE_PREFIXES.contains(&first.to_ascii_lowercase().as_str()) {
        first = segments.next()?;
    }

    let handle = first.trim_start_matches('@');
    is_valid_handle(handle).then(|| (platform, handle.to_owned()))
}

fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle.len() <= 100
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '+'))
}
