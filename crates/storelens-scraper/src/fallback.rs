//! Ordered fallback chains: each field is a list of (source, extractor)
//! attempts evaluated left to right until one yields a non-empty value.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::client::{PageFetcher, RawPage};
use crate::extract::Extractor;
use crate::pagination::{catalog_page_url, extract_next_cursor};
use crate::record::{Absence, AbsenceReason, ContactDetails, Field, PartialResult};

/// Values that can be empty and can be combined across pages or sources.
pub trait Evidence {
    fn is_empty(&self) -> bool;

    /// Folds a later value into this one, keeping what is already present.
    fn absorb(&mut self, next: Self);
}

impl<T> Evidence for Vec<T> {
    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }

    fn absorb(&mut self, next: Self) {
        self.extend(next);
    }
}

impl Evidence for String {
    fn is_empty(&self) -> bool {
        self.trim().is_empty()
    }

    fn absorb(&mut self, next: Self) {
        if !next.trim().is_empty() {
            if !self.is_empty() {
                self.push_str("\n\n");
            }
            self.push_str(&next);
        }
    }
}

impl Evidence for ContactDetails {
    fn is_empty(&self) -> bool {
        ContactDetails::is_empty(self)
    }

    fn absorb(&mut self, next: Self) {
        self.merge(next);
    }
}

impl<K: Ord, V> Evidence for BTreeMap<K, V> {
    fn is_empty(&self) -> bool {
        BTreeMap::is_empty(self)
    }

    fn absorb(&mut self, next: Self) {
        for (key, value) in next {
            self.entry(key).or_insert(value);
        }
    }
}

/// Where an attempt gets its page from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The homepage fetched once per request.
    Homepage,
    /// A single absolute URL.
    Page(String),
    /// The catalog feed, following `Link: rel="next"` cursors.
    Paged {
        origin: String,
        limit: u32,
        max_pages: usize,
    },
}

/// Shared inputs for every attempt in one request.
pub struct FetchContext<'a> {
    pub fetcher: &'a dyn PageFetcher,
    pub fetch_timeout: Duration,
    pub homepage: &'a Result<RawPage, Absence>,
}

struct ExtractionTask<'a, T> {
    strategy: &'static str,
    source: Source,
    extractor: &'a dyn Extractor<Output = T>,
}

/// Attempts for one field, in priority order.
pub struct FallbackChain<'a, T> {
    field: Field,
    tasks: Vec<ExtractionTask<'a, T>>,
}

impl<'a, T: Evidence + Send> FallbackChain<'a, T> {
    #[must_use]
    pub fn new(field: Field) -> Self {
        Self {
            field,
            tasks: Vec::new(),
        }
    }

    #[must_use]
    pub fn attempt(
        mut self,
        strategy: &'static str,
        source: Source,
        extractor: &'a dyn Extractor<Output = T>,
    ) -> Self {
        self.tasks.push(ExtractionTask {
            strategy,
            source,
            extractor,
        });
        self
    }

    /// Appends one [`Source::Page`] attempt per URL, in order.
    #[must_use]
    pub fn pages(
        self,
        strategy: &'static str,
        urls: impl IntoIterator<Item = String>,
        extractor: &'a dyn Extractor<Output = T>,
    ) -> Self {
        urls.into_iter().fold(self, |chain, url| {
            chain.attempt(strategy, Source::Page(url), extractor)
        })
    }

    /// Runs attempts in order and returns the first non-empty value.
    ///
    /// When every attempt fails the strongest absence wins (see
    /// [`Absence::merge`]).
    pub async fn run(&self, ctx: &FetchContext<'_>) -> PartialResult<T> {
        let mut absence: Option<Absence> = None;

        for task in &self.tasks {
            let outcome = match &task.source {
                Source::Homepage => match ctx.homepage {
                    Ok(page) => task.extractor.extract(page),
                    Err(failed) => PartialResult::Absent(failed.clone()),
                },
                Source::Page(url) => fetch_and_extract(ctx, url, task.extractor).await,
                Source::Paged {
                    origin,
                    limit,
                    max_pages,
                } => paged_extract(ctx, origin, *limit, *max_pages, task.extractor).await,
            };

            let failed = match outcome {
                PartialResult::Found { value, provenance } if !value.is_empty() => {
                    tracing::debug!(
                        field = %self.field,
                        strategy = task.strategy,
                        source_url = %provenance.source_url,
                        "field resolved"
                    );
                    return PartialResult::Found { value, provenance }.with_strategy(task.strategy);
                }
                PartialResult::Found { provenance, .. } => Absence::new(
                    AbsenceReason::NotFound,
                    format!("{} yielded nothing on {}", task.extractor.name(), provenance.source_url),
                ),
                PartialResult::Absent(failed) => failed,
            };

            tracing::debug!(
                field = %self.field,
                strategy = task.strategy,
                reason = ?failed.reason,
                detail = %failed.detail,
                "attempt failed"
            );
            absence = Some(match absence {
                Some(prev) => prev.merge(failed),
                None => failed,
            });
        }

        PartialResult::Absent(absence.unwrap_or_else(|| {
            Absence::new(AbsenceReason::NotFound, format!("no sources for {}", self.field))
        }))
    }
}

/// Combines two independently resolved results for the same field.
///
/// Values found on both sides are folded together with
/// [`Evidence::absorb`], `first` leading and keeping its provenance. The
/// field is found if either side found something; otherwise the stronger
/// absence wins.
pub fn union<T: Evidence>(first: PartialResult<T>, second: PartialResult<T>) -> PartialResult<T> {
    match (first, second) {
        (PartialResult::Found { mut value, provenance }, PartialResult::Found { value: next, .. }) => {
            value.absorb(next);
            PartialResult::Found { value, provenance }
        }
        (found @ PartialResult::Found { .. }, PartialResult::Absent(_))
        | (PartialResult::Absent(_), found @ PartialResult::Found { .. }) => found,
        (PartialResult::Absent(a), PartialResult::Absent(b)) => PartialResult::Absent(a.merge(b)),
    }
}

async fn fetch_and_extract<T>(
    ctx: &FetchContext<'_>,
    url: &str,
    extractor: &dyn Extractor<Output = T>,
) -> PartialResult<T> {
    match ctx.fetcher.fetch(url, ctx.fetch_timeout).await {
        Ok(page) => extractor.extract(&page),
        Err(e) => PartialResult::Absent(Absence::from(&e)),
    }
}

/// Walks the catalog feed page by page, folding each page into the first.
///
/// A failure after the first page keeps what was already collected.
async fn paged_extract<T: Evidence>(
    ctx: &FetchContext<'_>,
    origin: &str,
    limit: u32,
    max_pages: usize,
    extractor: &dyn Extractor<Output = T>,
) -> PartialResult<T> {
    let Some(first_url) = catalog_page_url(origin, limit, None) else {
        return PartialResult::parse_error(format!("cannot build catalog URL for {origin}"));
    };

    let first_page = match ctx.fetcher.fetch(&first_url, ctx.fetch_timeout).await {
        Ok(page) => page,
        Err(e) => return PartialResult::Absent(Absence::from(&e)),
    };
    let mut cursor = extract_next_cursor(first_page.link_header.as_deref());
    let mut result = extractor.extract(&first_page);

    let mut pages = 1;
    while let (Some(page_info), PartialResult::Found { value, .. }) = (cursor.take(), &mut result) {
        if pages >= max_pages {
            tracing::debug!(origin, pages, "catalog page limit reached");
            break;
        }
        let Some(url) = catalog_page_url(origin, limit, Some(&page_info)) else {
            break;
        };
        let page = match ctx.fetcher.fetch(&url, ctx.fetch_timeout).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "catalog page failed, keeping earlier pages");
                break;
            }
        };
        pages += 1;
        cursor = extract_next_cursor(page.link_header.as_deref());
        match extractor.extract(&page) {
            PartialResult::Found { value: next, .. } => value.absorb(next),
            PartialResult::Absent(_) => break,
        }
    }

    result
}

#[cfg(test)]
#[path = "fallback_test.rs"]
mod tests;
