//! Page selector parsing.
//!
//! A selector is a comma-separated list of 1-based page numbers and inclusive
//! `start-end` ranges, e.g. `1,3-5,10`. The syntax is checked once with
//! [`PageSelector::parse`]; the selector is then resolved against each
//! document's page count with [`PageSelector::resolve`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::SelectorError;

/// A parsed page selector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSelector {
    /// `None` selects every page.
    spans: Option<Vec<Span>>,
    source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    Single(u64),
    Range(u64, u64),
}

impl PageSelector {
    /// Selector matching every page of a document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a selector expression. Blank input selects all pages.
    ///
    /// Empty tokens (`"1,,3"`, trailing commas) are ignored. Any token that
    /// is not a number or a `number-number` range fails the whole parse.
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::all());
        }

        let mut spans = Vec::new();
        for part in trimmed.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let span = match part.split_once('-') {
                Some((start, end)) => {
                    let invalid = || SelectorError::InvalidRange {
                        token: part.to_string(),
                    };
                    let start = start.trim().parse::<u64>().map_err(|_| invalid())?;
                    let end = end.trim().parse::<u64>().map_err(|_| invalid())?;
                    Span::Range(start, end)
                }
                None => {
                    let page = part.parse::<u64>().map_err(|_| SelectorError::InvalidNumber {
                        token: part.to_string(),
                    })?;
                    Span::Single(page)
                }
            };
            spans.push(span);
        }

        Ok(Self {
            spans: Some(spans),
            source: trimmed.to_string(),
        })
    }

    /// Whether this selector matches every page.
    pub fn is_all(&self) -> bool {
        self.spans.is_none()
    }

    /// Resolve against a page count into sorted, unique, zero-based indices.
    ///
    /// Out-of-range single pages are dropped. Range bounds are clamped into
    /// `[1, page_count]`; a range that is empty after clamping contributes
    /// nothing.
    pub fn resolve(&self, page_count: u32) -> Vec<u32> {
        let Some(spans) = &self.spans else {
            return (0..page_count).collect();
        };

        let max = u64::from(page_count);
        let mut wanted = BTreeSet::new();
        for span in spans {
            match *span {
                Span::Single(page) => {
                    if (1..=max).contains(&page) {
                        wanted.insert(page);
                    }
                }
                Span::Range(start, end) => {
                    let start = start.max(1);
                    let end = end.min(max);
                    if start <= end {
                        wanted.extend(start..=end);
                    }
                }
            }
        }

        // Every value is within [1, page_count], so the conversion is lossless.
        wanted.into_iter().map(|page| (page - 1) as u32).collect()
    }
}

impl FromStr for PageSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            f.write_str("all")
        } else {
            f.write_str(&self.source)
        }
    }
}

/// Parse and resolve in one step. `None` or blank selects every page.
pub fn parse_page_range(selector: Option<&str>, page_count: u32) -> Result<Vec<u32>, SelectorError> {
    match selector {
        Some(text) => Ok(PageSelector::parse(text)?.resolve(page_count)),
        None => Ok(PageSelector::all().resolve(page_count)),
    }
}
