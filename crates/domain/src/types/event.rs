//! Browsing events emitted by content scripts
//!
//! The JSON shape is the one the extension produces: an object tagged by
//! `type` carrying the shared `timestamp`/`url` fields next to the
//! kind-specific ones.

use serde::{Deserialize, Serialize};

use crate::constants::MAX_SELECTOR_LENGTH;
use crate::errors::{MindhitError, Result};
use crate::impl_domain_tag_conversions;

/// Discriminant of a [`BrowsingEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PageVisit,
    PageLeave,
    Scroll,
    Highlight,
    Click,
}

impl_domain_tag_conversions!(EventKind {
    PageVisit => "page_visit",
    PageLeave => "page_leave",
    Scroll => "scroll",
    Highlight => "highlight",
    Click => "click",
});

/// A page was opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVisit {
    pub timestamp: i64,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub referrer: String,
}

/// A page was left; carries dwell time and deepest scroll position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLeave {
    pub timestamp: i64,
    pub url: String,
    pub duration_ms: u64,
    pub max_scroll_depth: f64,
}

/// Throttled scroll position sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scroll {
    pub timestamp: i64,
    pub url: String,
    pub scroll_depth: f64,
}

/// Text selected by the user together with a structural locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub timestamp: i64,
    pub url: String,
    pub text: String,
    pub selector: String,
}

/// Click on an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Click {
    pub timestamp: i64,
    pub url: String,
    pub selector: String,
    #[serde(default)]
    pub text: String,
}

/// A single browsing-activity event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowsingEvent {
    PageVisit(PageVisit),
    PageLeave(PageLeave),
    Scroll(Scroll),
    Highlight(Highlight),
    Click(Click),
}

impl BrowsingEvent {
    pub fn page_visit(
        timestamp: i64,
        url: impl Into<String>,
        title: impl Into<String>,
        referrer: impl Into<String>,
    ) -> Self {
        Self::PageVisit(PageVisit {
            timestamp,
            url: url.into(),
            title: title.into(),
            referrer: referrer.into(),
        })
    }

    pub fn page_leave(
        timestamp: i64,
        url: impl Into<String>,
        duration_ms: u64,
        max_scroll_depth: f64,
    ) -> Self {
        Self::PageLeave(PageLeave { timestamp, url: url.into(), duration_ms, max_scroll_depth })
    }

    pub fn scroll(timestamp: i64, url: impl Into<String>, scroll_depth: f64) -> Self {
        Self::Scroll(Scroll { timestamp, url: url.into(), scroll_depth })
    }

    /// Build a highlight event; the selector is capped at
    /// [`MAX_SELECTOR_LENGTH`] characters.
    pub fn highlight(
        timestamp: i64,
        url: impl Into<String>,
        text: impl Into<String>,
        selector: &str,
    ) -> Self {
        Self::Highlight(Highlight {
            timestamp,
            url: url.into(),
            text: text.into(),
            selector: cap_selector(selector),
        })
    }

    /// Build a click event; the selector is capped like highlights.
    pub fn click(
        timestamp: i64,
        url: impl Into<String>,
        selector: &str,
        text: impl Into<String>,
    ) -> Self {
        Self::Click(Click {
            timestamp,
            url: url.into(),
            selector: cap_selector(selector),
            text: text.into(),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::PageVisit(_) => EventKind::PageVisit,
            Self::PageLeave(_) => EventKind::PageLeave,
            Self::Scroll(_) => EventKind::Scroll,
            Self::Highlight(_) => EventKind::Highlight,
            Self::Click(_) => EventKind::Click,
        }
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::PageVisit(e) => e.timestamp,
            Self::PageLeave(e) => e.timestamp,
            Self::Scroll(e) => e.timestamp,
            Self::Highlight(e) => e.timestamp,
            Self::Click(e) => e.timestamp,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::PageVisit(e) => &e.url,
            Self::PageLeave(e) => &e.url,
            Self::Scroll(e) => &e.url,
            Self::Highlight(e) => &e.url,
            Self::Click(e) => &e.url,
        }
    }

    /// Apply the selector cap to events decoded from the wire.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Highlight(mut e) => {
                e.selector = cap_selector(&e.selector);
                Self::Highlight(e)
            }
            Self::Click(mut e) => {
                e.selector = cap_selector(&e.selector);
                Self::Click(e)
            }
            other => other,
        }
    }

    /// Check the field constraints of the event.
    ///
    /// # Errors
    /// Returns `MindhitError::InvalidInput` for an empty URL, a negative
    /// timestamp, a depth outside `[0, 1]`, or an over-long selector.
    pub fn validate(&self) -> Result<()> {
        if self.url().trim().is_empty() {
            return Err(invalid(self.kind(), "url must not be empty"));
        }
        if self.timestamp() < 0 {
            return Err(invalid(self.kind(), "timestamp must not be negative"));
        }

        match self {
            Self::PageLeave(e) => check_depth(self.kind(), "max_scroll_depth", e.max_scroll_depth),
            Self::Scroll(e) => check_depth(self.kind(), "scroll_depth", e.scroll_depth),
            Self::Highlight(Highlight { selector, .. }) | Self::Click(Click { selector, .. }) => {
                if selector.chars().count() > MAX_SELECTOR_LENGTH {
                    Err(invalid(self.kind(), "selector exceeds maximum length"))
                } else {
                    Ok(())
                }
            }
            Self::PageVisit(_) => Ok(()),
        }
    }
}

fn cap_selector(selector: &str) -> String {
    selector.chars().take(MAX_SELECTOR_LENGTH).collect()
}

fn check_depth(kind: EventKind, field: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(kind, &format!("{field} must be within [0, 1], got {value}")))
    }
}

fn invalid(kind: EventKind, reason: &str) -> MindhitError {
    MindhitError::InvalidInput(format!("{kind} event: {reason}"))
}
