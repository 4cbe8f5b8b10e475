use regex::Regex;
use std::sync::LazyLock;

use crate::models::{HolidaySection, WeeklyBriefContent};

const DASHES: &[char] = &['\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}'];

static BRACKET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[[^\]]*\]\s*").expect("valid regex"));

static DAILY_BRIEF_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[\p{L}\p{N}'’&.\- ]+?\s+(?:DAILY BRIEF|Daily Brief):\s*").expect("valid regex")
});

static NEWS_BRIEF_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*News Brief:\s*").expect("valid regex"));

/// Replaces em/en dash variants with a plain hyphen
pub fn strip_dashes(text: &str) -> String {
    text.replace(DASHES, "-")
}

/// Removes leading `[Label]`, `<Name> DAILY BRIEF:` and `News Brief:`
/// markers, repeatedly, then trims.
pub fn strip_category_prefix(headline: &str) -> String {
    let mut current = headline.trim().to_string();
    loop {
        let next = [&*BRACKET_PREFIX, &*DAILY_BRIEF_PREFIX, &*NEWS_BRIEF_PREFIX]
            .iter()
            .fold(current.clone(), |text, re| re.replace(&text, "").into_owned())
            .trim()
            .to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

pub fn sanitize_text(text: &str) -> String {
    strip_dashes(text).trim().to_string()
}

pub fn sanitize_headline(headline: &str) -> String {
    strip_category_prefix(&strip_dashes(headline))
}

/// The first `n` characters of a headline, lowercased, for fuzzy matching
pub fn headline_prefix(headline: &str, n: usize) -> String {
    headline.trim().chars().take(n).collect::<String>().to_lowercase()
}

impl WeeklyBriefContent {
    /// Normalizes every free-text field. Safe to call more than once.
    pub fn sanitized(mut self) -> Self {
        self.rearview_narrative = sanitize_text(&self.rearview_narrative);
        for story in &mut self.rearview_stories {
            story.headline = sanitize_headline(&story.headline);
            story.significance = sanitize_text(&story.significance);
        }
        for event in &mut self.horizon_events {
            event.day = sanitize_text(&event.day);
            event.name = sanitize_headline(&event.name);
            event.why_it_matters = sanitize_text(&event.why_it_matters);
            event.category = sanitize_text(&event.category);
        }
        self.data_point.label = sanitize_text(&self.data_point.label);
        self.data_point.value = sanitize_text(&self.data_point.value);
        self.data_point.context = sanitize_text(&self.data_point.context);
        if let Some(section) = self.holiday_section.as_mut() {
            sanitize_holiday(section);
        }
        self
    }
}

fn sanitize_holiday(section: &mut HolidaySection) {
    section.holiday_name = sanitize_text(&section.holiday_name);
    section.date = sanitize_text(&section.date);
    for event in &mut section.events {
        event.name = sanitize_headline(&event.name);
        event.day = sanitize_text(&event.day);
        event.description = sanitize_text(&event.description);
    }
}
