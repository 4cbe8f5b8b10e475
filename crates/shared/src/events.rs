use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::completion::{CompletionRequest, CompletionService, SearchMode};
use crate::extractor::extract_json;
use crate::models::{ClockFormat, HorizonEvent, Locale};

pub const MAX_EVENTS: usize = 3;
const MAX_PER_CATEGORY: usize = 2;

static MONTH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    // A number followed by ':' is a time, not the day of the month
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:$|[^\d:])")
        .expect("valid regex")
});

static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\b")
        .expect("valid regex")
});

static TIME_12H: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::([0-5]\d))?\s*([ap])\.?m\b\.?").expect("valid regex")
});

static TIME_24H: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("valid regex"));

/// What the hunter and curator are looking for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventQuery {
    /// The coming week
    Horizon { from: NaiveDate, to: NaiveDate },
    /// Events tied to one holiday, from today through the day after it
    Holiday { name: String, date: NaiveDate, from: NaiveDate },
}

impl EventQuery {
    pub fn horizon(today: NaiveDate) -> Self {
        EventQuery::Horizon {
            from: today + Duration::days(1),
            to: today + Duration::days(7),
        }
    }

    pub fn holiday(name: impl Into<String>, date: NaiveDate, today: NaiveDate) -> Self {
        EventQuery::Holiday {
            name: name.into(),
            date,
            from: today,
        }
    }

    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        match self {
            EventQuery::Horizon { from, to } => (*from, *to),
            EventQuery::Holiday { date, from, .. } => (*from, *date + Duration::days(1)),
        }
    }

    fn describe(&self, locale: &Locale) -> String {
        let (from, to) = self.window();
        match self {
            EventQuery::Horizon { .. } => format!(
                "upcoming high-value events in {}, {} ({}) between {} and {}",
                locale.name,
                locale.city,
                locale.country,
                from.format("%A %B %-d"),
                to.format("%A %B %-d, %Y"),
            ),
            EventQuery::Holiday { name, date, .. } => format!(
                "events in or near {}, {} ({}) celebrating {} on {}, taking place between {} and {}",
                locale.name,
                locale.city,
                locale.country,
                name,
                date.format("%A %B %-d, %Y"),
                from.format("%A %B %-d"),
                to.format("%A %B %-d"),
            ),
        }
    }
}

const CATEGORY_GUIDE: &str = "Prioritize, in this order:
1. culture: gallery openings, author talks, museum late nights, limited-run performances
2. dining: restaurant openings, chef pop-ups, tastings, supper clubs
3. public_space: markets, park programming, street festivals, civic meetings that change the neighborhood
4. real_estate_design: architecture tours, design fairs, notable open houses
Exclude tourist traps, generic nightlife and club nights, and chain-store promotions.";

#[derive(Deserialize)]
struct EventsPayload {
    events: Vec<HorizonEvent>,
}

/// Tier A: free-form event research through a social/web search service
pub struct EventHunter {
    social: Option<Arc<dyn CompletionService>>,
}

impl EventHunter {
    pub fn new(social: Option<Arc<dyn CompletionService>>) -> Self {
        Self { social }
    }

    pub fn is_configured(&self) -> bool {
        self.social.is_some()
    }

    /// Raw research notes, or `None` when Tier A is unconfigured, failed or
    /// came back empty.
    pub async fn hunt(&self, locale: &Locale, query: &EventQuery) -> Option<String> {
        let Some(social) = self.social.as_ref() else {
            debug!("Tier A search not configured, skipping hunt for {}", locale.id);
            return None;
        };

        let (from, to) = query.window();
        let prompt = format!(
            r#"Search X and the web for {target}.

{guide}

For each event give the name, venue, exact date and start time, and one line on why a discerning local would care. Aim for 8 to 10 candidates. A plain list is fine."#,
            target = query.describe(locale),
            guide = CATEGORY_GUIDE,
        );

        let request = CompletionRequest::new(prompt)
            .temperature(0.4)
            .max_tokens(2048)
            .search(SearchMode::SocialAndWeb { from, to });

        match social.complete(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                info!("Tier A hunt for {} returned {} chars", locale.id, text.len());
                Some(text)
            }
            Ok(_) => {
                warn!("Tier A hunt for {} returned no text", locale.id);
                None
            }
            Err(e) => {
                warn!("Tier A hunt failed for {}: {:#}", locale.id, e);
                None
            }
        }
    }
}

/// Narrows candidates to a diverse top three in the locale's date format
pub struct EventCurator {
    llm: Arc<dyn CompletionService>,
}

impl EventCurator {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    /// Curates a Tier A research dump
    pub async fn curate(&self, locale: &Locale, query: &EventQuery, raw: &str) -> Vec<HorizonEvent> {
        let prompt = format!(
            "From the research notes below, choose the best {target}.\n\n{rules}\n\nResearch notes:\n{raw}",
            target = query.describe(locale),
            rules = Self::selection_rules(locale),
            raw = raw,
        );
        let request = CompletionRequest::new(prompt).temperature(0.2).max_tokens(1024);
        self.run(locale, &request).await
    }

    /// Tier B: search and curate in a single grounded call
    pub async fn search_and_curate(&self, locale: &Locale, query: &EventQuery) -> Vec<HorizonEvent> {
        let prompt = format!(
            "Search the web for {target}.\n\n{guide}\n\n{rules}",
            target = query.describe(locale),
            guide = CATEGORY_GUIDE,
            rules = Self::selection_rules(locale),
        );
        let request = CompletionRequest::new(prompt)
            .temperature(0.3)
            .max_tokens(1536)
            .search(SearchMode::Grounded);
        self.run(locale, &request).await
    }

    fn selection_rules(locale: &Locale) -> String {
        let clock = locale.clock();
        let clock_name = match clock {
            ClockFormat::TwelveHour => "12-hour",
            ClockFormat::TwentyFourHour => "24-hour",
        };
        format!(
            r#"Pick at most {max} events. Do not pick more than one event from the same category unless nothing else qualifies. Favor the exclusive and the hard-to-hear-about over the heavily promoted. Only include events with a confirmed date.

Write each "day" like "{example}" ({clock} clock). Categories: culture, dining, public_space, real_estate_design.

Return ONLY JSON:
{{
  "events": [
    {{"day": "{example}", "name": "Event name", "whyItMatters": "one sentence", "category": "culture"}}
  ]
}}
If nothing qualifies return {{"events": []}}."#,
            max = MAX_EVENTS,
            example = clock.example(),
            clock = clock_name,
        )
    }

    async fn run(&self, locale: &Locale, request: &CompletionRequest) -> Vec<HorizonEvent> {
        match self.try_run(locale, request).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Event curation failed for {}: {:#}", locale.id, e);
                Vec::new()
            }
        }
    }

    async fn try_run(&self, locale: &Locale, request: &CompletionRequest) -> Result<Vec<HorizonEvent>> {
        let response = self.llm.complete(request).await?;
        let payload: EventsPayload = extract_json(&response, "events")?;
        let events = tidy_events(payload.events, locale.clock());
        debug!("Curated {} events for {}", events.len(), locale.id);
        Ok(events)
    }
}

/// Drops blanks and repeats, rewrites times into the locale's clock and
/// keeps a diverse top three.
pub fn tidy_events(events: Vec<HorizonEvent>, clock: ClockFormat) -> Vec<HorizonEvent> {
    let mut seen: Vec<String> = Vec::new();
    let cleaned: Vec<HorizonEvent> = events
        .into_iter()
        .filter(|event| !event.name.trim().is_empty() && !event.day.trim().is_empty())
        .filter(|event| {
            let key = event.name.trim().to_lowercase();
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        })
        .map(|mut event| {
            event.day = normalize_clock(&event.day, clock);
            event
        })
        .collect();

    enforce_diversity(cleaned, MAX_EVENTS)
}

fn category_key(event: &HorizonEvent) -> String {
    let key = event.category.trim().to_lowercase();
    if key.is_empty() {
        "other".to_string()
    } else {
        key
    }
}

/// Prefers one event per category, allows a second only to fill up, and
/// keeps the model's ranking order.
pub fn enforce_diversity(events: Vec<HorizonEvent>, max: usize) -> Vec<HorizonEvent> {
    let mut picked: Vec<usize> = Vec::new();
    let mut per_category: HashMap<String, usize> = HashMap::new();

    for (idx, event) in events.iter().enumerate() {
        if picked.len() == max {
            break;
        }
        let count = per_category.entry(category_key(event)).or_insert(0);
        if *count == 0 {
            *count += 1;
            picked.push(idx);
        }
    }

    for (idx, event) in events.iter().enumerate() {
        if picked.len() == max {
            break;
        }
        if picked.contains(&idx) {
            continue;
        }
        let count = per_category.entry(category_key(event)).or_insert(0);
        if *count < MAX_PER_CATEGORY {
            *count += 1;
            picked.push(idx);
        }
    }

    picked.sort_unstable();
    events
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| picked.contains(idx))
        .map(|(_, event)| event)
        .collect()
}

fn month_number(token: &str) -> Option<u32> {
    let month = match token.get(..3)?.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn to_24h(hour: u32, is_pm: bool) -> u32 {
    match (hour % 12, is_pm) {
        (h, false) => h,
        (h, true) => h + 12,
    }
}

fn parse_time(day: &str) -> (u32, u32) {
    if let Some(caps) = TIME_12H.captures(day) {
        let hour: u32 = caps[1].parse().unwrap_or(0);
        let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let is_pm = caps[3].eq_ignore_ascii_case("p");
        if (1..=12).contains(&hour) {
            return (to_24h(hour, is_pm), minute);
        }
    }
    if let Some(caps) = TIME_24H.captures(day) {
        let hour: u32 = caps[1].parse().unwrap_or(0);
        let minute: u32 = caps[2].parse().unwrap_or(0);
        return (hour, minute);
    }
    (0, 0)
}

/// Month and day of month from whichever date form appears first
fn month_and_day(day: &str) -> Option<(u32, u32)> {
    let month_first = MONTH_FIRST
        .captures(day)
        .map(|caps| (caps.get(0).map_or(0, |m| m.start()), month_number(&caps[1]), caps[2].parse::<u32>().ok()));
    let day_first = DAY_FIRST
        .captures(day)
        .map(|caps| (caps.get(0).map_or(0, |m| m.start()), month_number(&caps[2]), caps[1].parse::<u32>().ok()));

    let (_, month, day_of_month) = [month_first, day_first]
        .into_iter()
        .flatten()
        .min_by_key(|(start, _, _)| *start)?;
    Some((month?, day_of_month?))
}

/// Reads a month-name date plus optional time out of an event `day`
/// string. The year comes from `reference`, rolling forward when the month
/// is far behind it.
pub fn parse_event_timestamp(day: &str, reference: NaiveDate) -> Option<NaiveDateTime> {
    let (month, day_of_month) = month_and_day(day)?;

    let mut year = reference.year();
    if (month as i32) < reference.month() as i32 - 6 {
        year += 1;
    }

    let (hour, minute) = parse_time(day);
    NaiveDate::from_ymd_opt(year, month, day_of_month)?.and_hms_opt(hour, minute, 0)
}

/// Ascending by parsed timestamp; unparsable days sort first.
pub fn sort_events(events: &mut [HorizonEvent], reference: NaiveDate) {
    events.sort_by_key(|event| {
        parse_event_timestamp(&event.day, reference)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0)
    });
}

fn format_12h(hour: u32, minute: u32) -> String {
    let suffix = if hour >= 12 { "PM" } else { "AM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", display, minute, suffix)
}

fn followed_by_meridiem(text: &str, end: usize) -> bool {
    let rest = text[end..].trim_start().to_ascii_lowercase();
    rest.starts_with("am")
        || rest.starts_with("pm")
        || rest.starts_with("a.m")
        || rest.starts_with("p.m")
}

/// Rewrites every time token in `day` into the given clock format
pub fn normalize_clock(day: &str, clock: ClockFormat) -> String {
    match clock {
        ClockFormat::TwentyFourHour => TIME_12H
            .replace_all(day, |caps: &Captures| {
                let hour: u32 = caps[1].parse().unwrap_or(0);
                if !(1..=12).contains(&hour) {
                    return caps[0].to_string();
                }
                let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
                let is_pm = caps[3].eq_ignore_ascii_case("p");
                format!("{:02}:{:02}", to_24h(hour, is_pm), minute)
            })
            .into_owned(),
        ClockFormat::TwelveHour => TIME_24H
            .replace_all(day, |caps: &Captures| {
                let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
                if followed_by_meridiem(day, whole) {
                    return caps[0].to_string();
                }
                let hour: u32 = caps[1].parse().unwrap_or(0);
                let minute: u32 = caps[2].parse().unwrap_or(0);
                format_12h(hour, minute)
            })
            .into_owned(),
    }
}
