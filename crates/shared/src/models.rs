use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Countries whose readers expect 12-hour clock times.
const TWELVE_HOUR_COUNTRIES: &[&str] = &[
    "United States",
    "Canada",
    "Australia",
    "New Zealand",
    "India",
    "Philippines",
    "Pakistan",
    "Egypt",
];

/// The neighborhood a brief is written for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locale {
    pub id: String,
    pub name: String,
    pub city: String,
    pub country: String,
    /// Neighborhood ids merged into this one; their articles count as ours.
    #[serde(default)]
    pub alias_ids: Vec<String>,
}

impl Locale {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        city: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            city: city.into(),
            country: country.into(),
            alias_ids: Vec::new(),
        }
    }

    /// Canonical country name used for every country-keyed lookup
    pub fn country_key(&self) -> &str {
        normalize_country(&self.country)
    }

    pub fn clock(&self) -> ClockFormat {
        ClockFormat::for_country(self.country_key())
    }

    /// All neighborhood ids whose articles belong to this brief
    pub fn article_ids(&self) -> Vec<&str> {
        std::iter::once(self.id.as_str())
            .chain(self.alias_ids.iter().map(String::as_str))
            .collect()
    }

    pub fn display_name(&self) -> String {
        format!("{}, {}", self.name, self.city)
    }
}

pub fn normalize_country(country: &str) -> &str {
    match country.trim().to_ascii_lowercase().as_str() {
        "us" | "usa" | "u.s." | "u.s.a." | "united states of america" => "United States",
        "uk" | "u.k." | "england" | "scotland" | "wales" | "great britain" => "United Kingdom",
        "uae" | "u.a.e." => "United Arab Emirates",
        "korea" | "republic of korea" => "South Korea",
        _ => country.trim(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockFormat {
    TwelveHour,
    TwentyFourHour,
}

impl ClockFormat {
    pub fn for_country(country: &str) -> Self {
        let country = normalize_country(country);
        if TWELVE_HOUR_COUNTRIES
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country))
        {
            ClockFormat::TwelveHour
        } else {
            ClockFormat::TwentyFourHour
        }
    }

    /// Example day string given to the model as the required format
    pub fn example(&self) -> &'static str {
        match self {
            ClockFormat::TwelveHour => "Sat Oct 18, 7:30 PM",
            ClockFormat::TwentyFourHour => "Sat 18 Oct, 19:30",
        }
    }
}

/// A published article pulled from the store
#[derive(Debug, Clone)]
pub struct Article {
    pub headline: String,
    pub body: String,
    pub category_label: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RearviewStory {
    pub headline: String,
    pub significance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HorizonEvent {
    pub day: String,
    pub name: String,
    #[serde(default)]
    pub why_it_matters: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayEvent {
    pub name: String,
    pub day: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidaySection {
    pub holiday_name: String,
    pub date: String,
    pub events: Vec<HolidayEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataPointType {
    RealEstate,
    Safety,
    Environment,
    FlaneurIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyDataPoint {
    #[serde(rename = "type")]
    pub kind: DataPointType,
    pub label: String,
    pub value: String,
    pub context: String,
}

/// Complete Sunday Edition content for one locale and week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyBriefContent {
    pub rearview_narrative: String,
    pub rearview_stories: Vec<RearviewStory>,
    pub horizon_events: Vec<HorizonEvent>,
    pub data_point: WeeklyDataPoint,
    pub holiday_section: Option<HolidaySection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_aliases_normalize() {
        assert_eq!(normalize_country("USA"), "United States");
        assert_eq!(normalize_country(" uk "), "United Kingdom");
        assert_eq!(normalize_country("Japan"), "Japan");
    }

    #[test]
    fn test_clock_format_by_country() {
        assert_eq!(ClockFormat::for_country("US"), ClockFormat::TwelveHour);
        assert_eq!(ClockFormat::for_country("Australia"), ClockFormat::TwelveHour);
        assert_eq!(ClockFormat::for_country("Japan"), ClockFormat::TwentyFourHour);
        assert_eq!(ClockFormat::for_country("France"), ClockFormat::TwentyFourHour);
    }

    #[test]
    fn test_article_ids_include_aliases() {
        let mut locale = Locale::new("tribeca", "Tribeca", "New York", "USA");
        locale.alias_ids.push("tribeca-north".to_string());
        assert_eq!(locale.article_ids(), vec!["tribeca", "tribeca-north"]);
    }

    #[test]
    fn test_brief_serializes_camel_case() {
        let event = HorizonEvent {
            day: "Sat Oct 18, 7:30 PM".to_string(),
            name: "Gallery opening".to_string(),
            why_it_matters: "First show in the new space".to_string(),
            category: "culture".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["whyItMatters"], "First show in the new space");

        let point = WeeklyDataPoint {
            kind: DataPointType::FlaneurIndex,
            label: "Flaneur Index".to_string(),
            value: "7.2".to_string(),
            context: String::new(),
        };
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["type"], "flaneur_index");
    }
}
