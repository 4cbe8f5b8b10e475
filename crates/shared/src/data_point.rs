use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::completion::{CompletionRequest, CompletionService, SearchMode};
use crate::extractor::extract_json;
use crate::models::{DataPointType, Locale, WeeklyDataPoint};

/// Value reported when no figure could be produced. The document
/// formatter drops the section when it sees this exact string.
pub const DATA_UNAVAILABLE: &str = "Data unavailable this week";

pub const DATA_POINT_ROTATION: [DataPointType; 4] = [
    DataPointType::RealEstate,
    DataPointType::Safety,
    DataPointType::Environment,
    DataPointType::FlaneurIndex,
];

impl DataPointType {
    /// Metric for the ISO week containing `date`
    pub fn for_date(date: NaiveDate) -> Self {
        DATA_POINT_ROTATION[(date.iso_week().week() % 4) as usize]
    }

    pub fn label(&self) -> &'static str {
        match self {
            DataPointType::RealEstate => "Median Asking Price",
            DataPointType::Safety => "Safety Pulse",
            DataPointType::Environment => "Air Quality",
            DataPointType::FlaneurIndex => "Flaneur Index",
        }
    }
}

/// Display units for a country
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleUnits {
    pub currency: &'static str,
    pub area: &'static str,
    pub temperature: &'static str,
}

impl LocaleUnits {
    pub fn for_country(country: &str) -> Self {
        let currency = match country {
            "United States" => "$",
            "Canada" => "C$",
            "Australia" => "A$",
            "New Zealand" => "NZ$",
            "United Kingdom" => "£",
            "Ireland" | "France" | "Germany" | "Italy" | "Spain" | "Portugal" | "Netherlands"
            | "Belgium" | "Austria" | "Greece" | "Finland" => "€",
            "Japan" => "¥",
            "China" => "CN¥",
            "Hong Kong" => "HK$",
            "Singapore" => "S$",
            "Switzerland" => "CHF ",
            "Sweden" => "SEK ",
            "Denmark" => "DKK ",
            "Norway" => "NOK ",
            "United Arab Emirates" => "AED ",
            "India" => "₹",
            "South Korea" => "₩",
            "Mexico" => "MX$",
            "Brazil" => "R$",
            "Israel" => "₪",
            "Thailand" => "฿",
            _ => "$",
        };
        let area = match country {
            "United States" | "Canada" | "United Kingdom" => "sq ft",
            _ => "m²",
        };
        let temperature = match country {
            "United States" => "°F",
            _ => "°C",
        };
        Self {
            currency,
            area,
            temperature,
        }
    }
}

#[derive(Deserialize)]
struct DataPointPayload {
    value: String,
    #[serde(default)]
    context: String,
}

/// Produces the week's single rotating metric
pub struct DataPointGenerator {
    llm: Arc<dyn CompletionService>,
}

impl DataPointGenerator {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    pub async fn generate(&self, locale: &Locale, today: NaiveDate) -> WeeklyDataPoint {
        let kind = DataPointType::for_date(today);
        debug!("Data point for {} this week: {:?}", locale.id, kind);

        match self.try_generate(locale, kind).await {
            Ok((value, context)) => WeeklyDataPoint {
                kind,
                label: kind.label().to_string(),
                value,
                context,
            },
            Err(e) => {
                warn!("Data point {:?} failed for {}: {:#}", kind, locale.id, e);
                unavailable(kind)
            }
        }
    }

    fn prompt_for(locale: &Locale, kind: DataPointType) -> String {
        let units = LocaleUnits::for_country(locale.country_key());
        let place = format!("{}, {}, {}", locale.name, locale.city, locale.country);

        let ask = match kind {
            DataPointType::RealEstate => format!(
                "Find the current median residential asking price in {place}. Report it in {cur} \
                 (e.g. \"{cur}1.4M\"); if only a per-area figure exists, give it per {area}. \
                 Context: one sentence on how it compares with a year ago.",
                place = place,
                cur = units.currency,
                area = units.area,
            ),
            DataPointType::Safety => format!(
                "Find what police blotters and local news reported for {place} over the past 7 days. \
                 Value: the number of reported incidents or the dominant pattern, in a few words. \
                 Context: one calm, factual sentence; no fearmongering.",
                place = place,
            ),
            DataPointType::Environment => format!(
                "Find this week's average air quality index for {place} (or the nearest monitoring \
                 station). Value: e.g. \"AQI 42 (Good)\". Context: one sentence, mentioning the \
                 week's temperature range in {temp} if notable.",
                place = place,
                temp = units.temperature,
            ),
            DataPointType::FlaneurIndex => format!(
                "Score {place} on the Flaneur Index: how rewarding it is to wander this week, from \
                 1 to 10, weighing weather (in {temp}), new openings, street life and closures. \
                 Value: e.g. \"7.5/10\". Context: one sentence naming the biggest factor.",
                place = place,
                temp = units.temperature,
            ),
        };

        format!(
            r#"{ask}

Use current sources. If you cannot find a credible figure, return {{"value": "", "context": ""}}.

Return ONLY JSON:
{{"value": "short figure", "context": "one sentence"}}"#,
            ask = ask
        )
    }

    async fn try_generate(&self, locale: &Locale, kind: DataPointType) -> Result<(String, String)> {
        let request = CompletionRequest::new(Self::prompt_for(locale, kind))
            .temperature(0.2)
            .max_tokens(512)
            .search(SearchMode::Grounded);

        let response = self.llm.complete(&request).await?;
        let payload: DataPointPayload = extract_json(&response, "value")?;

        if payload.value.trim().is_empty() {
            bail!("model found no figure");
        }
        Ok((payload.value.trim().to_string(), payload.context.trim().to_string()))
    }
}

pub fn unavailable(kind: DataPointType) -> WeeklyDataPoint {
    WeeklyDataPoint {
        kind,
        label: kind.label().to_string(),
        value: DATA_UNAVAILABLE.to_string(),
        context: String::new(),
    }
}
