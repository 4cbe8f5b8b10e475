use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

use crate::events::{sort_events, EventCurator, EventHunter, EventQuery, MAX_EVENTS};
use crate::holidays::HolidayRegistry;
use crate::models::{HolidayEvent, HolidaySection, Locale};

/// Seasonal section for a holiday falling within the coming week
pub struct HolidaySectionBuilder {
    registry: Arc<HolidayRegistry>,
}

impl HolidaySectionBuilder {
    pub fn new(registry: Arc<HolidayRegistry>) -> Self {
        Self { registry }
    }

    /// `None` when no holiday is imminent or nothing worth attending turned up
    pub async fn build(
        &self,
        locale: &Locale,
        today: NaiveDate,
        hunter: &EventHunter,
        curator: &EventCurator,
    ) -> Option<HolidaySection> {
        let holiday = self.registry.detect_upcoming_holiday(locale.country_key(), today)?;
        info!("Upcoming holiday for {}: {} on {}", locale.id, holiday.name, holiday.date);

        let query = EventQuery::holiday(&holiday.name, holiday.date, today);

        let mut events = match hunter.hunt(locale, &query).await {
            Some(raw) => curator.curate(locale, &query, &raw).await,
            None => Vec::new(),
        };
        if events.is_empty() {
            debug!("No Tier A holiday events for {}, searching directly", locale.id);
            events = curator.search_and_curate(locale, &query).await;
        }

        if events.is_empty() {
            info!("No events found for {} in {}, omitting section", holiday.name, locale.id);
            return None;
        }

        sort_events(&mut events, today);

        Some(HolidaySection {
            holiday_name: holiday.name,
            date: holiday.date.format("%A, %B %-d").to_string(),
            events: events
                .into_iter()
                .take(MAX_EVENTS)
                .map(|event| HolidayEvent {
                    name: event.name,
                    day: event.day,
                    description: event.why_it_matters,
                })
                .collect(),
        })
    }
}
