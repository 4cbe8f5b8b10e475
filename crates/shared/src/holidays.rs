use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::calendar::{
    from_lookup, CalendarProvider, EasterOffset, FixedDate, LastWeekday, NthWeekday,
};
use crate::models::normalize_country;

/// How far ahead (inclusive) a holiday counts as upcoming
pub const HOLIDAY_WINDOW_DAYS: i64 = 7;

static LUNAR_NEW_YEAR: &[(i32, u32, u32)] = &[
    (2024, 2, 10),
    (2025, 1, 29),
    (2026, 2, 17),
    (2027, 2, 6),
    (2028, 1, 26),
    (2029, 2, 13),
    (2030, 2, 3),
];

static MID_AUTUMN: &[(i32, u32, u32)] = &[
    (2024, 9, 17),
    (2025, 10, 6),
    (2026, 9, 25),
    (2027, 9, 15),
    (2028, 10, 3),
    (2029, 9, 22),
    (2030, 9, 12),
];

static DIWALI: &[(i32, u32, u32)] = &[
    (2024, 11, 1),
    (2025, 10, 20),
    (2026, 11, 8),
    (2027, 10, 29),
    (2028, 10, 17),
    (2029, 11, 5),
    (2030, 10, 26),
];

static HOLI: &[(i32, u32, u32)] = &[
    (2024, 3, 25),
    (2025, 3, 14),
    (2026, 3, 4),
    (2027, 3, 22),
    (2028, 3, 11),
    (2029, 3, 1),
    (2030, 3, 20),
];

static EID_AL_FITR: &[(i32, u32, u32)] = &[
    (2024, 4, 10),
    (2025, 3, 30),
    (2026, 3, 20),
    (2027, 3, 10),
    (2028, 2, 27),
    (2029, 2, 15),
    (2030, 2, 5),
];

static EID_AL_ADHA: &[(i32, u32, u32)] = &[
    (2024, 6, 16),
    (2025, 6, 6),
    (2026, 5, 27),
    (2027, 5, 16),
    (2028, 5, 5),
    (2029, 4, 24),
    (2030, 4, 13),
];

static ROSH_HASHANAH: &[(i32, u32, u32)] = &[
    (2024, 10, 3),
    (2025, 9, 23),
    (2026, 9, 12),
    (2027, 10, 2),
    (2028, 9, 21),
    (2029, 9, 10),
    (2030, 9, 28),
];

static HANUKKAH: &[(i32, u32, u32)] = &[
    (2024, 12, 26),
    (2025, 12, 15),
    (2026, 12, 5),
    (2027, 12, 25),
    (2028, 12, 13),
    (2029, 12, 2),
    (2030, 12, 21),
];

static PASSOVER: &[(i32, u32, u32)] = &[
    (2024, 4, 23),
    (2025, 4, 13),
    (2026, 4, 2),
    (2027, 4, 22),
    (2028, 4, 11),
    (2029, 3, 31),
    (2030, 4, 18),
];

// Japan fixes these from the astronomical equinox each February.
static VERNAL_EQUINOX_JP: &[(i32, u32, u32)] = &[
    (2024, 3, 20),
    (2025, 3, 20),
    (2026, 3, 20),
    (2027, 3, 21),
    (2028, 3, 20),
    (2029, 3, 20),
    (2030, 3, 20),
];

static AUTUMNAL_EQUINOX_JP: &[(i32, u32, u32)] = &[
    (2024, 9, 22),
    (2025, 9, 23),
    (2026, 9, 23),
    (2027, 9, 23),
    (2028, 9, 22),
    (2029, 9, 23),
    (2030, 9, 23),
];

const CHINESE_DIASPORA: &[&str] = &[
    "China",
    "Hong Kong",
    "Taiwan",
    "Singapore",
    "Malaysia",
    "Vietnam",
];

const MUSLIM_MAJORITY: &[&str] = &[
    "United Arab Emirates",
    "Saudi Arabia",
    "Qatar",
    "Egypt",
    "Turkey",
    "Indonesia",
    "Malaysia",
];

const EASTER_OBSERVING: &[&str] = &[
    "United States",
    "Canada",
    "United Kingdom",
    "Ireland",
    "France",
    "Germany",
    "Italy",
    "Spain",
    "Portugal",
    "Netherlands",
    "Sweden",
    "Australia",
    "New Zealand",
    "Mexico",
    "Brazil",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Countries {
    All,
    Only(Vec<String>),
}

impl Countries {
    pub fn only(countries: &[&str]) -> Self {
        Countries::Only(countries.iter().map(|c| c.to_string()).collect())
    }

    fn includes(&self, country: &str) -> bool {
        match self {
            Countries::All => true,
            Countries::Only(list) => list.iter().any(|c| c.eq_ignore_ascii_case(country)),
        }
    }
}

pub struct HolidayDefinition {
    pub name: String,
    pub calendar: Box<dyn CalendarProvider>,
    pub countries: Countries,
}

impl HolidayDefinition {
    pub fn new(
        name: impl Into<String>,
        calendar: impl CalendarProvider + 'static,
        countries: Countries,
    ) -> Self {
        Self {
            name: name.into(),
            calendar: Box::new(calendar),
            countries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingHoliday {
    pub name: String,
    pub date: NaiveDate,
}

/// Ordered holiday list. The first matching definition wins, so
/// country-specific entries sit ahead of the global ones.
pub struct HolidayRegistry {
    definitions: Vec<HolidayDefinition>,
}

impl HolidayRegistry {
    pub fn new(definitions: Vec<HolidayDefinition>) -> Self {
        Self { definitions }
    }

    pub fn detect_upcoming_holiday(&self, country: &str, today: NaiveDate) -> Option<UpcomingHoliday> {
        let country = normalize_country(country);
        let window_end = today + Duration::days(HOLIDAY_WINDOW_DAYS);

        let mut years = vec![today.year()];
        if window_end.year() != today.year() {
            years.push(window_end.year());
        }

        self.definitions
            .iter()
            .filter(|def| def.countries.includes(country))
            .find_map(|def| {
                years
                    .iter()
                    .filter_map(|&year| def.calendar.date_for(year))
                    .find(|date| *date >= today && *date <= window_end)
                    .map(|date| UpcomingHoliday {
                        name: def.name.clone(),
                        date,
                    })
            })
    }
}

impl Default for HolidayRegistry {
    fn default() -> Self {
        use Weekday::*;

        let defs = vec![
            // Lookup-table calendars
            HolidayDefinition::new("Lunar New Year", from_lookup(LUNAR_NEW_YEAR), Countries::only(&[
                "China", "Hong Kong", "Taiwan", "Singapore", "Malaysia", "Vietnam", "South Korea",
            ])),
            HolidayDefinition::new("Mid-Autumn Festival", from_lookup(MID_AUTUMN), Countries::only(CHINESE_DIASPORA)),
            HolidayDefinition::new("Chuseok", from_lookup(MID_AUTUMN), Countries::only(&["South Korea"])),
            HolidayDefinition::new("Diwali", from_lookup(DIWALI), Countries::only(&["India", "Singapore", "Malaysia"])),
            HolidayDefinition::new("Holi", from_lookup(HOLI), Countries::only(&["India"])),
            HolidayDefinition::new("Eid al-Fitr", from_lookup(EID_AL_FITR), Countries::only(MUSLIM_MAJORITY)),
            HolidayDefinition::new("Eid al-Adha", from_lookup(EID_AL_ADHA), Countries::only(MUSLIM_MAJORITY)),
            HolidayDefinition::new("Rosh Hashanah", from_lookup(ROSH_HASHANAH), Countries::only(&["Israel"])),
            HolidayDefinition::new("Hanukkah", from_lookup(HANUKKAH), Countries::only(&["Israel"])),
            HolidayDefinition::new("Passover", from_lookup(PASSOVER), Countries::only(&["Israel"])),
            HolidayDefinition::new("Vernal Equinox Day", from_lookup(VERNAL_EQUINOX_JP), Countries::only(&["Japan"])),
            HolidayDefinition::new("Autumnal Equinox Day", from_lookup(AUTUMNAL_EQUINOX_JP), Countries::only(&["Japan"])),
            // Japan
            HolidayDefinition::new("Coming of Age Day", NthWeekday { month: 1, weekday: Mon, n: 2 }, Countries::only(&["Japan"])),
            HolidayDefinition::new("Golden Week", FixedDate { month: 4, day: 29 }, Countries::only(&["Japan"])),
            HolidayDefinition::new("Obon", FixedDate { month: 8, day: 13 }, Countries::only(&["Japan"])),
            // North America
            HolidayDefinition::new("Martin Luther King Jr. Day", NthWeekday { month: 1, weekday: Mon, n: 3 }, Countries::only(&["United States"])),
            HolidayDefinition::new("Memorial Day", LastWeekday { month: 5, weekday: Mon }, Countries::only(&["United States"])),
            HolidayDefinition::new("Independence Day", FixedDate { month: 7, day: 4 }, Countries::only(&["United States"])),
            HolidayDefinition::new("Labor Day", NthWeekday { month: 9, weekday: Mon, n: 1 }, Countries::only(&["United States"])),
            HolidayDefinition::new("Thanksgiving", NthWeekday { month: 11, weekday: Thu, n: 4 }, Countries::only(&["United States"])),
            HolidayDefinition::new("Canada Day", FixedDate { month: 7, day: 1 }, Countries::only(&["Canada"])),
            HolidayDefinition::new("Thanksgiving", NthWeekday { month: 10, weekday: Mon, n: 2 }, Countries::only(&["Canada"])),
            HolidayDefinition::new("Mother's Day", NthWeekday { month: 5, weekday: Sun, n: 2 }, Countries::only(&["United States", "Canada", "Australia", "New Zealand"])),
            HolidayDefinition::new("Día de Muertos", FixedDate { month: 11, day: 1 }, Countries::only(&["Mexico"])),
            // Europe
            HolidayDefinition::new("Mothering Sunday", EasterOffset(-21), Countries::only(&["United Kingdom", "Ireland"])),
            HolidayDefinition::new("Summer Bank Holiday", LastWeekday { month: 8, weekday: Mon }, Countries::only(&["United Kingdom"])),
            HolidayDefinition::new("Bonfire Night", FixedDate { month: 11, day: 5 }, Countries::only(&["United Kingdom"])),
            HolidayDefinition::new("St. Patrick's Day", FixedDate { month: 3, day: 17 }, Countries::only(&["Ireland", "United States"])),
            HolidayDefinition::new("Bastille Day", FixedDate { month: 7, day: 14 }, Countries::only(&["France"])),
            HolidayDefinition::new("German Unity Day", FixedDate { month: 10, day: 3 }, Countries::only(&["Germany"])),
            HolidayDefinition::new("King's Day", FixedDate { month: 4, day: 27 }, Countries::only(&["Netherlands"])),
            // Elsewhere
            HolidayDefinition::new("Australia Day", FixedDate { month: 1, day: 26 }, Countries::only(&["Australia"])),
            HolidayDefinition::new("Melbourne Cup", NthWeekday { month: 11, weekday: Tue, n: 1 }, Countries::only(&["Australia"])),
            HolidayDefinition::new("Carnival", EasterOffset(-47), Countries::only(&["Brazil"])),
            HolidayDefinition::new("Songkran", FixedDate { month: 4, day: 13 }, Countries::only(&["Thailand"])),
            HolidayDefinition::new("Easter", EasterOffset(0), Countries::only(EASTER_OBSERVING)),
            // Global
            HolidayDefinition::new("Valentine's Day", FixedDate { month: 2, day: 14 }, Countries::All),
            HolidayDefinition::new("Halloween", FixedDate { month: 10, day: 31 }, Countries::All),
            HolidayDefinition::new("Christmas", FixedDate { month: 12, day: 25 }, Countries::All),
            HolidayDefinition::new("New Year's Eve", FixedDate { month: 12, day: 31 }, Countries::All),
        ];

        Self::new(defs)
    }
}
