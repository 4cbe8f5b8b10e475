//! Date arithmetic for holiday rules.
//!
//! Every rule is a [`CalendarProvider`]: given a year it answers with the
//! date the holiday falls on, or `None` when the date is unknown.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Stand-in for "no known date". Far enough in the past that it can never
/// land inside a live detection window.
pub const SENTINEL_DATE: NaiveDate = NaiveDate::MIN;

pub trait CalendarProvider: Send + Sync {
    fn date_for(&self, year: i32) -> Option<NaiveDate>;
}

/// Gregorian Easter Sunday (Meeus/Jones/Butcher), valid for years >= 1583.
pub fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32).unwrap_or(SENTINEL_DATE)
}

/// The `n`-th (1-based) `weekday` of `month`, if the month has that many.
pub fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

pub fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last_day = first_of_next.pred_opt()?;
    let back = (7 + last_day.weekday().num_days_from_sunday() - weekday.num_days_from_sunday()) % 7;
    Some(last_day - Duration::days(back as i64))
}

/// Same month and day every year
pub struct FixedDate {
    pub month: u32,
    pub day: u32,
}

impl CalendarProvider for FixedDate {
    fn date_for(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

/// Days relative to Easter Sunday (Good Friday is -2, Carnival is -47)
pub struct EasterOffset(pub i64);

impl CalendarProvider for EasterOffset {
    fn date_for(&self, year: i32) -> Option<NaiveDate> {
        let easter = easter_sunday(year);
        if easter == SENTINEL_DATE {
            return None;
        }
        easter.checked_add_signed(Duration::days(self.0))
    }
}

pub struct NthWeekday {
    pub month: u32,
    pub weekday: Weekday,
    pub n: u8,
}

impl CalendarProvider for NthWeekday {
    fn date_for(&self, year: i32) -> Option<NaiveDate> {
        nth_weekday_of_month(year, self.month, self.weekday, self.n)
    }
}

pub struct LastWeekday {
    pub month: u32,
    pub weekday: Weekday,
}

impl CalendarProvider for LastWeekday {
    fn date_for(&self, year: i32) -> Option<NaiveDate> {
        last_weekday_of_month(year, self.month, self.weekday)
    }
}

/// Hand-maintained `(year, month, day)` table for calendars with no
/// closed-form Gregorian rule (lunar, Islamic, Hebrew, Hindu).
pub struct LookupCalendar {
    table: &'static [(i32, u32, u32)],
}

pub fn from_lookup(table: &'static [(i32, u32, u32)]) -> LookupCalendar {
    LookupCalendar { table }
}

impl CalendarProvider for LookupCalendar {
    fn date_for(&self, year: i32) -> Option<NaiveDate> {
        self.table
            .iter()
            .find(|(y, _, _)| *y == year)
            .and_then(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_easter_known_years() {
        assert_eq!(easter_sunday(1583), ymd(1583, 4, 10));
        assert_eq!(easter_sunday(1818), ymd(1818, 3, 22));
        assert_eq!(easter_sunday(1943), ymd(1943, 4, 25));
        assert_eq!(easter_sunday(2024), ymd(2024, 3, 31));
        assert_eq!(easter_sunday(2025), ymd(2025, 4, 20));
        assert_eq!(easter_sunday(2026), ymd(2026, 4, 5));
        assert_eq!(easter_sunday(2038), ymd(2038, 4, 25));
    }

    #[test]
    fn test_easter_is_always_sunday_in_range() {
        for year in 1583..=3000 {
            let easter = easter_sunday(year);
            assert_eq!(easter.weekday(), Weekday::Sun, "year {}", year);
            assert!(easter >= ymd(year, 3, 22), "year {}", year);
            assert!(easter <= ymd(year, 4, 25), "year {}", year);
        }
    }

    #[test]
    fn test_nth_weekday() {
        // US Thanksgiving: fourth Thursday of November
        assert_eq!(nth_weekday_of_month(2025, 11, Weekday::Thu, 4), Some(ymd(2025, 11, 27)));
        assert_eq!(nth_weekday_of_month(2026, 11, Weekday::Thu, 4), Some(ymd(2026, 11, 26)));
        // February 2026 has no fifth Sunday
        assert_eq!(nth_weekday_of_month(2026, 2, Weekday::Sun, 5), None);
    }

    #[test]
    fn test_last_weekday() {
        // Memorial Day
        assert_eq!(last_weekday_of_month(2025, 5, Weekday::Mon), Some(ymd(2025, 5, 26)));
        assert_eq!(last_weekday_of_month(2026, 5, Weekday::Mon), Some(ymd(2026, 5, 25)));
        // Month ending on the requested weekday
        assert_eq!(last_weekday_of_month(2026, 1, Weekday::Sat), Some(ymd(2026, 1, 31)));
        assert_eq!(last_weekday_of_month(2026, 12, Weekday::Thu), Some(ymd(2026, 12, 31)));
        assert_eq!(last_weekday_of_month(2026, 13, Weekday::Thu), None);
    }

    #[test]
    fn test_lookup_outside_table_is_unknown() {
        static TABLE: &[(i32, u32, u32)] = &[(2026, 2, 17), (2027, 2, 6)];
        let calendar = from_lookup(TABLE);
        assert_eq!(calendar.date_for(2026), Some(ymd(2026, 2, 17)));
        assert_eq!(calendar.date_for(2031), None);
    }

    #[test]
    fn test_easter_offset() {
        assert_eq!(EasterOffset(-2).date_for(2026), Some(ymd(2026, 4, 3)));
        assert_eq!(EasterOffset(-47).date_for(2026), Some(ymd(2026, 2, 17)));
    }
}
