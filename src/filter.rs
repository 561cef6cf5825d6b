use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::models::Event;
use crate::render::EventCard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateFilter {
    Tonight,
    ThisWeek,
    ThisMonth,
    Later,
}

impl DateFilter {
    pub const ALL: [DateFilter; 4] = [
        DateFilter::Tonight,
        DateFilter::ThisWeek,
        DateFilter::ThisMonth,
        DateFilter::Later,
    ];

    pub fn element_id(self) -> &'static str {
        match self {
            DateFilter::Tonight => "tonight-button",
            DateFilter::ThisWeek => "this-week-button",
            DateFilter::ThisMonth => "this-month-button",
            DateFilter::Later => "later-button",
        }
    }

    pub fn from_element_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|filter| filter.element_id() == id)
    }

    pub fn matches(self, date: DateTime<Utc>, now: DateTime<Tz>) -> bool {
        let tz = now.timezone();
        let local = date.with_timezone(&tz);
        let today = now.date_naive();
        match self {
            DateFilter::Tonight => local.date_naive() == today,
            DateFilter::ThisWeek => {
                let start = start_of_week(today);
                let end = start + Duration::days(7);
                local_midnight(tz, start) <= date && date < local_midnight(tz, end)
            }
            DateFilter::ThisMonth => local.month() == today.month() && local.year() == today.year(),
            DateFilter::Later => date >= local_midnight(tz, start_of_next_month(today)),
        }
    }
}

/// Monday of the week containing `day`; Sunday belongs to the week that began
/// six days earlier.
pub fn start_of_week(day: NaiveDate) -> NaiveDate {
    let back = day.weekday().num_days_from_monday();
    day - Duration::days(i64::from(back))
}

pub fn start_of_next_month(day: NaiveDate) -> NaiveDate {
    let (year, month) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(day)
}

/// First instant of `day` in `tz`. Days that start inside a DST gap begin at
/// the first valid instant after midnight.
fn local_midnight(tz: Tz, day: NaiveDate) -> DateTime<Utc> {
    let mut naive = NaiveDateTime::new(day, NaiveTime::default());
    for _ in 0..4 {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                return dt.with_timezone(&Utc)
            }
            LocalResult::None => naive += Duration::minutes(30),
        }
    }
    naive.and_utc()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterState {
    active: Option<DateFilter>,
}

impl FilterState {
    pub fn active(&self) -> Option<DateFilter> {
        self.active
    }

    pub fn select(self, filter: DateFilter) -> Self {
        Self {
            active: Some(filter),
        }
    }

    pub fn deselect(self, filter: DateFilter) -> Self {
        if self.active == Some(filter) {
            Self { active: None }
        } else {
            self
        }
    }

    pub fn toggle(self, filter: DateFilter, checked: bool) -> Self {
        if checked {
            self.select(filter)
        } else {
            self.deselect(filter)
        }
    }

    pub fn admits(&self, date: DateTime<Utc>, now: DateTime<Tz>) -> bool {
        self.active.map_or(true, |filter| filter.matches(date, now))
    }

    pub fn apply(&self, cards: &mut [EventCard], now: DateTime<Tz>) {
        for card in cards {
            card.visible = self.admits(card.starts_at, now);
        }
    }

    pub fn visible_events<'a>(&self, events: &'a [Event], now: DateTime<Tz>) -> Vec<&'a Event> {
        events.iter().filter(|e| self.admits(e.date, now)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixtures::event;
    use chrono_tz::America::Los_Angeles;

    // Wednesday 2026-10-21, 09:00 in Los Angeles.
    fn wednesday_morning() -> DateTime<Tz> {
        Los_Angeles.with_ymd_and_hms(2026, 10, 21, 9, 0, 0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Los_Angeles
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn sample_events() -> Vec<Event> {
        let now = wednesday_morning();
        vec![
            event("Tonight", "X", "LA", at(2026, 10, 21, 20, 0)),
            event("Weekend", "X", "LA", now.with_timezone(&Utc) + Duration::days(3)),
            event("Far", "X", "LA", now.with_timezone(&Utc) + Duration::days(40)),
        ]
    }

    fn names(events: Vec<&Event>) -> Vec<&str> {
        events.into_iter().map(|e| e.event_name.as_str()).collect()
    }

    #[test]
    fn week_starts_on_monday() {
        let wednesday = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(start_of_week(wednesday), monday);
        assert_eq!(start_of_week(sunday), monday);
        assert_eq!(start_of_week(monday), monday);
    }

    #[test]
    fn next_month_rolls_over_year() {
        let december = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        assert_eq!(
            start_of_next_month(december),
            NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()
        );
    }

    #[test]
    fn filters_select_expected_subsets() {
        let events = sample_events();
        let now = wednesday_morning();
        let none = FilterState::default();

        assert_eq!(
            names(none.select(DateFilter::Tonight).visible_events(&events, now)),
            ["Tonight"]
        );
        assert_eq!(
            names(none.select(DateFilter::ThisWeek).visible_events(&events, now)),
            ["Tonight", "Weekend"]
        );
        assert_eq!(
            names(none.select(DateFilter::ThisMonth).visible_events(&events, now)),
            ["Tonight", "Weekend"]
        );
        assert_eq!(
            names(none.select(DateFilter::Later).visible_events(&events, now)),
            ["Far"]
        );
        let cleared = none
            .select(DateFilter::Tonight)
            .deselect(DateFilter::Tonight);
        assert_eq!(cleared.visible_events(&events, now).len(), 3);
    }

    #[test]
    fn only_one_filter_is_active() {
        let state = FilterState::default().toggle(DateFilter::Tonight, true);
        assert_eq!(state.active(), Some(DateFilter::Tonight));

        let state = state.toggle(DateFilter::Later, true);
        assert_eq!(state.active(), Some(DateFilter::Later));

        // Unchecking a filter that is not active leaves the active one alone.
        let state = state.toggle(DateFilter::Tonight, false);
        assert_eq!(state.active(), Some(DateFilter::Later));

        let state = state.toggle(DateFilter::Later, false);
        assert_eq!(state.active(), None);
    }

    #[test]
    fn week_boundaries_are_local() {
        let now = wednesday_morning();
        let filter = DateFilter::ThisWeek;
        assert!(filter.matches(at(2026, 10, 19, 0, 0), now));
        assert!(!filter.matches(at(2026, 10, 18, 23, 59), now));
        assert!(filter.matches(at(2026, 10, 25, 23, 59), now));
        assert!(!filter.matches(at(2026, 10, 26, 0, 0), now));
    }

    #[test]
    fn tonight_uses_local_calendar_date() {
        // 23:30 local on the 21st is already the 22nd in UTC.
        let late = at(2026, 10, 21, 23, 30);
        assert_eq!(late.date_naive(), NaiveDate::from_ymd_opt(2026, 10, 22).unwrap());
        assert!(DateFilter::Tonight.matches(late, wednesday_morning()));
        assert!(!DateFilter::Tonight.matches(at(2026, 10, 22, 0, 30), wednesday_morning()));
    }

    #[test]
    fn later_starts_at_next_month_midnight() {
        let now = wednesday_morning();
        assert!(DateFilter::Later.matches(at(2026, 11, 1, 0, 0), now));
        assert!(!DateFilter::Later.matches(at(2026, 10, 31, 23, 59), now));
    }

    #[test]
    fn element_ids_round_trip() {
        for filter in DateFilter::ALL {
            assert_eq!(DateFilter::from_element_id(filter.element_id()), Some(filter));
        }
        assert_eq!(DateFilter::from_element_id("citySearch"), None);
    }
}
