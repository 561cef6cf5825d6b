use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::error::FinderError;
use crate::models::Event;

#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub city: Option<String>,
    pub min_date: Option<DateTime<Utc>>,
}

impl EventQuery {
    pub fn upcoming(city: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            city: city.filter(|c| !c.is_empty()).map(str::to_string),
            min_date: Some(now),
        }
    }

    /// No date bound; the venue list draws on past events too.
    pub fn for_city(city: &str) -> Self {
        Self {
            city: Some(city.to_string()),
            min_date: None,
        }
    }

    pub fn to_filter_document(&self) -> Value {
        let mut doc = Map::new();
        if let Some(min_date) = self.min_date {
            doc.insert(
                "date".to_string(),
                json!({ "$gte": min_date.to_rfc3339_opts(SecondsFormat::Millis, true) }),
            );
        }
        if let Some(city) = &self.city {
            doc.insert("greaterCity".to_string(), Value::String(city.clone()));
        }
        Value::Object(doc)
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.min_date.map_or(true, |min| event.date >= min)
            && self
                .city
                .as_ref()
                .map_or(true, |city| &event.greater_city == city)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchText(String);

impl SearchText {
    /// Trims the ends only; inner spacing is passed on as typed.
    pub fn parse(raw: &str) -> Result<Self, FinderError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(FinderError::EmptySearchInput);
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VenueSelection {
    #[default]
    All,
    Named(String),
}

impl VenueSelection {
    pub fn from_option_value(value: &str) -> Self {
        match value.trim() {
            "" | "all" => VenueSelection::All,
            venue => VenueSelection::Named(venue.to_string()),
        }
    }

    pub fn option_value(&self) -> &str {
        match self {
            VenueSelection::All => "all",
            VenueSelection::Named(venue) => venue,
        }
    }

    pub fn admits(&self, event: &Event) -> bool {
        match self {
            VenueSelection::All => true,
            VenueSelection::Named(venue) => &event.location_name == venue,
        }
    }
}

pub fn narrow_by_venue(events: Vec<Event>, venue: &VenueSelection) -> Vec<Event> {
    match venue {
        VenueSelection::All => events,
        _ => events.into_iter().filter(|e| venue.admits(e)).collect(),
    }
}

pub fn sort_by_date(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by_key(|event| event.date);
    events
}

pub fn distinct_venues<'a, I>(events: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut out: Vec<String> = Vec::new();
    for event in events {
        if !out.iter().any(|existing| existing == &event.location_name) {
            out.push(event.location_name.clone());
        }
    }
    out
}


#[cfg(test)]
mod tests {
    use super::fixtures::event;
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 21, 17, 0, 0).unwrap()
    }

    #[test]
    fn filter_document_shape() {
        let query = EventQuery::upcoming(Some("Los Angeles"), now());
        assert_eq!(
            query.to_filter_document(),
            json!({
                "date": {"$gte": "2026-10-21T17:00:00.000Z"},
                "greaterCity": "Los Angeles"
            })
        );

        let anywhere = EventQuery::upcoming(Some(""), now());
        assert_eq!(anywhere.city, None);
        assert!(anywhere.to_filter_document().get("greaterCity").is_none());

        assert_eq!(
            EventQuery::for_city("Chicago").to_filter_document(),
            json!({"greaterCity": "Chicago"})
        );
    }

    #[test]
    fn query_matches_city_and_lower_bound() {
        let query = EventQuery::upcoming(Some("LA"), now());
        assert!(query.matches(&event("A", "X", "LA", now())));
        assert!(!query.matches(&event("B", "X", "LA", now() - Duration::minutes(1))));
        assert!(!query.matches(&event("C", "X", "NYC", now() + Duration::days(1))));
    }

    #[test]
    fn blank_search_is_rejected() {
        assert_eq!(SearchText::parse("   \t"), Err(FinderError::EmptySearchInput));
        assert_eq!(SearchText::parse(""), Err(FinderError::EmptySearchInput));
        assert_eq!(SearchText::parse("  comedy  ").unwrap().as_str(), "comedy");
    }

    #[test]
    fn search_keeps_inner_spacing() {
        assert_eq!(
            SearchText::parse(" stand   up\t").unwrap().as_str(),
            "stand   up"
        );
    }

    #[test]
    fn venue_narrowing() {
        let events = vec![
            event("One", "X", "LA", now()),
            event("Two", "Y", "LA", now()),
            event("Three", "X", "LA", now()),
        ];

        let only_x = narrow_by_venue(events.clone(), &VenueSelection::from_option_value("X"));
        assert_eq!(only_x.len(), 2);
        assert!(only_x.iter().all(|e| e.location_name == "X"));

        let all = narrow_by_venue(events.clone(), &VenueSelection::from_option_value("all"));
        assert_eq!(all, events);
    }

    #[test]
    fn sorting_is_ascending_and_stable() {
        let later = event("Later", "X", "LA", now() + Duration::days(2));
        let first = event("First", "X", "LA", now());
        let tie = event("Tie", "Y", "LA", now());
        let sorted = sort_by_date(vec![later, first, tie]);
        let names: Vec<_> = sorted.iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(names, ["First", "Tie", "Later"]);
    }

    #[test]
    fn distinct_venues_keep_first_seen_order() {
        let events = vec![
            event("One", "Y", "LA", now()),
            event("Two", "X", "LA", now()),
            event("Three", "Y", "LA", now()),
        ];
        assert_eq!(distinct_venues(&events), ["Y", "X"]);
    }
}
