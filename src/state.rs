use crate::filter::{DateFilter, FilterState};
use crate::query::VenueSelection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionState {
    pub city: Option<String>,
    pub venue: VenueSelection,
    pub filter: FilterState,
    pub version: u64,
    latest_request: u64,
}

impl SelectionState {
    pub fn new(city: Option<String>) -> Self {
        Self {
            city,
            ..Self::default()
        }
    }

    pub fn with_city(&self, city: Option<&str>) -> Self {
        Self {
            city: city.map(str::to_string),
            venue: VenueSelection::All,
            version: self.version + 1,
            ..self.clone()
        }
    }

    pub fn with_venue(&self, venue: VenueSelection) -> Self {
        Self {
            venue,
            version: self.version + 1,
            ..self.clone()
        }
    }

    pub fn with_filter(&self, filter: DateFilter, checked: bool) -> Self {
        Self {
            filter: self.filter.toggle(filter, checked),
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Issues the next token; any earlier outstanding token becomes stale.
    pub fn begin_request(&self) -> (Self, RequestToken) {
        let next = self.latest_request + 1;
        let state = Self {
            latest_request: next,
            version: self.version + 1,
            ..self.clone()
        };
        (state, RequestToken(next))
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.latest_request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_bump_version_and_leave_original_untouched() {
        let start = SelectionState::new(Some("Los Angeles".to_string()));
        let picked = start.with_venue(VenueSelection::Named("Largo".to_string()));

        assert_eq!(start.venue, VenueSelection::All);
        assert_eq!(picked.version, start.version + 1);

        let moved = picked.with_city(Some("New York"));
        assert_eq!(moved.city.as_deref(), Some("New York"));
        assert_eq!(moved.venue, VenueSelection::All);
    }

    #[test]
    fn filter_transition_keeps_single_active_filter() {
        let state = SelectionState::default()
            .with_filter(DateFilter::ThisWeek, true)
            .with_filter(DateFilter::Tonight, true);
        assert_eq!(state.filter.active(), Some(DateFilter::Tonight));
    }

    #[test]
    fn only_latest_token_is_current() {
        let (state, first) = SelectionState::default().begin_request();
        assert!(state.is_current(first));

        let (state, second) = state.begin_request();
        assert!(second > first);
        assert!(!state.is_current(first));
        assert!(state.is_current(second));
    }
}
