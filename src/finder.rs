use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::FinderError;
use crate::filter::{DateFilter, FilterState};
use crate::geo::{GeoResolver, LocationFix};
use crate::models::Event;
use crate::query::{narrow_by_venue, sort_by_date, EventQuery, SearchText, VenueSelection};
use crate::render::{self, DetailPanel, EventCard};
use crate::repository::{list_venues_for_city, EventRepository};
use crate::state::{RequestToken, SelectionState};
use crate::utils::escape_html;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The board was repainted with this many cards.
    Applied(usize),
    /// A newer request was issued while this one was in flight.
    Stale,
    Failed,
    NoSession,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Board {
    pub cities: Vec<String>,
    pub selected_city: Option<String>,
    pub venues: Vec<String>,
    pub selected_venue: String,
    pub cards: Vec<EventCard>,
    pub prompt: Option<String>,
    pub detail: Option<DetailPanel>,
}

impl Board {
    pub fn visible_cards(&self) -> impl Iterator<Item = &EventCard> {
        self.cards.iter().filter(|card| card.visible)
    }

    pub fn to_html(&self) -> String {
        let mut html = format!(
            r#"<select id="{}">{}</select>"#,
            render::CITY_SELECT_ID,
            render::city_options_html(&self.cities, self.selected_city.as_deref())
        );
        html.push_str(&format!(
            r#"<select id="{}">{}</select>"#,
            render::VENUE_SELECT_ID,
            render::venue_options_html(&self.venues, &self.selected_venue)
        ));
        html.push_str(&format!(
            r#"<form id="{}"><input id="{}" type="text"></form>"#,
            render::SEARCH_FORM_IDS[0],
            render::SEARCH_INPUT_IDS[0]
        ));
        for filter in DateFilter::ALL {
            html.push_str(&format!(
                r#"<input id="{}" type="checkbox">"#,
                filter.element_id()
            ));
        }
        if let Some(prompt) = &self.prompt {
            html.push_str(&format!(
                r#"<p class="search-prompt">{}</p>"#,
                escape_html(prompt)
            ));
        }
        html.push_str(&render::cards_html(&self.cards));
        if let Some(detail) = &self.detail {
            html.push_str(r#"<div class="popup">"#);
            for (id, inner) in detail.fragments() {
                html.push_str(&format!(r#"<div id="{id}">{inner}</div>"#));
            }
            html.push_str(&detail.event_button_html());
            html.push_str("</div>");
        }
        html
    }
}

struct Inner {
    selection: SelectionState,
    board: Board,
}

pub struct EventFinder<R: EventRepository> {
    repo: R,
    tz: Tz,
    default_city: String,
    clock: fn() -> DateTime<Utc>,
    session: Mutex<Option<R::Session>>,
    inner: Mutex<Inner>,
}

impl<R: EventRepository> EventFinder<R> {
    pub fn new(repo: R, tz: Tz, default_city: impl Into<String>) -> Self {
        Self {
            repo,
            tz,
            default_city: default_city.into(),
            clock: Utc::now,
            session: Mutex::new(None),
            inner: Mutex::new(Inner {
                selection: SelectionState::default(),
                board: Board {
                    selected_venue: VenueSelection::All.option_value().to_string(),
                    ..Board::default()
                },
            }),
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn board(&self) -> Board {
        self.lock().board.clone()
    }

    pub fn selection(&self) -> SelectionState {
        self.lock().selection.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn now_local(&self) -> DateTime<Tz> {
        (self.clock)().with_timezone(&self.tz)
    }

    /// Cached session, logging in on first use. A failed login is not cached,
    /// so the next interaction tries once more.
    async fn session(&self) -> Option<R::Session> {
        let cached = match self.session.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if cached.is_some() {
            return cached;
        }
        let fresh = self.repo.authenticate().await;
        match &fresh {
            Some(session) => {
                if let Ok(mut guard) = self.session.lock() {
                    *guard = Some(session.clone());
                }
            }
            None => warn!("no session; showing no data"),
        }
        fresh
    }

    fn transition<F>(&self, change: F) -> SelectionState
    where
        F: FnOnce(&SelectionState) -> SelectionState,
    {
        let mut inner = self.lock();
        inner.selection = change(&inner.selection);
        inner.selection.clone()
    }

    fn begin_request(&self) -> (SelectionState, RequestToken) {
        let mut inner = self.lock();
        let (next, token) = inner.selection.begin_request();
        inner.selection = next;
        (inner.selection.clone(), token)
    }

    pub async fn start(&self, fix: LocationFix) -> LoadOutcome {
        let city = GeoResolver::new(&self.default_city)
            .resolve_city(&self.repo, fix)
            .await;
        info!(%city, "starting event board");

        let Some(session) = self.session().await else {
            return LoadOutcome::NoSession;
        };

        let cities = match self.repo.list_distinct_cities(&session).await {
            Ok(cities) => cities,
            Err(err) => {
                warn!(%err, "city list unavailable");
                Vec::new()
            }
        };
        let known = cities.iter().any(|c| c == &city);
        if !known {
            warn!(error = %FinderError::CityNotFound(city.clone()), "leaving city selector unset");
        }
        self.lock().board.cities = cities;

        self.transition(|s| s.with_city(Some(&city)));
        let (selection, token) = self.begin_request();
        self.load_city(&session, &selection, token).await
    }

    /// City selector change. Values missing from the options are ignored; the
    /// empty placeholder value loads every city.
    pub async fn select_city(&self, city: &str) -> Result<LoadOutcome, FinderError> {
        let city = city.trim();
        let known = {
            let inner = self.lock();
            inner.board.cities.iter().any(|c| c == city)
        };
        if !city.is_empty() && !known {
            let err = FinderError::CityNotFound(city.to_string());
            warn!(error = %err, "ignoring city selection");
            return Err(err);
        }

        let target = (!city.is_empty()).then_some(city);
        self.transition(|s| s.with_city(target));
        let (selection, token) = self.begin_request();

        let Some(session) = self.session().await else {
            return Ok(LoadOutcome::NoSession);
        };
        Ok(self.load_city(&session, &selection, token).await)
    }

    pub async fn select_venue(&self, value: &str) -> LoadOutcome {
        let venue = VenueSelection::from_option_value(value);
        self.transition(|s| s.with_venue(venue));
        let (selection, token) = self.begin_request();

        let Some(session) = self.session().await else {
            return LoadOutcome::NoSession;
        };
        self.load_events(&session, &selection, token).await
    }

    pub async fn submit_search(&self, raw: &str) -> Result<LoadOutcome, FinderError> {
        let text = match SearchText::parse(raw) {
            Ok(text) => text,
            Err(err) => {
                self.lock().board.prompt = Some(err.to_string());
                return Err(err);
            }
        };
        self.lock().board.prompt = None;
        let (_, token) = self.begin_request();

        let Some(session) = self.session().await else {
            return Ok(LoadOutcome::NoSession);
        };
        let result = self.repo.search_events(&session, &text).await;
        Ok(match result {
            Ok(events) => self.repaint(token, sort_by_date(events)),
            Err(err) => {
                warn!(%err, query = %text.as_str(), "search failed");
                LoadOutcome::Failed
            }
        })
    }

    pub fn toggle_filter(&self, filter: DateFilter, checked: bool) -> FilterState {
        let selection = self.transition(|s| s.with_filter(filter, checked));
        let now = self.now_local();
        let mut inner = self.lock();
        selection.filter.apply(&mut inner.board.cards, now);
        debug!(active = ?selection.filter.active(), "filter changed");
        selection.filter
    }

    pub fn open_detail(&self, card_id: &str) -> Result<DetailPanel, FinderError> {
        let mut inner = self.lock();
        let panel = inner
            .board
            .cards
            .iter()
            .find(|card| card.id.as_str() == card_id)
            .map(DetailPanel::for_card)
            .ok_or_else(|| FinderError::CardNotFound(card_id.to_string()))?;
        inner.board.detail = Some(panel.clone());
        Ok(panel)
    }

    async fn load_city(
        &self,
        session: &R::Session,
        selection: &SelectionState,
        token: RequestToken,
    ) -> LoadOutcome {
        let (_, outcome) = tokio::join!(
            self.load_venues(session, selection, token),
            self.load_events(session, selection, token)
        );
        outcome
    }

    async fn load_venues(
        &self,
        session: &R::Session,
        selection: &SelectionState,
        token: RequestToken,
    ) {
        let venues = match &selection.city {
            Some(city) => list_venues_for_city(&self.repo, session, city)
                .await
                .unwrap_or_else(|err| {
                    warn!(%err, %city, "venue list unavailable");
                    Vec::new()
                }),
            None => Vec::new(),
        };
        let mut inner = self.lock();
        if inner.selection.is_current(token) {
            inner.board.venues = venues;
        }
    }

    async fn load_events(
        &self,
        session: &R::Session,
        selection: &SelectionState,
        token: RequestToken,
    ) -> LoadOutcome {
        let query = EventQuery::upcoming(selection.city.as_deref(), (self.clock)());
        match self.repo.list_events(session, &query).await {
            Ok(events) => {
                let events = sort_by_date(narrow_by_venue(events, &selection.venue));
                self.repaint(token, events)
            }
            Err(err) => {
                warn!(%err, city = ?selection.city, "event fetch failed; keeping previous board");
                LoadOutcome::Failed
            }
        }
    }

    fn repaint(&self, token: RequestToken, events: Vec<Event>) -> LoadOutcome {
        let now = self.now_local();
        let mut inner = self.lock();
        if !inner.selection.is_current(token) {
            debug!(token = token.value(), "discarding stale response");
            return LoadOutcome::Stale;
        }
        let mut cards = render::render_cards(&events, self.tz);
        inner.selection.filter.apply(&mut cards, now);
        let selected_city = inner
            .selection
            .city
            .clone()
            .filter(|city| inner.board.cities.contains(city));
        let selected_venue = inner.selection.venue.option_value().to_string();
        let board = &mut inner.board;
        board.cards = cards;
        board.detail = None;
        board.selected_city = selected_city;
        board.selected_venue = selected_venue;
        LoadOutcome::Applied(events.len())
    }
}
