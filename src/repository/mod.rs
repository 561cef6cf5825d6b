pub mod local;
pub mod realm;

use std::future::Future;

use crate::error::RepositoryError;
use crate::models::{City, Event};
use crate::query::{distinct_venues, EventQuery, SearchText};

/// Backend holding cities and events. Every data call needs a session from
/// [`EventRepository::authenticate`].
pub trait EventRepository: Send + Sync {
    type Session: Clone + Send + Sync;

    fn authenticate(&self) -> impl Future<Output = Option<Self::Session>> + Send;

    fn list_distinct_cities(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<Vec<String>, RepositoryError>> + Send;

    fn list_cities(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<Vec<City>, RepositoryError>> + Send;

    fn list_events(
        &self,
        session: &Self::Session,
        query: &EventQuery,
    ) -> impl Future<Output = Result<Vec<Event>, RepositoryError>> + Send;

    fn search_events(
        &self,
        session: &Self::Session,
        text: &SearchText,
    ) -> impl Future<Output = Result<Vec<Event>, RepositoryError>> + Send;
}

pub async fn list_venues_for_city<R: EventRepository>(
    repo: &R,
    session: &R::Session,
    city: &str,
) -> Result<Vec<String>, RepositoryError> {
    let events = repo.list_events(session, &EventQuery::for_city(city)).await?;
    Ok(distinct_venues(&events))
}
