use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::EventRepository;
use crate::config::AppConfig;
use crate::error::RepositoryError;
use crate::models::{City, CityDoc, Event};
use crate::query::{EventQuery, SearchText};

const ATLAS_SERVICE: &str = "mongodb-atlas";
const USER_AGENT: &str = "event-finder/0.1";
const REQUEST_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct RealmSession {
    pub access_token: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct LocationResponse {
    hostname: String,
}

pub struct RealmClient {
    app_id: String,
    base_url: String,
    database: String,
    events_collection: String,
    cities_collection: String,
    hostname: OnceCell<String>,
    client: Client,
}

impl RealmClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, RepositoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| RepositoryError::Http(err.to_string()))?;
        Ok(Self {
            app_id: config.realm_app_id.clone(),
            base_url: config.realm_base_url.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            events_collection: config.events_collection.clone(),
            cities_collection: config.cities_collection.clone(),
            hostname: OnceCell::new(),
            client,
        })
    }

    /// Region-specific hostname for the app, looked up once.
    async fn hostname(&self) -> &str {
        self.hostname
            .get_or_init(|| async {
                match self.fetch_location().await {
                    Ok(hostname) => hostname.trim_end_matches('/').to_string(),
                    Err(err) => {
                        warn!(%err, "app location lookup failed; using base url");
                        self.base_url.clone()
                    }
                }
            })
            .await
    }

    async fn fetch_location(&self) -> Result<String, RepositoryError> {
        let url = format!(
            "{}/api/client/v2.0/app/{}/location",
            self.base_url, self.app_id
        );
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| RepositoryError::Http(err.to_string()))?;
        let body = read_body(response).await?;
        let location: LocationResponse =
            serde_json::from_str(&body).map_err(|err| RepositoryError::Parse(err.to_string()))?;
        Ok(location.hostname)
    }

    async fn login(&self) -> Result<RealmSession, RepositoryError> {
        let url = format!(
            "{}/api/client/v2.0/app/{}/auth/providers/anon-user/login",
            self.hostname().await,
            self.app_id
        );
        let response = self
            .client
            .post(url)
            .json(&json!({}))
            .send()
            .await
            .map_err(|err| RepositoryError::Http(err.to_string()))?;
        let body = read_body(response).await?;
        let login: LoginResponse =
            serde_json::from_str(&body).map_err(|err| RepositoryError::Parse(err.to_string()))?;
        Ok(RealmSession {
            access_token: login.access_token,
            user_id: login.user_id,
        })
    }

    async fn call_function(
        &self,
        session: &RealmSession,
        payload: &Value,
    ) -> Result<Value, RepositoryError> {
        let url = format!(
            "{}/api/client/v2.0/app/{}/functions/call",
            self.hostname().await,
            self.app_id
        );
        debug!(function = %payload["name"], "calling app function");
        let response = self
            .client
            .post(url)
            .bearer_auth(&session.access_token)
            .json(payload)
            .send()
            .await
            .map_err(|err| RepositoryError::Http(err.to_string()))?;
        let body = read_body(response).await?;
        serde_json::from_str(&body).map_err(|err| RepositoryError::Parse(err.to_string()))
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, RepositoryError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| RepositoryError::Http(err.to_string()))?;
    if !status.is_success() {
        return Err(RepositoryError::Http(format!("status {}: {}", status, text)));
    }
    Ok(text)
}

pub(crate) fn find_payload(database: &str, collection: &str, query: &Value) -> Value {
    json!({
        "name": "find",
        "service": ATLAS_SERVICE,
        "arguments": [{
            "database": database,
            "collection": collection,
            "query": query,
        }],
    })
}

pub(crate) fn function_payload(name: &str, arguments: Vec<Value>) -> Value {
    json!({ "name": name, "arguments": arguments })
}

fn as_documents(value: Value) -> Result<Vec<Value>, RepositoryError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(RepositoryError::Parse(format!(
            "expected an array of documents, got {other}"
        ))),
    }
}

/// Documents that do not look like events are skipped, not fatal.
pub(crate) fn parse_events(value: Value) -> Result<Vec<Event>, RepositoryError> {
    let mut events = Vec::new();
    for doc in as_documents(value)? {
        match serde_json::from_value::<Event>(doc) {
            Ok(event) => events.push(event),
            Err(err) => warn!(%err, "skipping malformed event document"),
        }
    }
    Ok(events)
}

pub(crate) fn parse_cities(value: Value) -> Result<Vec<City>, RepositoryError> {
    Ok(as_documents(value)?
        .into_iter()
        .filter_map(|doc| serde_json::from_value::<CityDoc>(doc).ok())
        .filter_map(CityDoc::into_city)
        .collect())
}

pub(crate) fn parse_labels(value: Value) -> Result<Vec<String>, RepositoryError> {
    Ok(as_documents(value)?
        .into_iter()
        .filter_map(|item| match item {
            Value::String(label) if !label.trim().is_empty() => Some(label),
            _ => None,
        })
        .collect())
}

impl EventRepository for RealmClient {
    type Session = RealmSession;

    async fn authenticate(&self) -> Option<RealmSession> {
        match self.login().await {
            Ok(session) => {
                debug!(user_id = %session.user_id, "anonymous login succeeded");
                Some(session)
            }
            Err(err) => {
                warn!(%err, "anonymous login failed");
                None
            }
        }
    }

    async fn list_distinct_cities(
        &self,
        session: &RealmSession,
    ) -> Result<Vec<String>, RepositoryError> {
        let payload = function_payload("getDistinctCities", Vec::new());
        parse_labels(self.call_function(session, &payload).await?)
    }

    async fn list_cities(&self, session: &RealmSession) -> Result<Vec<City>, RepositoryError> {
        let payload = find_payload(&self.database, &self.cities_collection, &json!({}));
        parse_cities(self.call_function(session, &payload).await?)
    }

    async fn list_events(
        &self,
        session: &RealmSession,
        query: &EventQuery,
    ) -> Result<Vec<Event>, RepositoryError> {
        let payload = find_payload(
            &self.database,
            &self.events_collection,
            &query.to_filter_document(),
        );
        parse_events(self.call_function(session, &payload).await?)
    }

    async fn search_events(
        &self,
        session: &RealmSession,
        text: &SearchText,
    ) -> Result<Vec<Event>, RepositoryError> {
        let payload = function_payload("searchEvents", vec![Value::String(text.as_str().into())]);
        parse_events(self.call_function(session, &payload).await?)
    }
}
