use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_name: String,
    #[serde(deserialize_with = "de_timestamp")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub location_name: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub ticket_price: String,
    #[serde(default)]
    pub greater_city: String,
}

impl Event {
    pub fn id(&self) -> EventId {
        let mut hasher = Sha256::new();
        hasher.update(self.location_name.as_bytes());
        hasher.update(b"|");
        hasher.update(self.date.to_rfc3339().as_bytes());
        hasher.update(b"|");
        hasher.update(self.event_name.as_bytes());
        EventId(format!("{:x}", hasher.finalize()))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub greater_city: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CityDoc {
    #[serde(default)]
    pub greater_city: Option<String>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub longitude: Option<f64>,
}

impl CityDoc {
    pub fn into_city(self) -> Option<City> {
        let latitude = self.latitude.filter(|v| v.is_finite())?;
        let longitude = self.longitude.filter(|v| v.is_finite())?;
        Some(City {
            greater_city: self.greater_city?,
            latitude,
            longitude,
        })
    }
}

/// Accepts an RFC 3339 string or Extended JSON (`{"$date": "..."}`,
/// `{"$date": {"$numberLong": "..."}}`, `{"$date": millis}`).
fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp: {raw}")))
}

pub(crate) fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(millis) => Utc.timestamp_millis_opt(millis.as_i64()?).single(),
        Value::Object(map) => {
            let inner = map.get("$date").or_else(|| map.get("$numberLong"))?;
            match inner {
                Value::String(text) if map.contains_key("$numberLong") => {
                    Utc.timestamp_millis_opt(text.parse().ok()?).single()
                }
                _ => parse_timestamp(inner),
            }
        }
        _ => None,
    }
}

fn de_opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_number))
}

fn parse_number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(num) => num.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        Value::Object(map) => ["$numberDouble", "$numberInt", "$numberLong", "$numberDecimal"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(parse_number),
        _ => None,
    }
}
