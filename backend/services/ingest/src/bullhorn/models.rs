use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Continuation for `search/JobOrder`: the `start` offset of the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageToken(pub u32);

/// One id from the listing endpoint plus the modification time it reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEntry {
    pub external_id: String,
    pub modified_at: Option<DateTime<Utc>>,
}

impl WindowEntry {
    pub fn new(external_id: impl Into<String>, modified_at: Option<DateTime<Utc>>) -> Self {
        Self {
            external_id: external_id.into(),
            modified_at,
        }
    }
}

/// One page of recent job ids, newest first.
#[derive(Debug, Clone, Default)]
pub struct IdPage {
    pub entries: Vec<WindowEntry>,
    pub next: Option<PageToken>,
}

/// Envelope returned by `search/JobOrder`.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub start: u32,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub data: Vec<JobOrderRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOrderRef {
    pub id: Value,
    pub date_last_modified: Option<Value>,
}

impl JobOrderRef {
    /// `None` when the row carries no usable id.
    pub fn into_entry(self) -> Option<WindowEntry> {
        let external_id = external_id_from(&self.id)?;
        let modified_at = self.date_last_modified.as_ref().and_then(timestamp_from);
        Some(WindowEntry {
            external_id,
            modified_at,
        })
    }
}

/// Envelope returned by `entity/JobOrder/{id}`.
#[derive(Debug, Deserialize)]
pub struct EntityResponse {
    pub data: Option<JobPayload>,
}

/// A job order as returned by the entity endpoint.
///
/// Everything is optional at this layer; the mapper decides which fields a record
/// cannot do without. Unrecognised fields are kept in `extra` so the stored raw
/// payload stays complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub id: Option<Value>,
    pub title: Option<String>,
    pub date_added: Option<Value>,
    pub date_last_modified: Option<Value>,
    pub employment_type: Option<String>,
    pub is_open: Option<bool>,
    pub status: Option<String>,
    pub public_description: Option<String>,
    pub description: Option<String>,
    pub address: Option<Address>,
    pub categories: Option<Association>,
    pub skills: Option<Association>,
    pub salary: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country_name: Option<String>,
}

/// To-many association as Bullhorn nests it: `{ "total": n, "data": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Association {
    #[serde(default)]
    pub data: Vec<NamedEntity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedEntity {
    pub id: Option<Value>,
    pub name: Option<String>,
}

/// Bullhorn ids arrive as JSON numbers, occasionally as strings.
pub fn external_id_from(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Parse an upstream timestamp: epoch milliseconds (number or numeric string) or RFC 3339.
pub fn timestamp_from(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return Utc.timestamp_millis_opt(ms).single();
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}
