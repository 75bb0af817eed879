use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_TITLE_LENGTH: usize = 255;

/// A stored bookmark, exactly as it is returned over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: i32,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(with = "iso8601_utc")]
    pub created_at: DateTime<Utc>,
}

/// The caller-supplied part of a [`Link`]; `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl NewLink {
    pub fn new(url: impl Into<String>) -> Self {
        NewLink {
            url: url.into(),
            title: None,
            description: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// Always rendered with an explicit "+00:00" offset and microsecond precision,
// which is what a timestamptz column round-trips.
mod iso8601_utc {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, false))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
