use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::store::NewLink;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("URL is required")]
    MissingUrl,
    #[error("{0} must be a string")]
    NotAString(&'static str),
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// Turns the raw body of a `POST /links` into a [`NewLink`].
///
/// Only presence is checked: anything that doesn't yield a JSON object with a
/// non-empty `url` (no body, broken JSON, an array, `{}`, `"url": ""`) is a missing URL.
/// Lengths are left to the column constraints.
pub fn parse_new_link(body: &[u8]) -> Result<NewLink, ValidationError> {
    if body.is_empty() {
        return Err(ValidationError::MissingUrl);
    }

    let fields = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => fields,
        _ => return Err(ValidationError::MissingUrl),
    };

    let url = match optional_string(&fields, "url")? {
        Some(url) if !url.is_empty() => url,
        _ => return Err(ValidationError::MissingUrl),
    };

    Ok(NewLink {
        url,
        title: optional_string(&fields, "title")?,
        description: optional_string(&fields, "description")?,
    })
}

fn optional_string(
    fields: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, ValidationError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(ValidationError::NotAString(key)),
    }
}
