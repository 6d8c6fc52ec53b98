use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ArchiveStatus;

pub const DEEP_ARCHIVE: &str = "DEEP_ARCHIVE";

static EXPIRY_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"expiry-date="([^"]*)""#).expect("expiry-date pattern"));

/// Vendor head-object fields as relayed by the portal status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadObject {
    #[serde(rename = "StorageClass", default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(rename = "Restore", default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl HeadObject {
    pub fn with_storage_class(storage_class: &str) -> Self {
        Self {
            storage_class: Some(storage_class.to_string()),
            ..Self::default()
        }
    }

    pub fn restore(mut self, marker: &str) -> Self {
        self.restore = Some(marker.to_string());
        self
    }

    fn is_deep_archive(&self) -> bool {
        self.storage_class.as_deref() == Some(DEEP_ARCHIVE)
    }
}

/// Classifies against the wall clock.
pub fn classify(payload: &HeadObject) -> ArchiveStatus {
    classify_at(payload, Utc::now())
}

/// First matching rule wins:
/// error, archived without restore, restore without expiry,
/// restore with a past expiry, everything else available.
///
/// A restore marker that lacks the expiry substring always reads as
/// RESTORING, whatever else is malformed about it. Callers treat
/// RESTORING as "retry later".
pub fn classify_at(payload: &HeadObject, now: DateTime<Utc>) -> ArchiveStatus {
    if payload.error.is_some() {
        return ArchiveStatus::Error;
    }

    let restore = payload.restore.as_deref();
    if payload.is_deep_archive() {
        match restore {
            None => return ArchiveStatus::Archived,
            Some(marker) if !marker.contains("expiry-date") => return ArchiveStatus::Restoring,
            Some(_) => {}
        }
    }

    if let Some(expiry) = restore.and_then(parse_expiry) {
        if expiry < now {
            return ArchiveStatus::Expired;
        }
    }

    ArchiveStatus::Available
}

/// Extracts the `expiry-date="..."` value of a restore marker.
pub fn parse_expiry(marker: &str) -> Option<DateTime<Utc>> {
    let captures = EXPIRY_DATE.captures(marker)?;
    let raw = captures.get(1)?.as_str();
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
