//! Core domain types: the layered bundle metadata view and timestamps.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Timelike};
use serde_json::{Map, Value};

/// Raw metadata as read from a bundle's meta file.
pub type MetaData = Map<String, Value>;

/// Meta key injected with the bundle's key.
pub const META_KEY: &str = "key";

/// Meta key injected with the bundle's source directory.
pub const META_DIRECTORY: &str = "directory";

/// Timestamp fields consulted by [`Meta::recent`], in precedence order.
pub const RECENT_FIELDS: [&str; 3] = ["updated_time", "publish_time", "created_time"];

/// Format used when quire writes timestamps into metadata.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

/// Two-tier metadata lookup: the bundle's own data first, then site defaults.
///
/// Writes only ever touch the bundle's own data; the defaults are shared
/// between all bundles and never change for a bundle's lifetime.
#[derive(Debug, Clone, Default)]
pub struct Meta {
    data: MetaData,
    defaults: Arc<MetaData>,
}

impl Meta {
    pub fn new(data: MetaData, defaults: Arc<MetaData>) -> Self {
        Self { data, defaults }
    }

    /// Look up a key in own data, falling back to defaults.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key).or_else(|| self.defaults.get(key))
    }

    /// Like [`Meta::get`], but also resolves the derived `recent` field.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        match self.get(key) {
            Some(v) => Some(v),
            None if key == "recent" => self.recent(),
            None => None,
        }
    }

    /// String value of a key, if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key) || self.defaults.contains_key(key)
    }

    /// Set a key in the bundle's own data.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Remove a key from the bundle's own data. Defaults stay visible.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Iterate the bundle's own keys (not the defaults).
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// The bundle's own data.
    pub fn data(&self) -> &MetaData {
        &self.data
    }

    /// Merge more data into the bundle's own data.
    pub fn update(&mut self, data: MetaData) {
        self.data.extend(data);
    }

    /// First present (non-null) of `updated_time`, `publish_time`, `created_time`.
    pub fn recent(&self) -> Option<&Value> {
        RECENT_FIELDS
            .iter()
            .filter_map(|field| self.get(field))
            .find(|v| !v.is_null())
    }

    /// Flattened view (defaults overlaid with own data) plus `recent`.
    pub fn to_value(&self) -> Value {
        let mut merged = (*self.defaults).clone();
        merged.extend(self.data.clone());
        if !merged.contains_key("recent") {
            if let Some(recent) = self.recent() {
                merged.insert("recent".into(), recent.clone());
            }
        }
        Value::Object(merged)
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Current local time truncated to the minute.
pub fn now_minute() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// Render a timestamp the way quire stores it in metadata.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse the timestamp spellings found in metadata files.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM:SS`, and
/// plain dates (midnight).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in [TIMESTAMP_FORMAT, "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
