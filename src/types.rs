use std::net::IpAddr;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_PATH_LEN: usize = 255;
pub const MAX_METHOD_LEN: usize = 10;
pub const MAX_PLACE_LEN: usize = 100;

/// Timestamps are stored as fixed-width UTC text so that lexical order in
/// SQLite equals chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).ok())
}

/// Truncates to at most `max` characters without splitting a code point.
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

/// Geolocation attached to a request log entry. Every field is optional; an
/// all-empty record means the lookup failed or returned nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeolocationRecord {
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeolocationRecord {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.city.is_none() && self.latitude.is_none() && self.longitude.is_none()
    }
}

/// A request record as read back from the log store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub id: i64,
    pub ip_address: String,
    pub path: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A request record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequestLog {
    pub ip_address: IpAddr,
    pub path: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub geo: GeolocationRecord,
}

impl NewRequestLog {
    /// Builds a record stamped with the current instant, clamping fields to
    /// their column limits.
    pub fn new(ip_address: IpAddr, path: &str, method: &str, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            path: truncate_chars(path, MAX_PATH_LEN),
            method: truncate_chars(method, MAX_METHOD_LEN),
            // Microseconds: the precision kept by the store
            timestamp: Utc::now().trunc_subsecs(6),
            user_agent,
            geo: GeolocationRecord::empty(),
        }
    }

    pub fn with_geo(mut self, geo: GeolocationRecord) -> Self {
        self.geo = GeolocationRecord {
            country: geo.country.map(|c| truncate_chars(&c, MAX_PLACE_LEN)),
            city: geo.city.map(|c| truncate_chars(&c, MAX_PLACE_LEN)),
            latitude: geo.latitude,
            longitude: geo.longitude,
        };
        self
    }
}

/// Filters for reading the request log. All filters are optional and combined with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub ip: Option<String>,
    /// Substring match on the request path.
    pub path: Option<String>,
    pub method: Option<String>,
    /// Substring match on the user agent.
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LogPage {
    pub items: Vec<RequestLogEntry>,
    pub total_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedIpEntry {
    pub id: i64,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBlockedIp {
    pub ip_address: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Partial update of a block entry. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBlockedIp {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("GET", 10), "GET");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("Zürich-Altstadt", 2), "Zü");
    }

    #[test]
    fn test_new_request_log_clamps_fields() {
        let long_path = format!("/{}", "a".repeat(400));
        let entry = NewRequestLog::new("10.0.0.1".parse().unwrap(), &long_path, "PROPPATCHXYZ", None);
        assert_eq!(entry.path.chars().count(), MAX_PATH_LEN);
        assert_eq!(entry.method, "PROPPATCHX");
    }

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let a = DateTime::parse_from_rfc3339("2026-10-15T10:00:00Z").unwrap().with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2026-10-15T10:00:00.5Z").unwrap().with_timezone(&Utc);
        assert!(format_timestamp(&a) < format_timestamp(&b));
        assert_eq!(parse_timestamp(&format_timestamp(&b)), Some(b));
    }
}
