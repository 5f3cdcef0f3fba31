use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::{AppError, AppResult, OptionExt};
use crate::types::{format_timestamp, parse_timestamp, LogQuery, NewRequestLog, RequestLogEntry};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 1000;
const MAX_OFFSET: i64 = 100_000;

const LIKE_ESCAPE: char = '!';

fn escape_like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

fn row_to_entry(row: &SqliteRow) -> AppResult<RequestLogEntry> {
    let ts_raw: String = row.try_get("timestamp")?;
    let timestamp = parse_timestamp(&ts_raw)
        .ok_or_else(|| AppError::Database(format!("Unparseable timestamp: {}", ts_raw)))?;
    Ok(RequestLogEntry {
        id: row.try_get("id")?,
        ip_address: row.try_get("ip_address")?,
        path: row.try_get("path")?,
        method: row.try_get("method")?,
        timestamp,
        user_agent: row.try_get("user_agent")?,
        country: row.try_get("country")?,
        city: row.try_get("city")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
    })
}

/// Appends `WHERE ...` for every filter that is set.
fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, query: &'a LogQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(ip) = query.ip.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        // Same canonical form that append() writes
        let ip = ip
            .parse::<std::net::IpAddr>()
            .map(|a| a.to_canonical().to_string())
            .unwrap_or_else(|_| ip.to_string());
        qb.push(" AND ip_address = ").push_bind(ip);
    }
    if let Some(path) = query.path.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND path LIKE ")
            .push_bind(format!("%{}%", escape_like_pattern(path)))
            .push(" ESCAPE '!'");
    }
    if let Some(method) = query.method.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND method = ").push_bind(method.to_ascii_uppercase());
    }
    if let Some(ua) = query.user_agent.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND user_agent LIKE ")
            .push_bind(format!("%{}%", escape_like_pattern(ua)))
            .push(" ESCAPE '!'");
    }
    if let Some(country) = query.country.as_deref() {
        qb.push(" AND country = ").push_bind(country);
    }
    if let Some(city) = query.city.as_deref() {
        qb.push(" AND city = ").push_bind(city);
    }
    if let Some(since) = query.since.as_ref() {
        qb.push(" AND timestamp >= ").push_bind(format_timestamp(since));
    }
    if let Some(until) = query.until.as_ref() {
        qb.push(" AND timestamp <= ").push_bind(format_timestamp(until));
    }
}

/// Append-only request log: entries are written once and never updated or deleted.
#[derive(Clone)]
pub struct RequestLogStore {
    db: SqlitePool,
}

impl RequestLogStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Persists one entry and returns its id.
    pub async fn append(&self, entry: &NewRequestLog) -> AppResult<i64> {
        let id = sqlx::query(
            r#"INSERT INTO request_logs
               (ip_address, path, method, timestamp, user_agent, country, city, latitude, longitude)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
        )
        .bind(entry.ip_address.to_canonical().to_string())
        .bind(&entry.path)
        .bind(&entry.method)
        .bind(format_timestamp(&entry.timestamp))
        .bind(entry.user_agent.as_deref())
        .bind(entry.geo.country.as_deref())
        .bind(entry.geo.city.as_deref())
        .bind(entry.geo.latitude)
        .bind(entry.geo.longitude)
        .execute(&self.db)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> AppResult<RequestLogEntry> {
        let row = sqlx::query("SELECT * FROM request_logs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_not_found("Request log entry")?;
        row_to_entry(&row)
    }

    /// Returns matching entries, newest first.
    pub async fn list(&self, query: &LogQuery) -> AppResult<Vec<RequestLogEntry>> {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = query.offset.unwrap_or(0).clamp(0, MAX_OFFSET);

        let mut qb = QueryBuilder::new("SELECT * FROM request_logs");
        push_filters(&mut qb, query);
        qb.push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb.build().fetch_all(&self.db).await?;
        rows.iter().map(row_to_entry).collect()
    }

    pub async fn count(&self, query: &LogQuery) -> AppResult<i64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) AS cnt FROM request_logs");
        push_filters(&mut qb, query);
        let row = qb.build().fetch_one(&self.db).await?;
        Ok(row.try_get::<i64, _>("cnt")?)
    }
}
