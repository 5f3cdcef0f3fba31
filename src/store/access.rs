use std::net::IpAddr;

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::error::{validation::validate_ip_address, AppError, AppResult, OptionExt};
use crate::types::{format_timestamp, parse_timestamp, BlockedIpEntry, NewBlockedIp, UpdateBlockedIp};

/// The block list.
///
/// Addresses are normalised to their canonical textual form on every write so
/// that `::1` and `0:0:0:0:0:0:0:1` land on the same unique row, and
/// `is_blocked` compares against the same canonical form.
#[derive(Clone)]
pub struct AccessControlStore {
    db: SqlitePool,
}

const SELECT_COLUMNS: &str = "SELECT id, ip_address, created_at, reason, is_active FROM blocked_ips";

fn row_to_entry(row: &SqliteRow) -> AppResult<BlockedIpEntry> {
    let created_raw: String = row.try_get("created_at")?;
    let created_at = parse_timestamp(&created_raw)
        .ok_or_else(|| AppError::Database(format!("Unparseable created_at: {}", created_raw)))?;
    Ok(BlockedIpEntry {
        id: row.try_get("id")?,
        ip_address: row.try_get("ip_address")?,
        created_at,
        reason: row.try_get("reason")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
    })
}

fn normalize_reason(reason: Option<String>) -> Option<String> {
    reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty())
}

impl AccessControlStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Returns true only when an entry for `ip` exists and is active.
    pub async fn is_blocked(&self, ip: IpAddr) -> AppResult<bool> {
        let hit: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM blocked_ips WHERE ip_address = ?1 AND is_active = 1 LIMIT 1")
                .bind(ip.to_canonical().to_string())
                .fetch_optional(&self.db)
                .await?;
        Ok(hit.is_some())
    }

    pub async fn add(&self, new: NewBlockedIp) -> AppResult<BlockedIpEntry> {
        let ip = validate_ip_address(&new.ip_address)?;
        let canonical = ip.to_string();
        if self.find_by_ip(&canonical).await?.is_some() {
            return Err(AppError::Conflict(format!("IP {} is already on the block list", canonical)));
        }

        let id = sqlx::query(
            "INSERT INTO blocked_ips (ip_address, created_at, reason, is_active) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&canonical)
        .bind(format_timestamp(&Utc::now()))
        .bind(normalize_reason(new.reason))
        .bind(new.is_active.unwrap_or(true) as i64)
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        tracing::info!(ip = %canonical, id, "Added IP to block list");
        self.get(id).await
    }

    pub async fn get(&self, id: i64) -> AppResult<BlockedIpEntry> {
        let row = sqlx::query(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_not_found("Blocked IP")?;
        row_to_entry(&row)
    }

    pub async fn find_by_ip(&self, ip: &str) -> AppResult<Option<BlockedIpEntry>> {
        let canonical = validate_ip_address(ip)?.to_string();
        let row = sqlx::query(&format!("{} WHERE ip_address = ?1", SELECT_COLUMNS))
            .bind(canonical)
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(row_to_entry).transpose()
    }

    /// Lists entries newest first.
    pub async fn list(&self, active_only: bool) -> AppResult<Vec<BlockedIpEntry>> {
        let sql = if active_only {
            format!("{} WHERE is_active = 1 ORDER BY created_at DESC, id DESC", SELECT_COLUMNS)
        } else {
            format!("{} ORDER BY created_at DESC, id DESC", SELECT_COLUMNS)
        };
        let rows = sqlx::query(&sql).fetch_all(&self.db).await?;
        rows.iter().map(row_to_entry).collect()
    }

    pub async fn update(&self, id: i64, update: UpdateBlockedIp) -> AppResult<BlockedIpEntry> {
        let current = self.get(id).await?;

        let ip_address = match update.ip_address.as_deref() {
            Some(raw) => {
                let canonical = validate_ip_address(raw)?.to_string();
                if canonical != current.ip_address {
                    if let Some(other) = self.find_by_ip(&canonical).await? {
                        return Err(AppError::Conflict(format!(
                            "IP {} is already on the block list (id {})",
                            canonical, other.id
                        )));
                    }
                }
                canonical
            }
            None => current.ip_address,
        };
        let reason = match update.reason {
            Some(r) => normalize_reason(Some(r)),
            None => current.reason,
        };
        let is_active = update.is_active.unwrap_or(current.is_active);

        sqlx::query("UPDATE blocked_ips SET ip_address = ?1, reason = ?2, is_active = ?3 WHERE id = ?4")
            .bind(&ip_address)
            .bind(reason)
            .bind(is_active as i64)
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(ip = %ip_address, id, is_active, "Updated block list entry");
        self.get(id).await
    }

    /// Toggles an entry without deleting it.
    pub async fn set_active(&self, id: i64, active: bool) -> AppResult<BlockedIpEntry> {
        self.update(id, UpdateBlockedIp { is_active: Some(active), ..Default::default() }).await
    }

    pub async fn remove(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM blocked_ips WHERE id = ?1").bind(id).execute(&self.db).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Blocked IP not found".to_string()));
        }
        tracing::info!(id, "Removed block list entry");
        Ok(())
    }
}
