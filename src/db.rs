use sqlx::SqlitePool;

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pragmas for better durability/performance
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }

    // request_logs: append-only audit trail
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS request_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ip_address TEXT NOT NULL,
            path TEXT NOT NULL CHECK (length(path) <= 255),
            method TEXT NOT NULL CHECK (length(method) <= 10),
            timestamp TEXT NOT NULL,
            user_agent TEXT NULL,
            country TEXT NULL CHECK (country IS NULL OR length(country) <= 100),
            city TEXT NULL CHECK (city IS NULL OR length(city) <= 100),
            latitude REAL NULL,
            longitude REAL NULL
        )"#,
    )
    .execute(pool)
    .await?;

    // blocked_ips: one row per address
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS blocked_ips (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ip_address TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            reason TEXT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        )"#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        ("idx_request_logs_ip", "CREATE INDEX IF NOT EXISTS idx_request_logs_ip ON request_logs(ip_address)"),
        (
            "idx_request_logs_country_city",
            "CREATE INDEX IF NOT EXISTS idx_request_logs_country_city ON request_logs(country, city)",
        ),
        (
            "idx_request_logs_timestamp",
            "CREATE INDEX IF NOT EXISTS idx_request_logs_timestamp ON request_logs(timestamp DESC)",
        ),
        (
            "idx_blocked_ips_created",
            "CREATE INDEX IF NOT EXISTS idx_blocked_ips_created ON blocked_ips(created_at DESC)",
        ),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if msg.contains("already exists") || msg.contains("duplicate") {
                        tracing::debug!("Index {} already exists, skipping", name);
                    } else {
                        tracing::warn!("Failed to create index {}: {}", name, e);
                    }
                }
                _ => {
                    tracing::warn!("Failed to create index {}: {}", name, e);
                }
            }
        }
    }

    Ok(())
}
