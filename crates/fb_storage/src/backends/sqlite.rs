use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fb_core::{
    Article, ConfigStore, ContentStore, DeliveryRecord, DeliveryStatus, DestinationKind, Error,
    Result,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        url TEXT UNIQUE NOT NULL,
        title TEXT NOT NULL,
        author TEXT,
        publish_time INTEGER,
        fetched_at INTEGER DEFAULT (strftime('%s', 'now')),
        summary TEXT,
        content TEXT,
        cover_image TEXT,
        hash TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS send_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id TEXT REFERENCES articles(id) ON DELETE CASCADE,
        target_id TEXT NOT NULL,
        target_type TEXT NOT NULL,
        sent_at INTEGER DEFAULT (strftime('%s', 'now')),
        status TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS config (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_hash ON articles(hash)",
    "CREATE INDEX IF NOT EXISTS idx_articles_publish_time ON articles(publish_time DESC)",
    "CREATE INDEX IF NOT EXISTS idx_send_logs_target ON send_logs(target_id)",
    "CREATE INDEX IF NOT EXISTS idx_send_logs_article_id ON send_logs(article_id)",
    // Add future migrations here
];

fn persistence(context: &str) -> impl Fn(sqlx::Error) -> Error + '_ {
    move |e| Error::Persistence(format!("{}: {}", context, e))
}

pub struct SQLiteStore {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

#[async_trait]
impl StorageBackend for SQLiteStore {
    fn get_error_message() -> &'static str {
        "SQLite database should be writable at the configured DATABASE_PATH"
    }

    async fn open(path: &Path) -> Result<Self> {
        Self::new_with_path(path).await
    }
}

impl SQLiteStore {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(persistence("failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Persistence(format!("failed to run migration {}: {}", i, e)))?;
        }

        tracing::info!(path = %db_path.display(), "database initialized");

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    fn article_from_row(row: &SqliteRow) -> Result<Article> {
        let publish_time: Option<i64> = row.get("publish_time");
        let published_at = publish_time
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| Error::Persistence("article has an invalid publish_time".to_string()))?;

        Ok(Article {
            id: row.get("id"),
            title: row.get("title"),
            url: row.get("url"),
            author: row.get::<Option<String>, _>("author").unwrap_or_default(),
            published_at,
            summary: row.get::<Option<String>, _>("summary").unwrap_or_default(),
            content: row.get("content"),
            cover_image: row.get("cover_image"),
            hash: row.get("hash"),
        })
    }

    fn record_from_row(row: &SqliteRow) -> Result<DeliveryRecord> {
        let target_type: String = row.get("target_type");
        let status: String = row.get("status");
        let sent_at: i64 = row.get("sent_at");

        Ok(DeliveryRecord {
            article_id: row.get("article_id"),
            destination_id: row.get("target_id"),
            destination_kind: DestinationKind::parse(&target_type).ok_or_else(|| {
                Error::Persistence(format!("unknown target type: {}", target_type))
            })?,
            sent_at: DateTime::<Utc>::from_timestamp(sent_at, 0)
                .ok_or_else(|| Error::Persistence(format!("invalid sent_at: {}", sent_at)))?,
            status: DeliveryStatus::parse(&status)
                .ok_or_else(|| Error::Persistence(format!("unknown status: {}", status)))?,
        })
    }
}

#[async_trait]
impl ContentStore for SQLiteStore {
    async fn hash_exists(&self, hash: &str) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM articles WHERE hash = ? LIMIT 1")
            .bind(hash)
            .fetch_optional(&*self.pool)
            .await
            .map_err(persistence("failed to look up article hash"))?;
        Ok(row.is_some())
    }

    async fn insert_articles(&self, articles: &[Article]) -> Result<Vec<String>> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(persistence("failed to begin transaction"))?;

        let mut saved = Vec::new();
        for article in articles {
            let Some(hash) = article.hash.as_deref() else {
                continue;
            };
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO articles
                (id, url, title, author, publish_time, summary, content, cover_image, hash)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&article.id)
            .bind(&article.url)
            .bind(&article.title)
            .bind(&article.author)
            .bind(article.published_at.timestamp_millis())
            .bind(&article.summary)
            .bind(article.content.as_deref().unwrap_or_default())
            .bind(article.cover_image.as_deref())
            .bind(hash)
            .execute(&mut *tx)
            .await
            .map_err(persistence("failed to store article"))?;

            if result.rows_affected() > 0 {
                saved.push(article.id.clone());
            }
        }

        tx.commit()
            .await
            .map_err(persistence("failed to commit articles"))?;
        Ok(saved)
    }

    async fn record_deliveries(&self, records: &[DeliveryRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(persistence("failed to begin transaction"))?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO send_logs (article_id, target_id, target_type, sent_at, status)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.article_id)
            .bind(&record.destination_id)
            .bind(record.destination_kind.as_str())
            .bind(record.sent_at.timestamp())
            .bind(record.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(persistence("failed to record delivery"))?;
        }

        tx.commit()
            .await
            .map_err(persistence("failed to commit delivery records"))?;
        Ok(())
    }

    async fn is_delivered(&self, article_id: &str, destination_id: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT id FROM send_logs WHERE article_id = ? AND target_id = ? AND status = ? LIMIT 1",
        )
        .bind(article_id)
        .bind(destination_id)
        .bind(DeliveryStatus::Success.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(persistence("failed to look up delivery"))?;
        Ok(row.is_some())
    }

    async fn recent_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            ORDER BY publish_time DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(persistence("failed to get recent articles"))?;

        rows.iter().map(Self::article_from_row).collect()
    }

    async fn deliveries_for(&self, destination_id: &str) -> Result<Vec<DeliveryRecord>> {
        let rows = sqlx::query("SELECT * FROM send_logs WHERE target_id = ? ORDER BY id ASC")
            .bind(destination_id)
            .fetch_all(&*self.pool)
            .await
            .map_err(persistence("failed to get delivery records"))?;

        rows.iter().map(Self::record_from_row).collect()
    }
}

#[async_trait]
impl ConfigStore for SQLiteStore {
    async fn get_config(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&*self.pool)
            .await
            .map_err(persistence("failed to read config"))?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO config (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&*self.pool)
            .await
            .map_err(persistence("failed to write config"))?;
        Ok(())
    }
}
