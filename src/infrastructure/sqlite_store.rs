use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Local, Timelike};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::application::{AppError, AppResult, EventLog, EventQuery, HourlyCount};
use crate::domain::{EventKind, SlotEvent};

/// Event log in a SQLite file (`events.db`).
pub struct SqliteEventLog {
    pool: SqlitePool,
}

impl SqliteEventLog {
    pub async fn open(path: &Path) -> AppResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> AppResult<()> {
        // hour is the local hour-of-day, denormalised for the report query
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              timestamp TEXT NOT NULL,
              epoch INTEGER NOT NULL,
              hour INTEGER NOT NULL,
              event_kind TEXT NOT NULL,
              slot_name TEXT NOT NULL
            );
          "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_epoch ON events(epoch);")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl EventLog for SqliteEventLog {
    async fn append(&self, events: &[SlotEvent]) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        for ev in events {
            sqlx::query(
                r#"
                INSERT INTO events(timestamp, epoch, hour, event_kind, slot_name)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(ev.timestamp.to_rfc3339())
            .bind(ev.timestamp.timestamp())
            .bind(ev.timestamp.hour() as i64)
            .bind(ev.kind.as_str())
            .bind(&ev.slot)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, query: EventQuery) -> AppResult<Vec<SlotEvent>> {
        let since = query.since.map(|s| s.timestamp());
        let kind = query.kind.map(|k| k.as_str());

        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT timestamp, event_kind, slot_name FROM events
            WHERE (? IS NULL OR epoch >= ?)
              AND (? IS NULL OR event_kind = ?)
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(since)
        .bind(since)
        .bind(kind)
        .bind(kind)
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        rows.into_iter()
            .map(|(ts, kind, slot)| {
                let timestamp = DateTime::parse_from_rfc3339(&ts)
                    .map_err(|e| AppError::Storage(format!("bad timestamp {ts}: {e}")))?
                    .with_timezone(&Local);
                let kind: EventKind = kind.parse().map_err(AppError::Storage)?;
                Ok(SlotEvent::new(kind, slot, timestamp))
            })
            .collect()
    }

    async fn additions_by_hour(&self) -> AppResult<Vec<HourlyCount>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT hour, COUNT(*) FROM events
            WHERE event_kind = 'added'
            GROUP BY hour
            ORDER BY hour
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(hour, count)| HourlyCount {
                hour: hour as u32,
                count: count as u64,
            })
            .collect())
    }
}
