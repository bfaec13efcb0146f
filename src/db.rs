use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::report::AnalysisReport;

const API_KEY_SETTING: &str = "gemini_api_key";
const LAST_REQUEST_SETTING: &str = "last_request_at";

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS daily_usage (
            day    TEXT PRIMARY KEY,
            count  INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS settings (
            key    TEXT PRIMARY KEY,
            value  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reports (
            id            INTEGER PRIMARY KEY,
            page_title    TEXT NOT NULL,
            page_url      TEXT NOT NULL,
            document_type TEXT NOT NULL,
            confidence    INTEGER NOT NULL,
            body          TEXT NOT NULL,
            created_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reports_created ON reports(created_at);
        ",
    )?;
    Ok(())
}

// ── Usage ──
// Usage queries return rusqlite errors so the request layer can wrap them in its own type.

pub fn get_usage(conn: &Connection, day: &str) -> rusqlite::Result<u32> {
    let count: Option<u32> = conn
        .query_row(
            "SELECT count FROM daily_usage WHERE day = ?1",
            [day],
            |r| r.get(0),
        )
        .optional()?;
    Ok(count.unwrap_or(0))
}

/// Bump the counter for `day` and return the new count.
pub fn increment_usage(conn: &Connection, day: &str) -> rusqlite::Result<u32> {
    conn.execute(
        "INSERT INTO daily_usage (day, count) VALUES (?1, 1)
         ON CONFLICT(day) DO UPDATE SET count = count + 1",
        [day],
    )?;
    get_usage(conn, day)
}

// ── Rate limit ──

/// When the last model request was started, by any run.
pub fn last_request_at(conn: &Connection) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [LAST_REQUEST_SETTING],
            |r| r.get(0),
        )
        .optional()?;
    Ok(value
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis))
}

/// Stored as epoch milliseconds.
pub fn set_last_request_at(conn: &Connection, at: DateTime<Utc>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![LAST_REQUEST_SETTING, at.timestamp_millis().to_string()],
    )?;
    Ok(())
}

// ── API key ──

/// Store the key. A blank key removes the stored one.
pub fn save_api_key(conn: &Connection, key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        conn.execute("DELETE FROM settings WHERE key = ?1", [API_KEY_SETTING])?;
    } else {
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [API_KEY_SETTING, key],
        )?;
    }
    Ok(())
}

pub fn load_api_key(conn: &Connection) -> Result<Option<String>> {
    let key = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [API_KEY_SETTING],
            |r| r.get(0),
        )
        .optional()?;
    Ok(key)
}

// ── Reports ──

pub fn save_report(conn: &Connection, report: &AnalysisReport) -> Result<i64> {
    conn.execute(
        "INSERT INTO reports (page_title, page_url, document_type, confidence, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            report.page_title,
            report.page_url,
            report.document_type,
            report.confidence,
            report.body,
            report.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn latest_report(conn: &Connection) -> Result<Option<AnalysisReport>> {
    let report = conn
        .query_row(
            "SELECT page_title, page_url, document_type, confidence, body, created_at
             FROM reports ORDER BY created_at DESC, id DESC LIMIT 1",
            [],
            |row| {
                Ok(AnalysisReport {
                    page_title: row.get(0)?,
                    page_url: row.get(1)?,
                    document_type: row.get(2)?,
                    confidence: row.get(3)?,
                    body: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(report)
}
