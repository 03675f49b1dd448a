//! Schema bootstrap and bulk loading of the JSON dataset
//!
//! The dataset is a list of videos, each with its hourly snapshots nested
//! under `snapshots`. It may be a bare array or wrapped in `{"videos": [...]}`
//! / `{"data": [...]}`.

use chrono::{DateTime, NaiveDateTime};
use duckdb::{params, Connection};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse dataset JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Dataset is not a list of videos")]
    NotAList,
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id VARCHAR PRIMARY KEY,
    creator_id VARCHAR NOT NULL,
    video_created_at TIMESTAMP NOT NULL,
    views_count BIGINT DEFAULT 0,
    likes_count BIGINT DEFAULT 0,
    comments_count BIGINT DEFAULT 0,
    reports_count BIGINT DEFAULT 0,
    created_at TIMESTAMP,
    updated_at TIMESTAMP
);

CREATE TABLE IF NOT EXISTS video_snapshots (
    id VARCHAR PRIMARY KEY,
    video_id VARCHAR NOT NULL,
    views_count BIGINT DEFAULT 0,
    likes_count BIGINT DEFAULT 0,
    comments_count BIGINT DEFAULT 0,
    reports_count BIGINT DEFAULT 0,
    delta_views_count BIGINT DEFAULT 0,
    delta_likes_count BIGINT DEFAULT 0,
    delta_comments_count BIGINT DEFAULT 0,
    delta_reports_count BIGINT DEFAULT 0,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP
);

CREATE OR REPLACE MACRO "date"(ts) AS CAST(ts AS DATE);
"#;

/// Create both tables (if missing) and the `date()` helper used by filters
pub fn ensure_schema(conn: &Connection) -> duckdb::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

#[derive(Debug, Deserialize)]
struct VideoRecord {
    id: Option<String>,
    creator_id: Option<String>,
    video_created_at: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
    views_count: Option<i64>,
    likes_count: Option<i64>,
    comments_count: Option<i64>,
    reports_count: Option<i64>,
    #[serde(default)]
    snapshots: Vec<SnapshotRecord>,
}

#[derive(Debug, Deserialize)]
struct SnapshotRecord {
    id: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
    views_count: Option<i64>,
    likes_count: Option<i64>,
    comments_count: Option<i64>,
    reports_count: Option<i64>,
    delta_views_count: Option<i64>,
    delta_likes_count: Option<i64>,
    delta_comments_count: Option<i64>,
    delta_reports_count: Option<i64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub videos: usize,
    pub snapshots: usize,
    pub skipped_videos: usize,
    pub skipped_snapshots: usize,
}

/// Parse an ISO timestamp; offsets are converted to UTC, naive values taken as UTC
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn sql_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn optional_timestamp(raw: Option<&str>) -> Option<String> {
    raw.and_then(parse_timestamp).map(sql_timestamp)
}

fn unwrap_dataset(value: serde_json::Value) -> Result<Vec<serde_json::Value>, SeedError> {
    match value {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Object(mut map) => {
            for key in ["videos", "data"] {
                if let Some(inner) = map.remove(key) {
                    return match inner {
                        serde_json::Value::Array(items) => Ok(items),
                        _ => Err(SeedError::NotAList),
                    };
                }
            }
            Ok(vec![serde_json::Value::Object(map)])
        }
        _ => Err(SeedError::NotAList),
    }
}

/// Load a dataset file
pub fn seed_from_path<P: AsRef<Path>>(conn: &Connection, path: P) -> Result<SeedReport, SeedError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    info!(path = %path.as_ref().display(), bytes = contents.len(), "loading dataset");
    seed_from_json(conn, &contents)
}

/// Load a dataset into the store inside one transaction
///
/// Existing videos/snapshots with the same id are replaced. Records missing
/// required fields or carrying unparseable timestamps are skipped and counted.
pub fn seed_from_json(conn: &Connection, json: &str) -> Result<SeedReport, SeedError> {
    let items = unwrap_dataset(serde_json::from_str(json)?)?;
    ensure_schema(conn)?;

    conn.execute_batch("BEGIN TRANSACTION")?;
    match insert_all(conn, items) {
        Ok(report) => {
            conn.execute_batch("COMMIT")?;
            info!(
                videos = report.videos,
                snapshots = report.snapshots,
                skipped_videos = report.skipped_videos,
                skipped_snapshots = report.skipped_snapshots,
                "dataset loaded"
            );
            Ok(report)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

fn insert_all(conn: &Connection, items: Vec<serde_json::Value>) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    let mut video_stmt = conn.prepare(
        "INSERT OR REPLACE INTO videos (id, creator_id, video_created_at, views_count, likes_count, \
         comments_count, reports_count, created_at, updated_at) \
         VALUES (?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
    )?;
    let mut snapshot_stmt = conn.prepare(
        "INSERT OR REPLACE INTO video_snapshots (id, video_id, views_count, likes_count, comments_count, \
         reports_count, delta_views_count, delta_likes_count, delta_comments_count, delta_reports_count, \
         created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
    )?;

    let total = items.len();
    for (idx, item) in items.into_iter().enumerate() {
        let video: VideoRecord = match serde_json::from_value(item) {
            Ok(video) => video,
            Err(e) => {
                warn!(index = idx, error = %e, "skipping malformed video record");
                report.skipped_videos += 1;
                continue;
            }
        };

        let (Some(id), Some(creator_id)) = (video.id.as_deref(), video.creator_id.as_deref()) else {
            warn!(index = idx, "skipping video without id or creator_id");
            report.skipped_videos += 1;
            continue;
        };
        let Some(published) = video.video_created_at.as_deref().and_then(parse_timestamp) else {
            warn!(index = idx, video_id = id, "skipping video with bad video_created_at");
            report.skipped_videos += 1;
            continue;
        };

        video_stmt.execute(params![
            id,
            creator_id,
            sql_timestamp(published),
            video.views_count.unwrap_or(0),
            video.likes_count.unwrap_or(0),
            video.comments_count.unwrap_or(0),
            video.reports_count.unwrap_or(0),
            optional_timestamp(video.created_at.as_deref()),
            optional_timestamp(video.updated_at.as_deref()),
        ])?;
        report.videos += 1;

        for snapshot in &video.snapshots {
            let Some(measured) = snapshot.created_at.as_deref().and_then(parse_timestamp) else {
                warn!(video_id = id, "skipping snapshot with bad created_at");
                report.skipped_snapshots += 1;
                continue;
            };
            let snapshot_id = snapshot
                .id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            snapshot_stmt.execute(params![
                snapshot_id,
                id,
                snapshot.views_count.unwrap_or(0),
                snapshot.likes_count.unwrap_or(0),
                snapshot.comments_count.unwrap_or(0),
                snapshot.reports_count.unwrap_or(0),
                snapshot.delta_views_count.unwrap_or(0),
                snapshot.delta_likes_count.unwrap_or(0),
                snapshot.delta_comments_count.unwrap_or(0),
                snapshot.delta_reports_count.unwrap_or(0),
                sql_timestamp(measured),
                optional_timestamp(snapshot.updated_at.as_deref()),
            ])?;
            report.snapshots += 1;
        }

        if (idx + 1) % 100 == 0 {
            info!(processed = idx + 1, total, "seeding progress");
        }
    }

    Ok(report)
}

/// Row counts of (videos, video_snapshots)
pub fn count_records(conn: &Connection) -> duckdb::Result<(i64, i64)> {
    let videos: i64 = conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))?;
    let snapshots: i64 = conn.query_row("SELECT COUNT(*) FROM video_snapshots", [], |row| row.get(0))?;
    Ok((videos, snapshots))
}
