use std::time::Duration;

use rusqlite::params;
use tracing::debug;

use crate::database::pool::{ConnectionPool, PoolConfig};
use crate::error::PipelineResult;

/// One analysed frame. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub timestamp: Duration,
    pub description: String,
    /// File the frame was read from, when analysed in batch mode.
    pub source: Option<String>,
}

impl FrameRecord {
    pub fn new(timestamp: Duration, description: impl Into<String>) -> Self {
        Self {
            timestamp,
            description: description.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Seconds since start, in the shortest decimal form ("0", "1.5").
    pub fn seconds_label(&self) -> String {
        let millis = self.timestamp.as_millis() as f64;
        format!("{}", millis / 1000.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaseSensitivity {
    Sensitive,
    #[default]
    Insensitive,
}

/// Append-only store of frame descriptions, keyed by video and timestamp.
pub struct AnalysisStore {
    pool: ConnectionPool,
    case: CaseSensitivity,
}

impl AnalysisStore {
    pub fn new(pool: ConnectionPool, case: CaseSensitivity) -> Self {
        Self { pool, case }
    }

    pub fn open(config: PoolConfig, case: CaseSensitivity) -> Self {
        Self::new(ConnectionPool::new(config), case)
    }

    pub fn append(&self, video_id: &str, timestamp: Duration, description: &str) -> PipelineResult<i64> {
        self.append_record(video_id, &FrameRecord::new(timestamp, description))
    }

    /// Inserts one record as a single statement; returns its row id.
    pub fn append_record(&self, video_id: &str, record: &FrameRecord) -> PipelineResult<i64> {
        let conn = self.pool.acquire()?;
        let frame_ms = i64::try_from(record.timestamp.as_millis()).unwrap_or(i64::MAX);
        conn.execute(
            "INSERT INTO frame_analysis (video_id, frame_ms, description, source_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![video_id, frame_ms, record.description, record.source],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Stored frame {} at {}ms for video {}", id, frame_ms, video_id);
        Ok(id)
    }

    /// All records for `video_id`, oldest timestamp first. Equal timestamps
    /// keep their insertion order.
    pub fn list_all(&self, video_id: &str) -> PipelineResult<Vec<FrameRecord>> {
        let conn = self.pool.acquire()?;
        let mut stmt = conn.prepare_cached(
            "SELECT frame_ms, description, source_name FROM frame_analysis
             WHERE video_id = ?1
             ORDER BY frame_ms ASC, id ASC",
        )?;

        let records = stmt
            .query_map(params![video_id], |row| {
                let frame_ms: i64 = row.get(0)?;
                Ok(FrameRecord {
                    timestamp: Duration::from_millis(u64::try_from(frame_ms).unwrap_or(0)),
                    description: row.get(1)?,
                    source: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Number of records whose description contains `needle`.
    ///
    /// Case folding in insensitive mode is ASCII-only (SQLite `lower`).
    pub fn count_matching(&self, video_id: &str, needle: &str) -> PipelineResult<u64> {
        let sql = match self.case {
            CaseSensitivity::Sensitive => {
                "SELECT COUNT(*) FROM frame_analysis
                 WHERE video_id = ?1 AND instr(description, ?2) > 0"
            }
            CaseSensitivity::Insensitive => {
                "SELECT COUNT(*) FROM frame_analysis
                 WHERE video_id = ?1 AND instr(lower(description), lower(?2)) > 0"
            }
        };

        let conn = self.pool.acquire()?;
        let count: i64 = conn.query_row(sql, params![video_id, needle], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store(case: CaseSensitivity) -> (TempDir, AnalysisStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::open(PoolConfig::new(dir.path().join("frames.db")), case);
        (dir, store)
    }

    #[test]
    fn test_list_all_orders_by_timestamp_not_arrival() -> anyhow::Result<()> {
        let (_dir, store) = store(CaseSensitivity::Insensitive);
        for secs in [3, 0, 4, 1, 2] {
            store.append("v1", Duration::from_secs(secs), &format!("desc{secs}"))?;
        }

        let records = store.list_all("v1")?;
        assert_eq!(records.len(), 5);
        let stamps: Vec<u64> = records.iter().map(|r| r.timestamp.as_secs()).collect();
        assert_eq!(stamps, vec![0, 1, 2, 3, 4]);
        assert_eq!(records[2].description, "desc2");
        Ok(())
    }

    #[test]
    fn test_equal_timestamps_are_kept_in_insertion_order() -> anyhow::Result<()> {
        let (_dir, store) = store(CaseSensitivity::Insensitive);
        store.append("v1", Duration::from_secs(1), "first")?;
        store.append("v1", Duration::from_secs(1), "first")?;
        store.append("v1", Duration::from_secs(1), "second")?;

        let descriptions: Vec<_> = store.list_all("v1")?.into_iter().map(|r| r.description).collect();
        assert_eq!(descriptions, vec!["first", "first", "second"]);
        Ok(())
    }

    #[test]
    fn test_list_all_empty_is_not_an_error() -> anyhow::Result<()> {
        let (_dir, store) = store(CaseSensitivity::Insensitive);
        store.append("other", Duration::ZERO, "elsewhere")?;
        assert!(store.list_all("v1")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_source_name_round_trips() -> anyhow::Result<()> {
        let (_dir, store) = store(CaseSensitivity::Insensitive);
        let record = FrameRecord::new(Duration::from_millis(1500), "a bench").with_source("frame_0004.jpg");
        store.append_record("v1", &record)?;

        assert_eq!(store.list_all("v1")?, vec![record]);
        Ok(())
    }

    #[test]
    fn test_count_matching_case_insensitive() -> anyhow::Result<()> {
        let (_dir, store) = store(CaseSensitivity::Insensitive);
        store.append("v1", Duration::ZERO, "A Cat sits on the mat")?;
        store.append("v1", Duration::from_secs(1), "a dog barks")?;
        store.append("v1", Duration::from_secs(2), "concatenated text")?;

        assert_eq!(store.count_matching("v1", "cat")?, 2);
        assert_eq!(store.count_matching("v1", "DOG")?, 1);
        assert_eq!(store.count_matching("v1", "bird")?, 0);
        assert_eq!(store.count_matching("v2", "cat")?, 0);
        Ok(())
    }

    #[test]
    fn test_count_matching_case_sensitive() -> anyhow::Result<()> {
        let (_dir, store) = store(CaseSensitivity::Sensitive);
        store.append("v1", Duration::ZERO, "A Cat sits on the mat")?;
        store.append("v1", Duration::from_secs(1), "a dog barks")?;

        assert_eq!(store.count_matching("v1", "cat")?, 0);
        assert_eq!(store.count_matching("v1", "Cat")?, 1);
        assert_eq!(store.count_matching("v1", "DOG")?, 0);
        Ok(())
    }

    #[test]
    fn test_like_wildcards_are_literal() -> anyhow::Result<()> {
        let (_dir, store) = store(CaseSensitivity::Insensitive);
        store.append("v1", Duration::ZERO, "100% sure")?;
        store.append("v1", Duration::from_secs(1), "snake_case sign")?;

        assert_eq!(store.count_matching("v1", "%")?, 1);
        assert_eq!(store.count_matching("v1", "e_c")?, 1);
        assert_eq!(store.count_matching("v1", "e_x")?, 0);
        Ok(())
    }

    #[test]
    fn test_records_cannot_be_rewritten() -> anyhow::Result<()> {
        let (_dir, store) = store(CaseSensitivity::Insensitive);
        store.append("v1", Duration::ZERO, "original")?;

        let conn = store.pool.acquire()?;
        assert!(conn.execute("UPDATE frame_analysis SET description = 'changed'", []).is_err());
        assert!(conn.execute("DELETE FROM frame_analysis", []).is_err());
        drop(conn);

        assert_eq!(store.list_all("v1")?[0].description, "original");
        Ok(())
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() -> anyhow::Result<()> {
        let (_dir, store) = store(CaseSensitivity::Insensitive);
        store.list_all("v1")?;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..4u64)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25u64 {
                        let secs = i * 4 + worker;
                        store
                            .append("v1", Duration::from_secs(secs), &format!("worker {worker} frame {i}"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let records = store.list_all("v1")?;
        assert_eq!(records.len(), 100);
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(records.iter().all(|r| r.description.starts_with("worker ")));
        Ok(())
    }

    #[test]
    fn test_unreachable_store_reports_store_unavailable() {
        let store = AnalysisStore::open(PoolConfig::new("/no/such/dir/frames.db"), CaseSensitivity::Insensitive);

        assert!(matches!(store.list_all("v1"), Err(PipelineError::StoreUnavailable(_))));
        assert!(matches!(store.count_matching("v1", "x"), Err(PipelineError::StoreUnavailable(_))));
        assert!(matches!(
            store.append("v1", Duration::ZERO, "x"),
            Err(PipelineError::StoreUnavailable(_))
        ));
    }
}
