// SPDX-License-Identifier: GPL-3.0-only

//! Asset directory service
//!
//! Validates assignments, persists them with last-write-wins semantics and
//! answers "most recent assignments" queries.
//!
//! A recent listing reads at most [`directory::SCAN_CAP`] entities from the
//! store, sorts that batch by `assignedAt` descending and returns the first
//! `max`. With more records than the cap, the result is the top of the
//! store's first batch, not of the whole partition.

pub mod record;

pub use record::{AssetRecord, AssignmentInput};

use crate::constants::{directory, fields};
use crate::errors::{DirectoryError, ValidationError};
use crate::store::RecordStore;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::{StreamExt, TryStreamExt};
use record::{check_asset_no, trimmed};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source of the current server time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Format a timestamp the way records store it
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Clamp a requested listing size to `[1, MAX_RECENT]`, defaulting when absent
pub fn clamp_max(max: Option<i64>) -> usize {
    max.unwrap_or(directory::DEFAULT_RECENT)
        .clamp(1, directory::MAX_RECENT) as usize
}

/// Parse a raw `max` query value from its leading integer
///
/// Trailing garbage is ignored (`"10abc"` is 10); a value with no leading
/// digits reads as the default.
pub fn parse_max(raw: Option<&str>) -> usize {
    clamp_max(raw.and_then(leading_integer))
}

fn leading_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    // Only overflow can fail here
    let magnitude = rest[..digits].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Upsert and query operations over the asset partition
#[derive(Clone)]
pub struct AssetDirectoryService {
    store: Arc<dyn RecordStore>,
    clock: Clock,
}

impl std::fmt::Debug for AssetDirectoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetDirectoryService")
            .field("store", &self.store.name())
            .finish()
    }
}

impl AssetDirectoryService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_clock(store, Arc::new(Utc::now))
    }

    /// Create a service with an injected clock
    pub fn with_clock(store: Arc<dyn RecordStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Validate and persist an assignment, replacing any previous record
    /// with the same asset number
    pub async fn upsert(&self, input: AssignmentInput) -> Result<AssetRecord, DirectoryError> {
        let asset_no = trimmed(input.asset_no.as_deref());
        let dept = trimmed(input.dept.as_deref());
        let assigned_to = trimmed(input.assigned_to.as_deref());

        let (Some(asset_no), Some(dept), Some(assigned_to)) = (asset_no, dept, assigned_to) else {
            let missing: Vec<&'static str> = [
                (fields::ASSET_NO, &input.asset_no),
                (fields::DEPT, &input.dept),
                (fields::ASSIGNED_TO, &input.assigned_to),
            ]
            .into_iter()
            .filter(|(_, value)| trimmed(value.as_deref()).is_none())
            .map(|(name, _)| name)
            .collect();
            debug!(?missing, "Rejected assignment with missing fields");
            return Err(ValidationError::MissingFields(missing).into());
        };

        check_asset_no(&asset_no)?;
        // Stored as given; ordering is only meaningful for consistently formatted values
        let supplied_at = trimmed(input.assigned_at.as_deref());

        let now = format_timestamp((self.clock)());
        let record = AssetRecord {
            partition_key: directory::PARTITION_KEY.to_string(),
            row_key: asset_no.clone(),
            asset_no,
            dept,
            assigned_to,
            assigned_at: supplied_at.unwrap_or_else(|| now.clone()),
            updated_at: now,
        };

        self.store.upsert_replace(record.to_entity()).await?;

        info!(
            asset_no = %record.asset_no,
            dept = %record.dept,
            assigned_to = %record.assigned_to,
            store = self.store.name(),
            "Saved asset assignment"
        );
        Ok(record)
    }

    /// Most recent assignments by `assignedAt`, newest first
    pub async fn list_recent(&self, max: Option<i64>) -> Result<Vec<AssetRecord>, DirectoryError> {
        let max = clamp_max(max);

        let entities: Vec<_> = self
            .store
            .scan(directory::PARTITION_KEY)
            .take(directory::SCAN_CAP)
            .try_collect()
            .await?;

        if entities.len() == directory::SCAN_CAP {
            warn!(
                cap = directory::SCAN_CAP,
                "Recent listing hit the scan cap; older entities were not considered"
            );
        }

        let mut records: Vec<AssetRecord> = entities.iter().map(AssetRecord::from_entity).collect();
        // Stable sort keeps store order among equal timestamps
        records.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        records.truncate(max);

        debug!(
            scanned = entities.len(),
            returned = records.len(),
            "Listed recent assignments"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryRecordStore, TableEntity};
    use chrono::TimeZone;

    fn fixed_clock(at: DateTime<Utc>) -> Clock {
        Arc::new(move || at)
    }

    fn service() -> (Arc<MemoryRecordStore>, AssetDirectoryService) {
        let store = Arc::new(MemoryRecordStore::new());
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let service = AssetDirectoryService::with_clock(store.clone(), fixed_clock(at));
        (store, service)
    }

    #[test]
    fn test_clamp_max() {
        assert_eq!(clamp_max(None), 20);
        assert_eq!(clamp_max(Some(0)), 1);
        assert_eq!(clamp_max(Some(-5)), 1);
        assert_eq!(clamp_max(Some(50)), 50);
        assert_eq!(clamp_max(Some(1000)), 100);
    }

    #[test]
    fn test_parse_max() {
        assert_eq!(parse_max(None), 20);
        assert_eq!(parse_max(Some("abc")), 20);
        assert_eq!(parse_max(Some(" 7 ")), 7);
        assert_eq!(parse_max(Some("250")), 100);
        assert_eq!(parse_max(Some("10abc")), 10);
        assert_eq!(parse_max(Some("3.9")), 3);
        assert_eq!(parse_max(Some("-4")), 1);
        assert_eq!(parse_max(Some("+5")), 5);
        assert_eq!(parse_max(Some("")), 20);
        assert_eq!(parse_max(Some("-")), 20);
        assert_eq!(parse_max(Some("99999999999999999999999")), 100);
    }

    #[tokio::test]
    async fn test_upsert_trims_and_stamps() {
        let (store, service) = service();
        let saved = service
            .upsert(AssignmentInput::new("  A1 ", " AR", "Jo  "))
            .await
            .unwrap();

        assert_eq!(saved.partition_key, "assets");
        assert_eq!(saved.row_key, "A1");
        assert_eq!(saved.asset_no, "A1");
        assert_eq!(saved.dept, "AR");
        assert_eq!(saved.assigned_to, "Jo");
        assert_eq!(saved.assigned_at, "2024-05-01T12:00:00.000Z");
        assert_eq!(saved.updated_at, saved.assigned_at);
        assert_eq!(
            AssetRecord::from_entity(&store.get("assets", "A1").unwrap()),
            saved
        );
    }

    #[tokio::test]
    async fn test_upsert_keeps_supplied_assigned_at() {
        let (_, service) = service();
        let saved = service
            .upsert(AssignmentInput::new("A1", "AR", "Jo").assigned_at("2024-01-15T09:30:00Z"))
            .await
            .unwrap();
        assert_eq!(saved.assigned_at, "2024-01-15T09:30:00Z");
        assert_eq!(saved.updated_at, "2024-05-01T12:00:00.000Z");
    }

    #[tokio::test]
    async fn test_supplied_assigned_at_is_not_reformatted() {
        let (store, service) = service();
        for (asset, at) in [
            ("A1", "2024-03-01"),
            ("A2", "2024-03-01T10:00:00"),
            ("A3", " 2024-06-01T12:00:00+02:00 "),
        ] {
            let saved = service
                .upsert(AssignmentInput::new(asset, "AR", "Jo").assigned_at(at))
                .await
                .unwrap();
            assert_eq!(saved.assigned_at, at.trim());
            let stored = store.get("assets", asset).unwrap();
            assert_eq!(AssetRecord::from_entity(&stored).assigned_at, at.trim());
        }
    }

    #[tokio::test]
    async fn test_blank_assigned_at_defaults_to_now() {
        let (_, service) = service();
        let saved = service
            .upsert(AssignmentInput::new("A1", "AR", "Jo").assigned_at("   "))
            .await
            .unwrap();
        assert_eq!(saved.assigned_at, saved.updated_at);
    }

    #[tokio::test]
    async fn test_missing_fields_named_in_order() {
        let (store, service) = service();
        let err = service
            .upsert(AssignmentInput {
                asset_no: Some("   ".into()),
                dept: Some("AR".into()),
                assigned_to: None,
                assigned_at: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "assetNo, assignedTo required");
        assert_eq!(err.status_code(), 400);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_asset_no_does_not_write() {
        let (store, service) = service();
        let bad_key = service
            .upsert(AssignmentInput::new("A/1", "AR", "Jo"))
            .await
            .unwrap_err();
        assert_eq!(bad_key.status_code(), 400);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_list_recent_tolerates_foreign_entities() {
        let (store, service) = service();
        store
            .upsert_replace(TableEntity::new("assets", "X9").with("dept", "IT"))
            .await
            .unwrap();
        store
            .upsert_replace(TableEntity::new("other", "Y1"))
            .await
            .unwrap();

        let items = service.list_recent(None).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].asset_no, "X9");
        assert_eq!(items[0].assigned_at, "");
    }
}
