//! Subscription Store
//!
//! Maps a user id to the end of their paid subscription. The file-backed
//! store keeps the whole document as one JSON object:
//!
//! ```text
//! {
//!     "42": { "subscription_end": "2025-07-01T09:30:00Z" }
//! }
//! ```
//!
//! Expiry is advisory; nothing here revokes access.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::{Mutex, RwLock};

use crate::error::StoreError;

/// Whole persisted document
pub type SubscriptionMap = BTreeMap<i64, SubscriptionRecord>;

/// One user's subscription
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    #[serde(serialize_with = "ser_timestamp", deserialize_with = "de_timestamp")]
    pub subscription_end: DateTime<Utc>,
}

impl SubscriptionRecord {
    pub fn new(subscription_end: DateTime<Utc>) -> Self {
        Self { subscription_end }
    }

    /// Whether the subscription still runs at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.subscription_end
    }
}

fn ser_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// RFC 3339, or a naive ISO-8601 timestamp read as UTC (older data files).
fn de_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;

    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}

/// Subscription storage trait
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Read every record. Never fails: missing or unreadable data is empty.
    async fn load(&self) -> SubscriptionMap;

    /// Replace every record
    async fn save(&self, data: &SubscriptionMap) -> Result<(), StoreError>;

    /// Load, set one user's end date, save; serialized against other writers
    async fn set_subscription_end(
        &self,
        user_id: i64,
        subscription_end: DateTime<Utc>,
    ) -> Result<SubscriptionRecord, StoreError>;

    /// Look up one user
    async fn get(&self, user_id: i64) -> Option<SubscriptionRecord> {
        self.load().await.remove(&user_id)
    }
}

/// JSON document on local disk
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> SubscriptionMap {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return SubscriptionMap::new(),
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read subscription data"
                );
                return SubscriptionMap::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(e) => {
                let err = StoreError::Malformed(e.to_string());
                tracing::error!(
                    path = %self.path.display(),
                    error = %err,
                    "Ignoring subscription data"
                );
                SubscriptionMap::new()
            }
        }
    }

    /// Write to a sibling temp file, then rename over the target
    async fn write_document(&self, data: &SubscriptionMap) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        data.serialize(&mut ser).map_err(|e| StoreError::Io(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &buf).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(path = %self.path.display(), users = data.len(), "Saved subscription data");
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for JsonFileStore {
    async fn load(&self) -> SubscriptionMap {
        self.read_document().await
    }

    async fn save(&self, data: &SubscriptionMap) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_document(data).await.inspect_err(|e| {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to write subscription data"
            );
        })
    }

    async fn set_subscription_end(
        &self,
        user_id: i64,
        subscription_end: DateTime<Utc>,
    ) -> Result<SubscriptionRecord, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut data = self.read_document().await;
        let record = SubscriptionRecord::new(subscription_end);
        data.insert(user_id, record.clone());

        self.write_document(&data).await.inspect_err(|e| {
            tracing::error!(
                path = %self.path.display(),
                user_id,
                error = %e,
                "Failed to write subscription data"
            );
        })?;

        Ok(record)
    }
}

/// In-memory subscription store (for development)
#[derive(Default)]
pub struct MemorySubscriptionStore {
    data: RwLock<SubscriptionMap>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn load(&self) -> SubscriptionMap {
        self.data.read().await.clone()
    }

    async fn save(&self, data: &SubscriptionMap) -> Result<(), StoreError> {
        *self.data.write().await = data.clone();
        Ok(())
    }

    async fn set_subscription_end(
        &self,
        user_id: i64,
        subscription_end: DateTime<Utc>,
    ) -> Result<SubscriptionRecord, StoreError> {
        let record = SubscriptionRecord::new(subscription_end);
        self.data.write().await.insert(user_id, record.clone());
        Ok(record)
    }

    async fn get(&self, user_id: i64) -> Option<SubscriptionRecord> {
        self.data.read().await.get(&user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn store_in(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::new(dir.path().join("userpaid_data.json"))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(&dir).load().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut data = SubscriptionMap::new();
        let end = Utc.with_ymd_and_hms(2025, 7, 1, 9, 30, 0).unwrap();
        data.insert(42, SubscriptionRecord::new(end));
        data.insert(-1001, SubscriptionRecord::new(Utc::now()));

        store.save(&data).await.unwrap();
        let loaded = store.load().await;
        assert_eq!(loaded, data);

        // Saving what was loaded changes nothing
        store.save(&loaded).await.unwrap();
        assert_eq!(store.load().await, data);
    }

    #[tokio::test]
    async fn test_document_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let end = Utc.with_ymd_and_hms(2025, 7, 1, 9, 30, 0).unwrap();
        store.set_subscription_end(42, end).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["42"]["subscription_end"], "2025-07-01T09:30:00Z");
        assert!(raw.contains("\n    \"42\""));
    }

    #[tokio::test]
    async fn test_reads_naive_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"7": {"subscription_end": "2024-05-01T12:00:00.123456"}}"#,
        )
        .unwrap();

        let record = store.get(7).await.unwrap();
        assert_eq!(
            record.subscription_end,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::microseconds(123_456)
        );
    }

    #[tokio::test]
    async fn test_set_subscription_end_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let first = Utc::now();
        let renewal = first + Duration::days(30);

        store.set_subscription_end(5, first).await.unwrap();
        store.set_subscription_end(5, renewal).await.unwrap();

        let data = store.load().await;
        assert_eq!(data.len(), 1);
        assert_eq!(data[&5].subscription_end, renewal);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir));
        let end = Utc::now();

        let tasks: Vec<_> = (0..20)
            .map(|user_id| {
                let store = store.clone();
                tokio::spawn(async move { store.set_subscription_end(user_id, end).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.load().await.len(), 20);
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("missing").join("data.json"));
        let err = store.save(&SubscriptionMap::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        // A directory at the target path makes the rename fail
        std::fs::create_dir(store.path()).unwrap();
        std::fs::write(store.path().join("keep"), "").unwrap();

        let err = store.save(&SubscriptionMap::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(!dir.path().join("userpaid_data.json.tmp").exists());
        assert!(store.path().is_dir());
    }

    #[test]
    fn test_is_active() {
        let now = Utc::now();
        assert!(SubscriptionRecord::new(now + Duration::days(1)).is_active(now));
        assert!(!SubscriptionRecord::new(now - Duration::seconds(1)).is_active(now));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySubscriptionStore::new();
        let end = Utc::now();
        store.set_subscription_end(1, end).await.unwrap();
        assert_eq!(store.get(1).await, Some(SubscriptionRecord::new(end)));
        assert!(store.get(2).await.is_none());
    }
}
