use crate::codec::RecordCodec;
use crate::config::{CorruptionPolicy, StoreConfig};
use crate::record::ConversationRecord;
use async_trait::async_trait;
use confide_core::{ConfideError, ConfideResult, DecodeError, SessionKey};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// How a record came back from [`ConversationStateStore::load`].
#[derive(Debug)]
pub enum LoadOutcome {
    /// No unit exists for the key; a new empty record.
    Fresh(ConversationRecord),
    /// The unit decoded cleanly.
    Restored(ConversationRecord),
    /// The unit exists but could not be decoded; a new empty record replaces it.
    Recovered {
        /// The empty replacement.
        record: ConversationRecord,
        /// Why the stored unit was rejected.
        reason: DecodeError,
    },
}

impl LoadOutcome {
    /// The record, whichever way it was obtained.
    pub fn into_record(self) -> ConversationRecord {
        match self {
            Self::Fresh(record) | Self::Restored(record) => record,
            Self::Recovered { record, .. } => record,
        }
    }

    /// Borrowing form of [`LoadOutcome::into_record`].
    pub fn record(&self) -> &ConversationRecord {
        match self {
            Self::Fresh(record) | Self::Restored(record) => record,
            Self::Recovered { record, .. } => record,
        }
    }

    /// `true` when history existed but was discarded.
    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::Recovered { .. })
    }
}

/// A unit a scan skipped, because it is unreadable or because another unit
/// already supplies its conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    /// Path of the skipped unit.
    pub unit: PathBuf,
    /// Human-readable cause.
    pub reason: String,
}

/// Everything found in the store by a full scan.
#[derive(Debug, Default)]
pub struct CorpusScan {
    /// One record per key, ordered by key.
    pub records: Vec<ConversationRecord>,
    /// Skipped units, ordered by path.
    pub anomalies: Vec<Anomaly>,
}

/// Durable storage for conversation records, one unit per key.
#[async_trait]
pub trait ConversationStateStore: Send + Sync {
    /// Reads the unit for `key`, reporting whether it was fresh, restored or recovered.
    async fn load(&self, key: &SessionKey) -> ConfideResult<LoadOutcome>;

    /// Replaces the unit for `record.key` with the full record.
    async fn save(&self, record: &ConversationRecord) -> ConfideResult<()>;

    /// Whether a unit exists for `key`. Does not decode it.
    async fn exists(&self, key: &SessionKey) -> ConfideResult<bool>;

    /// Reads every unit in the store.
    async fn scan(&self) -> ConfideResult<CorpusScan>;

    /// The stored record for `key`, or a new empty one.
    async fn load_or_create(&self, key: &SessionKey) -> ConfideResult<ConversationRecord> {
        self.load(key).await.map(LoadOutcome::into_record)
    }
}

/// File-based conversation store: one JSON file per key in a single directory.
///
/// Saves go through a temporary file that is flushed to disk and then renamed
/// over the unit, so a crash mid-save leaves the previous version intact.
pub struct FileConversationStore {
    dir: PathBuf,
    policy: CorruptionPolicy,
}

impl FileConversationStore {
    /// Opens a store in `dir`, creating the directory if needed.
    pub async fn new(dir: PathBuf) -> ConfideResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            policy: CorruptionPolicy::default(),
        })
    }

    /// Opens the store described by `config`.
    pub async fn from_config(config: &StoreConfig) -> ConfideResult<Self> {
        Ok(Self::new(config.data_dir.clone())
            .await?
            .with_policy(config.on_corrupt))
    }

    /// Sets how undecodable units are handled on load.
    pub fn with_policy(mut self, policy: CorruptionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Directory holding the units.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the durable unit for `key`.
    pub fn unit_path(&self, key: &SessionKey) -> PathBuf {
        self.dir.join(key.unit_name())
    }

    /// Name used by the earlier chat-history writer: `{participant}_{conversation}.json`.
    fn legacy_unit_path(&self, key: &SessionKey) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.json",
            key.participant_id(),
            key.conversation_id()
        ))
    }

    fn temp_path(&self, key: &SessionKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}.tmp", key.unit_name(), Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl ConversationStateStore for FileConversationStore {
    async fn load(&self, key: &SessionKey) -> ConfideResult<LoadOutcome> {
        let canonical = self.unit_path(key);
        let (path, bytes, legacy) = match read_unit(&canonical).await? {
            Some(bytes) => (canonical, bytes, false),
            None => {
                let legacy = self.legacy_unit_path(key);
                match read_unit(&legacy).await? {
                    Some(bytes) => (legacy, bytes, true),
                    None => {
                        debug!(key = %key, "no stored conversation, starting fresh");
                        return Ok(LoadOutcome::Fresh(ConversationRecord::new(key.clone())));
                    }
                }
            }
        };

        let decoded = match RecordCodec::decode(&bytes) {
            Ok(record) if record.key == *key => Ok(record),
            // Legacy names are ambiguous: `a_b_c.json` may hold `a_b/c` rather than `a/b_c`.
            Ok(record) if legacy => {
                debug!(
                    key = %key,
                    unit = %path.display(),
                    holds = %record.key,
                    "legacy unit belongs to another conversation"
                );
                return Ok(LoadOutcome::Fresh(ConversationRecord::new(key.clone())));
            }
            Ok(record) => Err(DecodeError::InvalidKey(format!(
                "unit for {key} holds conversation {}",
                record.key
            ))),
            Err(e) => Err(e),
        };

        match decoded {
            Ok(record) => {
                debug!(key = %key, turns = record.turn_count(), "conversation restored");
                Ok(LoadOutcome::Restored(record))
            }
            Err(reason) => match self.policy {
                CorruptionPolicy::Recover => {
                    warn!(
                        key = %key,
                        unit = %path.display(),
                        error = %reason,
                        "stored conversation is unreadable, starting fresh"
                    );
                    Ok(LoadOutcome::Recovered {
                        record: ConversationRecord::new(key.clone()),
                        reason,
                    })
                }
                CorruptionPolicy::Fail => Err(reason.into()),
            },
        }
    }

    async fn save(&self, record: &ConversationRecord) -> ConfideResult<()> {
        let bytes = RecordCodec::encode(record)?;
        let path = self.unit_path(&record.key);
        let temp = self.temp_path(&record.key);

        let written = match write_synced(&temp, &bytes).await {
            Ok(()) => tokio::fs::rename(&temp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(source) = written {
            if let Err(e) = tokio::fs::remove_file(&temp).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!(temp = %temp.display(), error = %e, "failed to remove temporary unit");
                }
            }
            warn!(key = %record.key, error = %source, "conversation save failed");
            return Err(ConfideError::WriteFailure { path, source });
        }

        sync_dir(&self.dir).await;
        debug!(
            key = %record.key,
            turns = record.turn_count(),
            assessed = record.has_assessment(),
            "conversation saved"
        );
        Ok(())
    }

    async fn exists(&self, key: &SessionKey) -> ConfideResult<bool> {
        if tokio::fs::try_exists(self.unit_path(key)).await? {
            return Ok(true);
        }
        Ok(tokio::fs::try_exists(self.legacy_unit_path(key)).await?)
    }

    async fn scan(&self) -> ConfideResult<CorpusScan> {
        let mut scan = CorpusScan::default();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(scan),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".json") || !entry.file_type().await?.is_file() {
                continue;
            }

            let decoded = match tokio::fs::read(&path).await {
                Ok(bytes) => RecordCodec::decode(&bytes).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match decoded {
                Ok(record) => match SessionKey::from_unit_name(name) {
                    Some(named) if named != record.key => scan.anomalies.push(Anomaly {
                        unit: path,
                        reason: format!("unit named for {named} holds conversation {}", record.key),
                    }),
                    named => found.push(ScannedUnit {
                        canonical: named.is_some(),
                        unit: path,
                        record,
                    }),
                },
                Err(reason) => {
                    debug!(unit = %path.display(), error = %reason, "skipping unreadable unit");
                    scan.anomalies.push(Anomaly { unit: path, reason });
                }
            }
        }

        // One record per key; the canonical unit shadows legacy copies.
        found.sort_by(|a, b| {
            a.record
                .key
                .cmp(&b.record.key)
                .then(b.canonical.cmp(&a.canonical))
                .then_with(|| a.unit.cmp(&b.unit))
        });
        let mut kept: Option<(SessionKey, PathBuf)> = None;
        for unit in found {
            let shadowed_by = kept
                .as_ref()
                .filter(|(key, _)| *key == unit.record.key)
                .map(|(_, path)| path.clone());
            match shadowed_by {
                Some(path) => scan.anomalies.push(Anomaly {
                    reason: format!(
                        "conversation {} is superseded by {}",
                        unit.record.key,
                        path.display()
                    ),
                    unit: unit.unit,
                }),
                None => {
                    kept = Some((unit.record.key.clone(), unit.unit));
                    scan.records.push(unit.record);
                }
            }
        }

        scan.anomalies.sort_by(|a, b| a.unit.cmp(&b.unit));
        Ok(scan)
    }
}

struct ScannedUnit {
    canonical: bool,
    unit: PathBuf,
    record: ConversationRecord,
}

async fn read_unit(path: &Path) -> ConfideResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

// Makes the rename itself durable. Not every platform can open a directory.
async fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        let synced = match tokio::fs::File::open(dir).await {
            Ok(handle) => handle.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = synced {
            debug!(dir = %dir.display(), error = %e, "directory sync skipped");
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use confide_core::AssessmentRecord;
    use tempfile::TempDir;

    async fn temp_store() -> (FileConversationStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = FileConversationStore::new(tmp.path().join("chats"))
            .await
            .unwrap();
        (store, tmp)
    }

    fn key(p: &str, c: &str) -> SessionKey {
        SessionKey::new(p, c).unwrap()
    }

    #[tokio::test]
    async fn test_load_missing_is_fresh() {
        let (store, _tmp) = temp_store().await;
        let outcome = store.load(&key("p1", "c1")).await.unwrap();
        assert!(matches!(outcome, LoadOutcome::Fresh(_)));
        assert!(outcome.record().transcript.is_empty());
        assert!(!store.exists(&key("p1", "c1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_leaves_no_temporary_files() {
        let (store, _tmp) = temp_store().await;
        let mut record = ConversationRecord::new(key("p1", "c1"));
        record.push_participant("hello");
        store.save(&record).await.unwrap();
        store.save(&record).await.unwrap();

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(store.dir()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["p1.c1.json".to_string()]);
    }

    #[tokio::test]
    async fn test_unit_holding_other_key_is_recovered() {
        let (store, _tmp) = temp_store().await;
        let other = ConversationRecord::new(key("p2", "c2"));
        tokio::fs::write(
            store.unit_path(&key("p1", "c1")),
            RecordCodec::encode(&other).unwrap(),
        )
        .await
        .unwrap();

        let outcome = store.load(&key("p1", "c1")).await.unwrap();
        assert!(outcome.is_recovered());
        assert_eq!(outcome.record().key, key("p1", "c1"));

        let scan = store.scan().await.unwrap();
        assert!(scan.records.is_empty());
        assert_eq!(scan.anomalies.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_policy_surfaces_decode_error() {
        let (store, _tmp) = temp_store().await;
        let store = store.with_policy(CorruptionPolicy::Fail);
        tokio::fs::write(store.unit_path(&key("p1", "c1")), b"{not json")
            .await
            .unwrap();

        let err = store.load_or_create(&key("p1", "c1")).await.unwrap_err();
        assert!(matches!(err, ConfideError::Decode(_)));
    }

    #[tokio::test]
    async fn test_scan_ignores_temporary_and_foreign_files() {
        let (store, _tmp) = temp_store().await;
        let record = ConversationRecord::new(key("p1", "c1"));
        store.save(&record).await.unwrap();
        tokio::fs::write(store.dir().join("p1.c1.json.abc.tmp"), b"partial")
            .await
            .unwrap();
        tokio::fs::write(store.dir().join("README.txt"), b"notes")
            .await
            .unwrap();
        tokio::fs::create_dir(store.dir().join("archive.json"))
            .await
            .unwrap();

        let scan = store.scan().await.unwrap();
        assert_eq!(scan.records, vec![record]);
        assert!(scan.anomalies.is_empty());
    }

    fn legacy_unit(p: &str, c: &str, turns: &[&str]) -> String {
        let messages: Vec<serde_json::Value> = turns
            .iter()
            .map(|t| serde_json::json!({"role": "user", "content": t}))
            .collect();
        serde_json::json!({
            "user_id": p,
            "thread_id": c,
            "timestamp": "2024-05-01T10:15:30",
            "messages": messages,
            "diagnosis": {}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_load_falls_back_to_legacy_unit() {
        let (store, _tmp) = temp_store().await;
        tokio::fs::write(store.dir().join("p1_c1.json"), legacy_unit("p1", "c1", &["hello"]))
            .await
            .unwrap();

        assert!(store.exists(&key("p1", "c1")).await.unwrap());
        let outcome = store.load(&key("p1", "c1")).await.unwrap();
        assert!(matches!(outcome, LoadOutcome::Restored(_)));
        assert_eq!(outcome.record().transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_unit_of_another_key_is_not_loaded() {
        let (store, _tmp) = temp_store().await;
        // `a_b_c.json` is the legacy name of both a/b_c and a_b/c.
        tokio::fs::write(store.dir().join("a_b_c.json"), legacy_unit("a_b", "c", &["hi"]))
            .await
            .unwrap();

        let outcome = store.load(&key("a", "b_c")).await.unwrap();
        assert!(matches!(outcome, LoadOutcome::Fresh(_)));
        let outcome = store.load(&key("a_b", "c")).await.unwrap();
        assert!(matches!(outcome, LoadOutcome::Restored(_)));
    }

    #[tokio::test]
    async fn test_canonical_unit_shadows_legacy_copy_in_scan() {
        let (store, _tmp) = temp_store().await;
        tokio::fs::write(store.dir().join("p1_c1.json"), legacy_unit("p1", "c1", &["hello"]))
            .await
            .unwrap();
        let mut record = store.load_or_create(&key("p1", "c1")).await.unwrap();
        record.push_agent("welcome back");
        store.save(&record).await.unwrap();

        let scan = store.scan().await.unwrap();
        assert_eq!(scan.records, vec![record]);
        assert_eq!(scan.anomalies.len(), 1);
        assert_eq!(scan.anomalies[0].unit, store.dir().join("p1_c1.json"));
        assert!(scan.anomalies[0].reason.contains("superseded by"));
    }

    #[tokio::test]
    async fn test_scan_missing_directory_is_empty() {
        let (store, tmp) = temp_store().await;
        drop(store);
        let store = FileConversationStore {
            dir: tmp.path().join("never-created"),
            policy: CorruptionPolicy::Recover,
        };
        let scan = store.scan().await.unwrap();
        assert!(scan.records.is_empty());
        assert!(scan.anomalies.is_empty());
    }

    #[tokio::test]
    async fn test_save_into_missing_directory_is_write_failure() {
        let (store, tmp) = temp_store().await;
        let mut record = ConversationRecord::new(key("p1", "c1"));
        record.assessment = Some(AssessmentRecord::new("5", "", ""));
        store.save(&record).await.unwrap();
        let before = tokio::fs::read(store.unit_path(&record.key)).await.unwrap();

        let broken = FileConversationStore {
            dir: tmp.path().join("gone"),
            policy: CorruptionPolicy::Recover,
        };
        let err = broken.save(&record).await.unwrap_err();
        assert!(err.is_write_failure());

        // The healthy store's unit is untouched.
        let after = tokio::fs::read(store.unit_path(&record.key)).await.unwrap();
        assert_eq!(before, after);
    }
}
