//! The Change type: an atomic, invertible batch of operations

use super::error::ChangeError;
use super::extract::{extract, Affected, DocumentView};
use super::operation::Operation;
use super::path::PathKey;
use super::selection::Snapshot;
use super::serializer::OperationSerializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use uuid::Uuid;

/// Unique identifier for a change
pub type ChangeId = String;

/// Free-form metadata attached by the caller (author, reason, ...)
pub type ChangeInfo = Map<String, Value>;

/// Current version of the change wire record
pub const CHANGE_RECORD_VERSION: u32 = 1;

/// Source of change identifiers. Ids must never repeat within a process.
pub trait IdSource {
    fn next_id(&self) -> ChangeId;
}

/// Random v4 uuids
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> ChangeId {
        Uuid::new_v4().to_string()
    }
}

/// Monotonic ids with a fixed prefix, e.g. `session-1`, `session-2`
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> ChangeId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

/// Wire form of a change
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    pub id: ChangeId,
    pub timestamp: i64,
    #[serde(default)]
    pub info: ChangeInfo,
    #[serde(default)]
    pub before: Value,
    #[serde(default)]
    pub after: Value,
    pub ops: Vec<Value>,
}

fn default_version() -> u32 {
    CHANGE_RECORD_VERSION
}

/// An ordered batch of operations with before/after snapshots.
///
/// The affected-entity sets are derived once, after the change has been
/// applied to a document, and are never part of the wire format.
#[derive(Debug)]
pub struct Change {
    id: ChangeId,
    timestamp: i64,
    ops: Vec<Operation>,
    before: Snapshot,
    after: Snapshot,
    info: ChangeInfo,
    affected: OnceLock<Affected>,
    extracting: AtomicBool,
}

impl Change {
    /// Create a change from a batch of operations. `ops` is copied.
    pub fn new<I: IdSource + ?Sized>(
        ids: &I,
        ops: &[Operation],
        before: Option<Snapshot>,
        after: Option<Snapshot>,
        info: ChangeInfo,
    ) -> Self {
        Self::from_parts(
            ids.next_id(),
            chrono::Utc::now().timestamp_millis(),
            ops.to_vec(),
            before.unwrap_or_default(),
            after.unwrap_or_default(),
            info,
        )
    }

    fn from_parts(
        id: ChangeId,
        timestamp: i64,
        ops: Vec<Operation>,
        before: Snapshot,
        after: Snapshot,
        info: ChangeInfo,
    ) -> Self {
        Self {
            id,
            timestamp,
            ops,
            before,
            after,
            info,
            affected: OnceLock::new(),
            extracting: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation time in epoch milliseconds
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    pub fn before(&self) -> &Snapshot {
        &self.before
    }

    pub fn after(&self) -> &Snapshot {
        &self.after
    }

    pub fn info(&self) -> &ChangeInfo {
        &self.info
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// The change that undoes this one.
    ///
    /// Operations are inverted and reversed: op *k* may depend on structure
    /// created by op *k-1*, so the last one must be undone first.
    pub fn invert<I: IdSource + ?Sized>(&self, ids: &I) -> Change {
        let ops = self.ops.iter().rev().map(Operation::invert).collect();
        Self::from_parts(
            ids.next_id(),
            self.timestamp,
            ops,
            self.after.clone(),
            self.before.clone(),
            self.info.clone(),
        )
    }

    /// Derive created/deleted/updated sets from the applied operations.
    ///
    /// Must be called after the ops were applied to `view`. A repeated call
    /// returns the cached result; a call racing an in-flight extraction fails.
    pub fn extract(&self, view: &dyn DocumentView) -> Result<&Affected, ChangeError> {
        if let Some(affected) = self.affected.get() {
            return Ok(affected);
        }
        if self.extracting.swap(true, Ordering::AcqRel) {
            return Err(ChangeError::ExtractionReentry(format!(
                "change {} is already being extracted",
                self.id
            )));
        }
        let _guard = ExtractingGuard(&self.extracting);
        let computed = extract(&self.ops, view);
        Ok(self.affected.get_or_init(|| computed))
    }

    /// The derived sets, once extraction ran
    pub fn affected(&self) -> Option<&Affected> {
        self.affected.get()
    }

    pub fn is_extracted(&self) -> bool {
        self.affected.get().is_some()
    }

    fn require_affected(&self) -> Result<&Affected, ChangeError> {
        self.affected.get().ok_or_else(|| {
            ChangeError::ExtractionReentry(format!("change {} has not been extracted", self.id))
        })
    }

    /// Whether a path or canonical key was affected
    pub fn has_updated(&self, path: impl Into<PathKey>) -> Result<bool, ChangeError> {
        Ok(self.require_affected()?.has_updated(path))
    }

    pub fn has_deleted(&self, id: &str) -> Result<bool, ChangeError> {
        Ok(self.require_affected()?.has_deleted(id))
    }

    pub fn has_created(&self, id: &str) -> Result<bool, ChangeError> {
        Ok(self.require_affected()?.has_created(id))
    }

    pub fn to_record(&self) -> Result<ChangeRecord, ChangeError> {
        Ok(ChangeRecord {
            version: CHANGE_RECORD_VERSION,
            id: self.id.clone(),
            timestamp: self.timestamp,
            info: self.info.clone(),
            before: self.before.to_portable(),
            after: self.after.to_portable(),
            ops: OperationSerializer::new().serialize_all(&self.ops)?,
        })
    }

    pub fn from_record(record: ChangeRecord) -> Result<Self, ChangeError> {
        if record.version > CHANGE_RECORD_VERSION {
            return Err(ChangeError::UnsupportedVersion(record.version));
        }
        let ops = OperationSerializer::new().deserialize_all(&record.ops)?;
        Ok(Self::from_parts(
            record.id,
            record.timestamp,
            ops,
            Snapshot::from_portable(&record.before)?,
            Snapshot::from_portable(&record.after)?,
            record.info,
        ))
    }

    /// JSON bytes of the wire record
    pub fn serialize(&self) -> Result<Vec<u8>, ChangeError> {
        Ok(serde_json::to_vec(&self.to_record()?)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, ChangeError> {
        let record: ChangeRecord = serde_json::from_slice(bytes)?;
        Self::from_record(record)
    }

    /// Compact CBOR bytes of the same record
    pub fn to_cbor(&self) -> Result<Vec<u8>, ChangeError> {
        let mut buf = Vec::new();
        ciborium::into_writer(&self.to_record()?, &mut buf)
            .map_err(|e| ChangeError::Cbor(e.to_string()))?;
        Ok(buf)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, ChangeError> {
        let record: ChangeRecord =
            ciborium::from_reader(bytes).map_err(|e| ChangeError::Cbor(e.to_string()))?;
        Self::from_record(record)
    }

    /// Hex sha256 of the serialized operations, independent of id and time
    pub fn digest(&self) -> Result<String, ChangeError> {
        let ops = OperationSerializer::new().serialize_all(&self.ops)?;
        let bytes = serde_json::to_vec(&ops)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

/// Clears the in-flight flag even if a view panics mid-extraction
struct ExtractingGuard<'a>(&'a AtomicBool);

impl Drop for ExtractingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Clone for Change {
    /// Clones carry no derived sets; they are recomputed on demand
    fn clone(&self) -> Self {
        Self::from_parts(
            self.id.clone(),
            self.timestamp,
            self.ops.clone(),
            self.before.clone(),
            self.after.clone(),
            self.info.clone(),
        )
    }
}

impl PartialEq for Change {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.timestamp == other.timestamp
            && self.ops == other.ops
            && self.before == other.before
            && self.after == other.after
            && self.info == other.info
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "change {} ({} ops)", self.id, self.ops.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::diff::Diff;
    use crate::change::extract::NodeInfo;
    use crate::change::path::{NodeId, Path};
    use crate::change::selection::Selection;
    use serde_json::json;

    struct FlatView;

    impl DocumentView for FlatView {
        fn lookup(&self, id: &str) -> Option<NodeInfo> {
            Some(NodeInfo::text(id, "content"))
        }

        fn container_position(&self, _: &Path, _: &str) -> Option<usize> {
            None
        }

        fn container_children(&self, _: &Path) -> Option<Vec<NodeId>> {
            None
        }
    }

    fn sample(ids: &dyn IdSource) -> Change {
        let mut info = ChangeInfo::new();
        info.insert("author".to_string(), json!("ada"));
        Change::new(
            ids,
            &[
                Operation::create(json!({ "id": "p1", "type": "paragraph", "content": "hello" })),
                Operation::set(["p1", "content"], json!("hello"), json!("hello world")),
                Operation::update(["p1", "content"], Diff::insert_text(0, ">")),
            ],
            Some(Snapshot::new().with_selection(Selection::cursor(["p1", "content"], 0))),
            Some(Snapshot::new().with_selection(Selection::cursor(["p1", "content"], 12))),
            info,
        )
    }

    #[test]
    fn test_new_defaults() {
        let change = Change::new(&RandomIds, &[], None, None, ChangeInfo::new());
        assert!(change.is_empty());
        assert!(change.before().is_empty());
        assert!(change.after().is_empty());
        assert!(!change.is_extracted());
        assert!(Uuid::parse_str(change.id()).is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        let ids = SequentialIds::new("s");
        let a = Change::new(&ids, &[], None, None, ChangeInfo::new());
        let b = Change::new(&ids, &[], None, None, ChangeInfo::new());
        assert_eq!(a.id(), "s-1");
        assert_eq!(b.id(), "s-2");
        assert_ne!(a.invert(&ids).id(), a.id());
    }

    #[test]
    fn test_invert_reverses_and_swaps() {
        let ids = SequentialIds::new("s");
        let change = sample(&ids);
        let inverted = change.invert(&ids);

        assert_eq!(inverted.before(), change.after());
        assert_eq!(inverted.after(), change.before());
        assert_eq!(inverted.info(), change.info());
        assert_eq!(inverted.len(), 3);
        assert_eq!(inverted.ops()[0], change.ops()[2].invert());
        assert_eq!(inverted.ops()[2], change.ops()[0].invert());

        let twice = inverted.invert(&ids);
        assert_eq!(twice.ops(), change.ops());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let change = sample(&RandomIds);
        let bytes = change.serialize().unwrap();
        let restored = Change::deserialize(&bytes).unwrap();
        assert_eq!(restored, change);
        assert_eq!(restored.before().selection, change.before().selection);
        assert!(!restored.is_extracted());
    }

    #[test]
    fn test_cbor_roundtrip() {
        let change = sample(&RandomIds);
        let restored = Change::from_cbor(&change.to_cbor().unwrap()).unwrap();
        assert_eq!(restored, change);
    }

    #[test]
    fn test_derived_sets_not_serialized() {
        let change = sample(&RandomIds);
        change.extract(&FlatView).unwrap();
        let record: Value = serde_json::from_slice(&change.serialize().unwrap()).unwrap();
        assert!(record.get("updated").is_none());
        assert!(record.get("created").is_none());
        assert!(record.get("deleted").is_none());
    }

    #[test]
    fn test_unknown_op_kind_rejects_record() {
        let mut record = sample(&RandomIds).to_record().unwrap();
        record.ops.push(json!({ "type": "split", "path": ["p1"] }));
        assert!(matches!(
            Change::from_record(record),
            Err(ChangeError::UnsupportedOperationKind(_))
        ));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut record = sample(&RandomIds).to_record().unwrap();
        record.version = CHANGE_RECORD_VERSION + 1;
        assert!(matches!(
            Change::from_record(record),
            Err(ChangeError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_query_before_extraction_fails() {
        let change = sample(&RandomIds);
        assert!(matches!(
            change.has_updated("p1"),
            Err(ChangeError::ExtractionReentry(_))
        ));
        assert!(change.has_deleted("p1").is_err());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let change = sample(&RandomIds);
        let first = change.extract(&FlatView).unwrap().clone();
        let second = change.extract(&FlatView).unwrap();
        assert_eq!(&first, second);

        assert!(change.has_created("p1").unwrap());
        assert!(change.has_updated(&Path::property("p1", "content")).unwrap());
        assert!(change.has_updated("p1").unwrap());
        assert!(!change.has_deleted("p1").unwrap());
    }

    /// A graph that tries to extract the change it is being extracted for
    struct ReentrantView<'a> {
        change: &'a Change,
        reentry_failed: std::cell::Cell<Option<bool>>,
    }

    impl DocumentView for ReentrantView<'_> {
        fn lookup(&self, _: &str) -> Option<NodeInfo> {
            let failed = matches!(
                self.change.extract(self),
                Err(ChangeError::ExtractionReentry(_))
            );
            self.reentry_failed.set(Some(failed));
            None
        }

        fn container_position(&self, _: &Path, _: &str) -> Option<usize> {
            None
        }

        fn container_children(&self, _: &Path) -> Option<Vec<NodeId>> {
            None
        }
    }

    #[test]
    fn test_reentrant_extraction_fails() {
        let change = sample(&RandomIds);
        let view = ReentrantView {
            change: &change,
            reentry_failed: std::cell::Cell::new(None),
        };
        assert!(change.extract(&view).is_ok());
        assert_eq!(view.reentry_failed.get(), Some(true));
        assert!(change.is_extracted());
    }

    struct PanickingView;

    impl DocumentView for PanickingView {
        fn lookup(&self, id: &str) -> Option<NodeInfo> {
            panic!("graph lost node {}", id)
        }

        fn container_position(&self, _: &Path, _: &str) -> Option<usize> {
            None
        }

        fn container_children(&self, _: &Path) -> Option<Vec<NodeId>> {
            None
        }
    }

    #[test]
    fn test_extraction_recovers_after_view_panic() {
        let change = sample(&RandomIds);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = change.extract(&PanickingView);
        }));
        assert!(result.is_err());
        assert!(!change.is_extracted());

        assert!(change.extract(&FlatView).is_ok());
        assert!(change.has_created("p1").unwrap());
    }

    #[test]
    fn test_clone_drops_derived_sets() {
        let change = sample(&RandomIds);
        change.extract(&FlatView).unwrap();
        let copy = change.clone();
        assert_eq!(copy, change);
        assert!(!copy.is_extracted());
    }

    #[test]
    fn test_digest_ignores_identity() {
        let a = sample(&SequentialIds::new("a"));
        let b = sample(&SequentialIds::new("b"));
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert_eq!(a.digest().unwrap().len(), 64);
        assert_ne!(a.digest().unwrap(), a.invert(&RandomIds).digest().unwrap());
    }
}
