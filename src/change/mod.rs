//! Change/operation model
//!
//! Documents are mutated exclusively through four primitive operations
//! (create, delete, set, update), each carrying enough data to compute its
//! own inverse. Operations are batched into a [`Change`], the unit of undo,
//! persistence and synchronization. After a change is applied, its affected
//! nodes and paths are derived once via [`Change::extract`].

mod change;
mod diff;
mod error;
mod extract;
mod operation;
mod path;
mod selection;
mod serializer;

pub use change::{
    Change, ChangeId, ChangeInfo, ChangeRecord, IdSource, RandomIds, SequentialIds,
    CHANGE_RECORD_VERSION,
};
pub use diff::{Diff, DiffError};
pub use error::ChangeError;
pub use extract::{extract, Affected, AnnotationKind, DocumentView, NodeInfo};
pub use operation::{NodeSnapshot, Operation, OperationKind};
pub use path::{NodeId, Path, PathKey, KEY_SEPARATOR};
pub use selection::{Selection, Snapshot, SELECTION_FIELD};
pub use serializer::OperationSerializer;
