// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Every write performed inside a session transaction is recorded as a
// Change. On commit the changes are validated against the shared state and
// replayed in order; on abort they are discarded with the workspace.
//
// ============================================================================

use crate::core::{Document, ObjectId};

/// A single write recorded by a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// A new document
    Insert {
        collection: String,
        id: ObjectId,
        document: Document,
    },

    /// Full post-image of an updated document
    Update {
        collection: String,
        id: ObjectId,
        base_version: u64,
        document: Document,
    },

    /// A removed document
    Delete {
        collection: String,
        id: ObjectId,
        base_version: u64,
    },
}

impl Change {
    /// Collection affected by this change
    pub fn collection(&self) -> &str {
        match self {
            Change::Insert { collection, .. } => collection,
            Change::Update { collection, .. } => collection,
            Change::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> ObjectId {
        match self {
            Change::Insert { id, .. } | Change::Update { id, .. } | Change::Delete { id, .. } => *id,
        }
    }

    /// Version the document had before this change, `None` if it did not exist
    pub fn base_version(&self) -> Option<u64> {
        match self {
            Change::Insert { .. } => None,
            Change::Update { base_version, .. } | Change::Delete { base_version, .. } => {
                Some(*base_version)
            }
        }
    }
}
