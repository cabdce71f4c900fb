//! Formation (academic program) directory read model.
//!
//! The directory is populated out-of-band by an external sync job; the core
//! only reads it when resolving publication targets. See
//! `sync/directory_sync.rs` for the consumer seam.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a formation record.
pub type FormationId = Uuid;

/// One academic program/track a publication can target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formation {
    pub formation_uuid: FormationId,
    /// Directory code, unique, same shape as template codes.
    pub code: String,
    pub title: String,
    /// Inactive formations are invisible to the publication gate.
    pub is_active: bool,
    /// Epoch ms of the last directory sync touching this record.
    pub synced_at: i64,
}
