//! Publication domain model.
//!
//! A publication binds one Published template to one formation for a bounded
//! answering window. Publications are immutable once created.

use crate::model::formation::FormationId;
use crate::model::template::TemplateId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a publication.
pub type PublicationId = Uuid;

/// Time-bounded, formation-scoped instance of a template made answerable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub publication_uuid: PublicationId,
    pub template_uuid: TemplateId,
    pub formation_uuid: FormationId,
    /// Window start, epoch ms, inclusive.
    pub window_start: i64,
    /// Window end, epoch ms, inclusive.
    pub window_end: i64,
    /// Epoch ms creation timestamp. Tie-break key when windows overlap.
    pub created_at: i64,
}

impl Publication {
    /// Whether the answering window covers `now` (inclusive on both ends).
    pub fn is_active(&self, now_epoch_ms: i64) -> bool {
        self.window_start <= now_epoch_ms && now_epoch_ms <= self.window_end
    }
}
