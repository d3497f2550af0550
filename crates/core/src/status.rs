//! Record visibility status shared by catalog and promotion records.

use serde::{Deserialize, Serialize};

/// Lifecycle flag for soft-deletable records.
///
/// Listings filter explicitly with [`RecordStatus::is_visible`]; nothing is
/// hidden implicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
    Deleted,
}

impl RecordStatus {
    /// Shown in public listings.
    pub fn is_visible(self) -> bool {
        matches!(self, RecordStatus::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Inactive => "inactive",
            RecordStatus::Deleted => "deleted",
        }
    }
}
