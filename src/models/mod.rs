pub mod archive;
pub mod assignment;

pub use archive::{ArchiveEntry, ArchiveReason};
pub use assignment::{
    ActivityType, Assignment, AssignmentStatus, DateMode, LedgerEntry, ObservedAssignment,
    Settings, UpdateSettingsRequest,
};
