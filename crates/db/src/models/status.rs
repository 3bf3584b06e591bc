//! Status enum mapping to the `batch_statuses` lookup table.
//!
//! Discriminants match the seed rows in the initial migration.

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Lifecycle of a variation batch.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Pending = 1,
    Running = 2,
    Completed = 3,
    Failed = 4,
}

impl BatchStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }
}

impl From<BatchStatus> for StatusId {
    fn from(value: BatchStatus) -> Self {
        value as StatusId
    }
}
