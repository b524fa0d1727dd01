//! On-disk shaped containers for project content.
//!
//! A [`FileWrapper`] is either a regular file or an ordered directory of
//! shared entries. It can be read from and written to disk and serialized
//! into a compact snapshot.

mod disk;
mod snapshot;
mod wrapper;

pub use disk::{DiskError, WriteSummary, read_from_disk, write_to_disk};
pub use snapshot::SnapshotError;
pub use wrapper::{FileWrapper, FileWrapperError};
