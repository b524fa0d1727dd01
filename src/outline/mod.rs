//! The project outline: a tree of project items kept in sync with the
//! on-disk shape of the project.
//!
//! Every edit marks the touched item and all of its ancestors dirty. Saving
//! asks the root for an updated [`FileWrapper`](crate::filesystem::FileWrapper),
//! which rebuilds only the dirty branches and clears their dirty flags.

mod item;
mod item_tag;
mod materialize;
mod tree;

pub use item::{ItemId, OutlineItem};
pub use item_tag::{
    DATA_GROUP_ID, EXECUTABLE_GROUP_ID, EXTRA_SOURCE_GROUP_ID, ItemTag, PACKAGE_GROUP_ID,
    TOPLEVEL_GROUP_IDS, is_toplevel_group_id, is_valid_identifier,
};
pub use tree::{OutlineError, ProjectOutline, Walk};
