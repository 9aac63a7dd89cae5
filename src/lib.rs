//! Line bookmark tracking for mutable text documents: markers stay anchored
//! to their line across edits, collapse when edits merge bookmarked lines,
//! navigate cyclically, and persist as line-number lists in a metadata
//! store.

pub mod bookmarks;
pub mod document;
pub mod metadata;
pub mod workspace;

pub use bookmarks::{BOOKMARKS_ATTRIBUTE, BookmarkTracker};
pub use document::{AnchorId, AnchorKind, Document, Gravity, Position, Range};
pub use metadata::{MetadataError, MetadataStore};
pub use workspace::Workspace;
