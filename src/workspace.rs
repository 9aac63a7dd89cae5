use log::debug;

use crate::bookmarks::{BOOKMARKS_ATTRIBUTE, BookmarkTracker};
use crate::document::{Document, Position, Range};
use crate::metadata::{MetadataError, MetadataStore};

struct DocumentEntry {
    document: Document,
    tracker: Option<BookmarkTracker>,
}

/// Open documents plus their bookmark trackers. Each document gets its own
/// tracker when tracking is attached; edits routed through the workspace
/// reach the tracker in the order they reach the document.
pub struct Workspace {
    documents: Vec<DocumentEntry>,
    current: usize,
    metadata: MetadataStore,
}

impl Workspace {
    pub fn new(metadata: MetadataStore) -> Self {
        Self {
            documents: Vec::new(),
            current: 0,
            metadata,
        }
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_document(&self) -> &Document {
        &self.documents[self.current].document
    }

    pub fn current_document_mut(&mut self) -> &mut Document {
        &mut self.documents[self.current].document
    }

    pub fn open_file(&mut self, filename: std::path::PathBuf) -> Result<usize, std::io::Error> {
        let document = Document::from_file(filename)?;
        Ok(self.add_document(document))
    }

    /// Add a document, attach bookmark tracking, and restore any persisted
    /// bookmarks. The new document becomes current.
    pub fn add_document(&mut self, document: Document) -> usize {
        self.documents.push(DocumentEntry {
            document,
            tracker: Some(BookmarkTracker::new()),
        });
        let index = self.documents.len() - 1;
        self.current = index;
        self.document_loaded(index);
        index
    }

    /// Close a document, discarding its markers without persisting them.
    pub fn close_document(&mut self, index: usize) {
        self.detach(index);
        self.documents.remove(index);
        if self.current >= self.documents.len() && self.current > 0 {
            self.current = self.documents.len() - 1;
        }
    }

    /// Enable bookmark tracking for a document. No-op if already enabled.
    pub fn attach(&mut self, index: usize) {
        let entry = &mut self.documents[index];
        if entry.tracker.is_none() {
            entry.tracker = Some(BookmarkTracker::new());
            debug!("bookmark tracking attached: {:?}", entry.document.filename);
        }
    }

    /// Disable bookmark tracking for a document, destroying its markers.
    pub fn detach(&mut self, index: usize) {
        let entry = &mut self.documents[index];
        if let Some(mut tracker) = entry.tracker.take() {
            tracker.clear(&mut entry.document);
            debug!("bookmark tracking detached: {:?}", entry.document.filename);
        }
    }

    pub fn is_attached(&self, index: usize) -> bool {
        self.documents[index].tracker.is_some()
    }

    /// Host "document loaded" event: restore bookmarks from the metadata
    /// store, filtered to lines that exist.
    pub fn document_loaded(&mut self, index: usize) {
        let entry = &mut self.documents[index];
        let Some(tracker) = entry.tracker.as_mut() else {
            return;
        };
        let Some(filename) = entry.document.filename.clone() else {
            return;
        };
        if let Some(serialized) = self.metadata.get(&filename, BOOKMARKS_ATTRIBUTE) {
            tracker.load_from_persisted(&mut entry.document, serialized);
            debug!("restored {} bookmarks for {filename:?}", tracker.len());
        }
    }

    /// Host "document saved" event: persist the bookmark list, clearing the
    /// attribute when no bookmarks remain.
    pub fn document_saved(&mut self, index: usize) -> Result<(), MetadataError> {
        let entry = &self.documents[index];
        let Some(tracker) = entry.tracker.as_ref() else {
            return Ok(());
        };
        let Some(filename) = entry.document.filename.clone() else {
            return Ok(());
        };
        let value = tracker.serialize();
        self.metadata
            .set(&filename, BOOKMARKS_ATTRIBUTE, value.as_deref());
        self.metadata.save()?;
        debug!("saved bookmarks for {filename:?}: {value:?}");
        Ok(())
    }

    /// Save the current document's contents and then its bookmark metadata.
    pub fn save_current(&mut self) -> Result<(), MetadataError> {
        self.documents[self.current].document.save()?;
        self.document_saved(self.current)
    }

    pub fn bookmarked_lines(&self) -> Vec<usize> {
        self.documents[self.current]
            .tracker
            .as_ref()
            .map(|tracker| tracker.lines().collect())
            .unwrap_or_default()
    }

    pub fn add_bookmark_at(&mut self, index: Option<usize>, at: Option<Position>) {
        let entry = &mut self.documents[index.unwrap_or(self.current)];
        if let Some(tracker) = entry.tracker.as_mut() {
            tracker.add_bookmark(&mut entry.document, at);
        }
    }

    pub fn remove_bookmark_at(&mut self, index: Option<usize>, at: Option<Position>) {
        let entry = &mut self.documents[index.unwrap_or(self.current)];
        if let Some(tracker) = entry.tracker.as_mut() {
            tracker.remove_bookmark(&mut entry.document, at);
        }
    }

    pub fn toggle_bookmark_at(&mut self, index: Option<usize>, at: Option<Position>) {
        let entry = &mut self.documents[index.unwrap_or(self.current)];
        if let Some(tracker) = entry.tracker.as_mut() {
            tracker.toggle_bookmark(&mut entry.document, at);
        }
    }

    /// Jump to the next bookmark, moving the cursor to the start of the
    /// returned full-line selection.
    pub fn goto_next_bookmark(
        &mut self,
        index: Option<usize>,
        at: Option<Position>,
    ) -> Option<Range> {
        let entry = &mut self.documents[index.unwrap_or(self.current)];
        let tracker = entry.tracker.as_ref()?;
        let selection = tracker.goto_next(&entry.document, at)?;
        entry.document.set_cursor(selection.start);
        Some(selection)
    }

    pub fn goto_previous_bookmark(
        &mut self,
        index: Option<usize>,
        at: Option<Position>,
    ) -> Option<Range> {
        let entry = &mut self.documents[index.unwrap_or(self.current)];
        let tracker = entry.tracker.as_ref()?;
        let selection = tracker.goto_previous(&entry.document, at)?;
        entry.document.set_cursor(selection.start);
        Some(selection)
    }

    pub fn begin_edit_group(&mut self) {
        if let Some(tracker) = self.documents[self.current].tracker.as_mut() {
            tracker.handle_edit_begin();
        }
    }

    pub fn end_edit_group(&mut self) {
        let entry = &mut self.documents[self.current];
        if let Some(tracker) = entry.tracker.as_mut() {
            tracker.handle_edit_end(&mut entry.document);
        }
    }

    /// Insert into the current document, notifying the tracker first.
    pub fn insert(&mut self, at: Position, text: &str) {
        let entry = &mut self.documents[self.current];
        if let Some(tracker) = entry.tracker.as_mut() {
            tracker.handle_insert_before(&mut entry.document, at, text);
        }
        entry.document.insert(at, text);
    }

    /// Delete from the current document, notifying the tracker afterwards.
    pub fn delete(&mut self, range: Range) {
        let entry = &mut self.documents[self.current];
        entry.document.delete(range);
        if let Some(tracker) = entry.tracker.as_mut() {
            tracker.handle_delete_range(&mut entry.document, range.start, range.end);
        }
    }
}
