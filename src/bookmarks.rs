use std::collections::BTreeMap;

use crate::document::{AnchorId, AnchorKind, Document, Gravity, Position, Range};

/// Metadata attribute under which a document's bookmarked lines persist,
/// as a comma-separated list of 0-based line numbers.
pub const BOOKMARKS_ATTRIBUTE: &str = "metadata::linemark-bookmarks";

/// Pairs a bookmark with a secondary anchor recorded when text is inserted
/// at its line start inside an edit group. The secondary anchor has right
/// gravity, so it follows the original line content while the bookmark's
/// left-gravity anchor stays behind; the two are compared when the group
/// ends.
struct InsertTracker {
    bookmark: AnchorId,
    shadow: AnchorId,
}

/// Tracks the bookmarked lines of one document. Anchor positions live in
/// the document; this keeps marker identity plus a line-keyed index that is
/// updated on every edit notification.
pub struct BookmarkTracker {
    by_line: BTreeMap<usize, AnchorId>,
    trackers: Vec<InsertTracker>,
    group_depth: u32,
}

impl BookmarkTracker {
    pub fn new() -> Self {
        Self {
            by_line: BTreeMap::new(),
            trackers: Vec::new(),
            group_depth: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.by_line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_line.is_empty()
    }

    pub fn has_bookmark(&self, line: usize) -> bool {
        self.by_line.contains_key(&line)
    }

    /// Bookmarked lines in ascending order.
    pub fn lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_line.keys().copied()
    }

    /// Add a bookmark on the line of `at`, or on the cursor line if no
    /// position is given. No-op if the line already carries one.
    pub fn add_bookmark(&mut self, document: &mut Document, at: Option<Position>) {
        let line = self.resolve_line(document, at);
        if self.by_line.contains_key(&line) {
            return;
        }
        let id = document.create_anchor(Position::new(line, 0), Gravity::Left, AnchorKind::Bookmark);
        self.by_line.insert(line, id);
    }

    /// Remove the bookmark on the resolved line, if any.
    pub fn remove_bookmark(&mut self, document: &mut Document, at: Option<Position>) {
        let line = self.resolve_line(document, at);
        if let Some(id) = self.by_line.remove(&line) {
            document.delete_anchor(id);
        }
    }

    pub fn toggle_bookmark(&mut self, document: &mut Document, at: Option<Position>) {
        let line = self.resolve_line(document, at);
        if self.by_line.contains_key(&line) {
            self.remove_bookmark(document, Some(Position::new(line, 0)));
        } else {
            self.add_bookmark(document, Some(Position::new(line, 0)));
        }
    }

    /// Find the next bookmarked line strictly after the resolved line,
    /// wrapping to the document start once. Returns a selection spanning the
    /// full content of the found line, or `None` if there are no bookmarks.
    pub fn goto_next(&self, document: &Document, from: Option<Position>) -> Option<Range> {
        let line = self.resolve_line(document, from);
        let found = self
            .by_line
            .range(line + 1..)
            .next()
            .or_else(|| self.by_line.iter().next())
            .map(|(&line, _)| line)?;
        Some(Self::line_selection(document, found))
    }

    /// Backward counterpart of `goto_next`, wrapping to the document end.
    pub fn goto_previous(&self, document: &Document, from: Option<Position>) -> Option<Range> {
        let line = self.resolve_line(document, from);
        let found = self
            .by_line
            .range(..line)
            .next_back()
            .or_else(|| self.by_line.iter().next_back())
            .map(|(&line, _)| line)?;
        Some(Self::line_selection(document, found))
    }

    pub fn handle_edit_begin(&mut self) {
        self.group_depth += 1;
    }

    /// Close one level of edit group. When the outermost level closes, every
    /// bookmark whose shadow anchor ended up on a different line is moved to
    /// the start of the shadow's line, then all shadows are discarded.
    pub fn handle_edit_end(&mut self, document: &mut Document) {
        if self.group_depth > 0 {
            self.group_depth -= 1;
        }
        if self.group_depth > 0 {
            return;
        }

        for tracker in std::mem::take(&mut self.trackers) {
            // A bookmark can have been destroyed by coalescing while its
            // shadow was still recorded; only live pairs are compared.
            if let (Some(current), Some(tracked)) = (
                document.anchor_position(tracker.bookmark),
                document.anchor_position(tracker.shadow),
            ) {
                if current.line != tracked.line {
                    if self.by_line.get(&current.line) == Some(&tracker.bookmark) {
                        self.by_line.remove(&current.line);
                    }
                    document.move_anchor(tracker.bookmark, Position::new(tracked.line, 0));
                    self.coalesce_line(document, tracked.line);
                }
            }
            document.delete_anchor(tracker.shadow);
        }

        debug_assert!(self.index_matches(document));
    }

    /// Called immediately before `text` is inserted at `at`. Records a
    /// shadow anchor when the insertion lands exactly on a bookmark's
    /// position inside an open edit group (first insertion wins per
    /// bookmark), and shifts the line index for any inserted newlines.
    pub fn handle_insert_before(&mut self, document: &mut Document, at: Position, text: &str) {
        if self.group_depth > 0 && at.column == 0 {
            if let Some(&bookmark) = self.by_line.get(&at.line) {
                let exactly_at = document.anchor_position(bookmark) == Some(at);
                let tracked = self.trackers.iter().any(|t| t.bookmark == bookmark);
                if exactly_at && !tracked {
                    let shadow = document.create_anchor(at, Gravity::Right, AnchorKind::Plain);
                    self.trackers.push(InsertTracker { bookmark, shadow });
                }
            }
        }

        let added = text.matches('\n').count();
        if added > 0 && !self.by_line.is_empty() {
            let tail = self.by_line.split_off(&at.line);
            for (line, id) in tail {
                let follows = line > at.line
                    || document
                        .anchor_position(id)
                        .is_some_and(|position| position.column > at.column);
                let target = if follows { line + added } else { line };
                self.by_line.insert(target, id);
            }
        }

        if self.group_depth == 0 {
            debug_assert!(self.trackers.is_empty());
        }
    }

    /// Called after a deletion of the (pre-deletion) range `start..end`.
    /// Lines that collapsed together can leave several bookmarks on the
    /// surviving line; all but the first in document order are destroyed.
    pub fn handle_delete_range(&mut self, document: &mut Document, start: Position, end: Position) {
        let removed = end.line.saturating_sub(start.line);
        if removed > 0 {
            let tail = self.by_line.split_off(&(start.line + 1));
            for (line, id) in tail {
                let target = if line <= end.line {
                    start.line
                } else {
                    line - removed
                };
                self.by_line.insert(target, id);
            }
        }
        self.coalesce_line(document, start.line);

        if self.group_depth == 0 {
            debug_assert!(self.index_matches(document));
        }
    }

    /// Recreate bookmarks from a persisted comma-separated line list.
    /// Out-of-range and already-bookmarked lines are skipped; malformed
    /// tokens parse as their leading digits, defaulting to 0, to stay
    /// compatible with metadata written by `atoi`-based readers.
    pub fn load_from_persisted(&mut self, document: &mut Document, serialized: &str) {
        let line_count = document.line_count() as i64;
        for token in serialized.split(',') {
            let value = parse_leading_int(token);
            if value < 0 || value >= line_count {
                continue;
            }
            let line = value as usize;
            if self.by_line.contains_key(&line) {
                continue;
            }
            let id =
                document.create_anchor(Position::new(line, 0), Gravity::Left, AnchorKind::Bookmark);
            self.by_line.insert(line, id);
        }
    }

    /// Comma-separated ascending line list, or `None` when there are no
    /// bookmarks (the attribute is cleared rather than stored empty).
    pub fn serialize(&self) -> Option<String> {
        if self.by_line.is_empty() {
            return None;
        }
        Some(
            self.by_line
                .keys()
                .map(|line| line.to_string())
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    /// Destroy all bookmarks and shadow anchors, e.g. when tracking is
    /// disabled for the document. Nothing is persisted.
    pub fn clear(&mut self, document: &mut Document) {
        for (_, id) in std::mem::take(&mut self.by_line) {
            document.delete_anchor(id);
        }
        for tracker in std::mem::take(&mut self.trackers) {
            document.delete_anchor(tracker.shadow);
        }
        self.group_depth = 0;
    }

    fn resolve_line(&self, document: &Document, at: Option<Position>) -> usize {
        at.map_or(document.cursor_line, |position| position.line)
    }

    fn line_selection(document: &Document, line: usize) -> Range {
        Range::new(
            Position::new(line, 0),
            Position::new(line, document.line_len(line)),
        )
    }

    /// Keep the first bookmark in document order on `line`, destroy the
    /// rest, and resync the index entry for that line.
    fn coalesce_line(&mut self, document: &mut Document, line: usize) {
        let at_line = document.bookmark_anchors_at_line(line);
        match at_line.split_first() {
            Some((&keep, extra)) => {
                for &id in extra {
                    document.delete_anchor(id);
                }
                self.by_line.insert(line, keep);
            }
            None => {
                self.by_line.remove(&line);
            }
        }
    }

    /// Quiescent-time invariant: the index agrees with the document's
    /// bookmark anchors and no line carries more than one bookmark.
    fn index_matches(&self, document: &Document) -> bool {
        let mut derived: BTreeMap<usize, AnchorId> = BTreeMap::new();
        for (id, position) in document.bookmark_anchors() {
            if derived.insert(position.line, id).is_some() {
                return false;
            }
        }
        derived == self.by_line
    }
}

impl Default for BookmarkTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// `atoi`-style parse: optional sign and leading digits, 0 when none.
fn parse_leading_int(token: &str) -> i64 {
    let s = token.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|v| sign * v).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_with_lines(count: usize) -> Document {
        let content: Vec<String> = (0..count).map(|i| format!("line {i}")).collect();
        Document::from_string(&content.join("\n"))
    }

    fn tracker_with_bookmarks(document: &mut Document, lines: &[usize]) -> BookmarkTracker {
        let mut tracker = BookmarkTracker::new();
        for &line in lines {
            tracker.add_bookmark(document, Some(Position::new(line, 0)));
        }
        tracker
    }

    /// Drives one insertion the way a host routes it: pre-hook, then edit.
    fn insert(tracker: &mut BookmarkTracker, document: &mut Document, at: Position, text: &str) {
        tracker.handle_insert_before(document, at, text);
        document.insert(at, text);
    }

    /// Drives one deletion: edit, then post-hook with the pre-edit range.
    fn delete(tracker: &mut BookmarkTracker, document: &mut Document, range: Range) {
        document.delete(range);
        tracker.handle_delete_range(document, range.start, range.end);
    }

    #[test]
    fn test_add_bookmark_is_idempotent() {
        let mut document = document_with_lines(5);
        let mut tracker = tracker_with_bookmarks(&mut document, &[1, 3]);
        tracker.add_bookmark(&mut document, Some(Position::new(1, 0)));
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_add_bookmark_defaults_to_cursor_line() {
        let mut document = document_with_lines(5);
        document.set_cursor(Position::new(2, 3));
        let mut tracker = BookmarkTracker::new();
        tracker.add_bookmark(&mut document, None);
        assert!(tracker.has_bookmark(2));
    }

    #[test]
    fn test_remove_missing_bookmark_is_noop() {
        let mut document = document_with_lines(5);
        let mut tracker = tracker_with_bookmarks(&mut document, &[1]);
        tracker.remove_bookmark(&mut document, Some(Position::new(3, 0)));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_toggle_twice_restores_prior_state() {
        let mut document = document_with_lines(5);
        let mut tracker = tracker_with_bookmarks(&mut document, &[1, 3]);

        tracker.toggle_bookmark(&mut document, Some(Position::new(2, 0)));
        tracker.toggle_bookmark(&mut document, Some(Position::new(2, 0)));
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![1, 3]);

        tracker.toggle_bookmark(&mut document, Some(Position::new(1, 0)));
        tracker.toggle_bookmark(&mut document, Some(Position::new(1, 0)));
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_goto_next_selects_whole_line() {
        let mut document = document_with_lines(5);
        let tracker = tracker_with_bookmarks(&mut document, &[1, 3]);
        let selection = tracker
            .goto_next(&document, Some(Position::new(0, 0)))
            .unwrap();
        assert_eq!(selection.start, Position::new(1, 0));
        assert_eq!(selection.end, Position::new(1, document.line_len(1)));
    }

    #[test]
    fn test_goto_next_wraps_around() {
        let mut document = document_with_lines(5);
        let tracker = tracker_with_bookmarks(&mut document, &[1, 3]);
        // From line 3 the forward search hits the document end and restarts
        // at the top.
        let selection = tracker
            .goto_next(&document, Some(Position::new(3, 4)))
            .unwrap();
        assert_eq!(selection.start.line, 1);
    }

    #[test]
    fn test_goto_previous_wraps_around() {
        let mut document = document_with_lines(5);
        let tracker = tracker_with_bookmarks(&mut document, &[1, 3]);
        let selection = tracker
            .goto_previous(&document, Some(Position::new(1, 0)))
            .unwrap();
        assert_eq!(selection.start.line, 3);
    }

    #[test]
    fn test_goto_with_no_bookmarks_returns_none() {
        let mut document = document_with_lines(5);
        let tracker = BookmarkTracker::new();
        assert!(tracker.goto_next(&document, None).is_none());
        assert!(tracker.goto_previous(&document, None).is_none());
        // Sole bookmark on the cursor line is still reachable via the wrap.
        let tracker = tracker_with_bookmarks(&mut document, &[2]);
        let selection = tracker
            .goto_next(&document, Some(Position::new(2, 0)))
            .unwrap();
        assert_eq!(selection.start.line, 2);
    }

    #[test]
    fn test_goto_selects_to_document_end_on_last_line() {
        let mut document = document_with_lines(3);
        let tracker = tracker_with_bookmarks(&mut document, &[2]);
        let selection = tracker
            .goto_next(&document, Some(Position::new(0, 0)))
            .unwrap();
        assert_eq!(selection.end, document.end_position());
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut document = document_with_lines(60);
        let tracker = tracker_with_bookmarks(&mut document, &[3, 10, 57]);
        let serialized = tracker.serialize().unwrap();
        assert_eq!(serialized, "3,10,57");

        let mut restored_document = document_with_lines(60);
        let mut restored = BookmarkTracker::new();
        restored.load_from_persisted(&mut restored_document, &serialized);
        assert_eq!(restored.lines().collect::<Vec<_>>(), vec![3, 10, 57]);
    }

    #[test]
    fn test_serialize_empty_returns_none() {
        let tracker = BookmarkTracker::new();
        assert!(tracker.serialize().is_none());
    }

    #[test]
    fn test_load_skips_out_of_range_and_duplicate_lines() {
        let mut document = document_with_lines(5);
        let mut tracker = BookmarkTracker::new();
        tracker.load_from_persisted(&mut document, "3,99,3,-2,1");
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_load_malformed_token_defaults_to_line_zero() {
        let mut document = document_with_lines(5);
        let mut tracker = BookmarkTracker::new();
        tracker.load_from_persisted(&mut document, "abc,2");
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![0, 2]);

        // Already-occupied line 0 swallows a second malformed token.
        let mut document = document_with_lines(5);
        let mut tracker = BookmarkTracker::new();
        tracker.load_from_persisted(&mut document, "0,abc,12xy");
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_load_parses_leading_digits() {
        let mut document = document_with_lines(20);
        let mut tracker = BookmarkTracker::new();
        tracker.load_from_persisted(&mut document, "12ab, 7");
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![7, 12]);
    }

    #[test]
    fn test_insert_at_bookmarked_line_start_follows_line() {
        let mut document = Document::from_string("aaa\nbbb\nccc");
        let mut tracker = tracker_with_bookmarks(&mut document, &[1]);

        tracker.handle_edit_begin();
        insert(&mut tracker, &mut document, Position::new(1, 0), "xx\n");
        tracker.handle_edit_end(&mut document);

        // The bookmark follows "bbb" instead of staying on the inserted
        // line.
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![2]);
        assert_eq!(document.line(2), Some("bbb"));
    }

    #[test]
    fn test_newline_insert_does_not_strand_bookmark_on_blank_line() {
        let mut document = Document::from_string("aaa\nbbb\nccc");
        let mut tracker = tracker_with_bookmarks(&mut document, &[1]);

        tracker.handle_edit_begin();
        insert(&mut tracker, &mut document, Position::new(1, 0), "\n");
        tracker.handle_edit_end(&mut document);

        assert_eq!(document.line(1), Some(""));
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![2]);
        assert_eq!(document.line(2), Some("bbb"));
    }

    #[test]
    fn test_first_insert_tracker_wins_within_group() {
        let mut document = Document::from_string("mark");
        let mut tracker = tracker_with_bookmarks(&mut document, &[0]);

        tracker.handle_edit_begin();
        insert(&mut tracker, &mut document, Position::new(0, 0), "a\n");
        insert(&mut tracker, &mut document, Position::new(0, 0), "b\n");
        tracker.handle_edit_end(&mut document);

        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![2]);
        assert_eq!(document.line(2), Some("mark"));
    }

    #[test]
    fn test_ungrouped_insert_shifts_later_bookmarks() {
        let mut document = Document::from_string("aaa\nbbb\nccc");
        let mut tracker = tracker_with_bookmarks(&mut document, &[2]);
        insert(&mut tracker, &mut document, Position::new(0, 0), "top\n");
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_nested_groups_reconcile_only_at_outermost_end() {
        let mut document = Document::from_string("aaa\nbbb");
        let mut tracker = tracker_with_bookmarks(&mut document, &[1]);

        tracker.handle_edit_begin();
        tracker.handle_edit_begin();
        insert(&mut tracker, &mut document, Position::new(1, 0), "xx\n");
        tracker.handle_edit_end(&mut document);
        // Inner end: the bookmark has not been reconciled yet.
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![1]);
        tracker.handle_edit_end(&mut document);
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_delete_merging_bookmarked_lines_keeps_one() {
        let mut document = Document::from_string("aaa\nbbb\nccc");
        let mut tracker = tracker_with_bookmarks(&mut document, &[1, 2]);

        // Delete the newline separating the two bookmarked lines.
        delete(
            &mut tracker,
            &mut document,
            Range::new(Position::new(1, 3), Position::new(2, 0)),
        );

        assert_eq!(document.line(1), Some("bbbccc"));
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_delete_spanning_several_bookmarks_keeps_first() {
        let mut document = document_with_lines(6);
        let mut tracker = tracker_with_bookmarks(&mut document, &[1, 2, 3, 5]);

        delete(
            &mut tracker,
            &mut document,
            Range::new(Position::new(1, 2), Position::new(3, 1)),
        );

        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_delete_within_line_leaves_bookmarks_alone() {
        let mut document = document_with_lines(3);
        let mut tracker = tracker_with_bookmarks(&mut document, &[1]);
        delete(
            &mut tracker,
            &mut document,
            Range::new(Position::new(1, 1), Position::new(1, 3)),
        );
        assert_eq!(tracker.lines().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_clear_destroys_all_bookmarks() {
        let mut document = document_with_lines(5);
        let mut tracker = tracker_with_bookmarks(&mut document, &[0, 2, 4]);
        tracker.clear(&mut document);
        assert!(tracker.is_empty());
        assert!(document.bookmark_anchors().is_empty());
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("42"), 42);
        assert_eq!(parse_leading_int(" 7"), 7);
        assert_eq!(parse_leading_int("12ab"), 12);
        assert_eq!(parse_leading_int("abc"), 0);
        assert_eq!(parse_leading_int(""), 0);
        assert_eq!(parse_leading_int("-3"), -3);
    }
}
