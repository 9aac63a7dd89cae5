use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Which side of an insertion an anchor sticks to. A left-gravity anchor
/// stays put when text is inserted exactly at its position; a right-gravity
/// anchor moves to the end of the inserted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    Bookmark,
    Plain,
}

/// Opaque handle to a position anchor owned by a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(u64);

#[derive(Debug, Clone)]
struct Anchor {
    id: AnchorId,
    offset: usize,
    gravity: Gravity,
    kind: AnchorKind,
}

#[derive(Clone)]
pub struct Document {
    pub lines: Vec<String>,
    pub cursor_line: usize,
    pub cursor_column: usize,
    pub filename: Option<PathBuf>,
    pub modified: bool,
    anchors: Vec<Anchor>,
    next_anchor_id: u64,
}

impl Document {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
            cursor_line: 0,
            cursor_column: 0,
            filename: None,
            modified: false,
            anchors: Vec::new(),
            next_anchor_id: 0,
        }
    }

    pub fn from_string(content: &str) -> Self {
        let lines: Vec<String> = if content.is_empty() {
            vec![String::new()]
        } else {
            content.lines().map(|s| s.to_string()).collect()
        };

        Self {
            lines,
            ..Self::new()
        }
    }

    pub fn from_file(filename: PathBuf) -> Result<Self, std::io::Error> {
        let content = fs::read_to_string(&filename)?;
        let mut document = Self::from_string(&content);
        document.filename = Some(filename);
        Ok(document)
    }

    pub fn save(&mut self) -> Result<usize, std::io::Error> {
        if let Some(ref filename) = self.filename {
            let content = self.lines.join("\n");
            let byte_count = content.len();
            fs::write(filename, &content)?;
            self.modified = false;
            Ok(byte_count)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "No filename specified",
            ))
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn line_len(&self, index: usize) -> usize {
        self.lines.get(index).map_or(0, String::len)
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn end_position(&self) -> Position {
        let last = self.lines.len() - 1;
        Position::new(last, self.lines[last].len())
    }

    pub fn cursor(&self) -> Position {
        Position::new(self.cursor_line, self.cursor_column)
    }

    pub fn set_cursor(&mut self, position: Position) {
        self.cursor_line = position.line.min(self.lines.len() - 1);
        self.cursor_column = position.column.min(self.lines[self.cursor_line].len());
    }

    pub fn position_to_offset(&self, position: Position) -> usize {
        let line = position.line.min(self.lines.len() - 1);
        let mut offset = 0;
        for text in &self.lines[..line] {
            offset += text.len() + 1;
        }
        offset + position.column.min(self.lines[line].len())
    }

    pub fn offset_to_position(&self, offset: usize) -> Position {
        let mut remaining = offset;
        for (line, text) in self.lines.iter().enumerate() {
            if remaining <= text.len() {
                return Position::new(line, remaining);
            }
            remaining -= text.len() + 1;
        }
        self.end_position()
    }

    /// Insert text at the given position, shifting anchors per their gravity.
    pub fn insert(&mut self, at: Position, text: &str) {
        if text.is_empty() {
            return;
        }

        let ins = self.position_to_offset(at);
        let at = self.offset_to_position(ins);

        let tail = self.lines[at.line].split_off(at.column);
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            self.lines[at.line].push_str(first);
        }
        let mut rest: Vec<String> = parts.map(str::to_string).collect();
        if rest.is_empty() {
            self.lines[at.line].push_str(&tail);
        } else {
            if let Some(last) = rest.last_mut() {
                last.push_str(&tail);
            }
            let split = at.line + 1;
            self.lines.splice(split..split, rest);
        }

        for anchor in &mut self.anchors {
            if anchor.offset > ins || (anchor.offset == ins && anchor.gravity == Gravity::Right) {
                anchor.offset += text.len();
            }
        }

        self.modified = true;
    }

    /// Delete the given range. Anchors inside the range collapse onto its
    /// start; anchors past it shift back by the removed length.
    pub fn delete(&mut self, range: Range) {
        let s = self.position_to_offset(range.start);
        let e = self.position_to_offset(range.end);
        if e <= s {
            return;
        }

        let start = self.offset_to_position(s);
        let end = self.offset_to_position(e);

        if start.line == end.line {
            self.lines[start.line].replace_range(start.column..end.column, "");
        } else {
            let tail = self.lines[end.line].split_off(end.column);
            self.lines[start.line].truncate(start.column);
            self.lines[start.line].push_str(&tail);
            self.lines.drain(start.line + 1..=end.line);
        }

        let removed = e - s;
        for anchor in &mut self.anchors {
            if anchor.offset >= e {
                anchor.offset -= removed;
            } else if anchor.offset > s {
                anchor.offset = s;
            }
        }

        self.modified = true;
    }

    pub fn create_anchor(&mut self, at: Position, gravity: Gravity, kind: AnchorKind) -> AnchorId {
        let id = AnchorId(self.next_anchor_id);
        self.next_anchor_id += 1;
        let offset = self.position_to_offset(at);
        self.anchors.push(Anchor {
            id,
            offset,
            gravity,
            kind,
        });
        id
    }

    pub fn delete_anchor(&mut self, id: AnchorId) {
        self.anchors.retain(|anchor| anchor.id != id);
    }

    pub fn move_anchor(&mut self, id: AnchorId, to: Position) {
        let offset = self.position_to_offset(to);
        if let Some(anchor) = self.anchors.iter_mut().find(|anchor| anchor.id == id) {
            anchor.offset = offset;
        }
    }

    pub fn anchor_position(&self, id: AnchorId) -> Option<Position> {
        self.anchors
            .iter()
            .find(|anchor| anchor.id == id)
            .map(|anchor| self.offset_to_position(anchor.offset))
    }

    /// All bookmark-kind anchors in document order (ascending position,
    /// creation order breaking ties).
    pub fn bookmark_anchors(&self) -> Vec<(AnchorId, Position)> {
        let mut found: Vec<(usize, AnchorId)> = self
            .anchors
            .iter()
            .filter(|anchor| anchor.kind == AnchorKind::Bookmark)
            .map(|anchor| (anchor.offset, anchor.id))
            .collect();
        found.sort_unstable();
        found
            .into_iter()
            .map(|(offset, id)| (id, self.offset_to_position(offset)))
            .collect()
    }

    pub fn bookmark_anchors_at_line(&self, line: usize) -> Vec<AnchorId> {
        self.bookmark_anchors()
            .into_iter()
            .filter(|(_, position)| position.line == line)
            .map(|(id, _)| id)
            .collect()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
