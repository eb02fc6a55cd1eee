//! The Line Store: the ordered list of lines making up a notebook.
//!
//! A document is never empty. Removing the last line leaves a single empty
//! text line in its place, and so does replacing the contents with nothing.

use crate::error::{NotebookError, Result};
use crate::models::{Line, LineId, LineKind};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<Line>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            lines: vec![Line::empty()],
        }
    }

    /// Build a document from existing lines, rejecting duplicate ids.
    pub fn from_lines(lines: Vec<Line>) -> Result<Self> {
        let mut doc = Self::new();
        doc.replace_all(lines)?;
        Ok(doc)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn get(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn position_of(&self, id: &LineId) -> Option<usize> {
        self.lines.iter().position(|l| &l.id == id)
    }

    pub fn find(&self, id: &LineId) -> Option<&Line> {
        self.lines.iter().find(|l| &l.id == id)
    }

    pub fn contains(&self, id: &LineId) -> bool {
        self.find(id).is_some()
    }

    /// True when the document is just the single empty placeholder line.
    pub fn is_blank(&self) -> bool {
        matches!(self.lines.as_slice(), [only] if only.kind == LineKind::Text && only.content.is_empty())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.lines.len() {
            Ok(())
        } else {
            Err(NotebookError::Validation(format!(
                "line index {} out of range (document has {} lines)",
                index,
                self.lines.len()
            )))
        }
    }

    fn check_new_id(&self, id: &LineId) -> Result<()> {
        if self.contains(id) {
            return Err(NotebookError::Validation(format!(
                "line id {} already exists",
                id
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert `line` after `index`, returning the index it now occupies.
    pub fn insert_after(&mut self, index: usize, line: Line) -> Result<usize> {
        self.check_index(index)?;
        self.check_new_id(&line.id)?;
        self.lines.insert(index + 1, line);
        Ok(index + 1)
    }

    pub fn push(&mut self, line: Line) -> Result<usize> {
        self.check_new_id(&line.id)?;
        self.lines.push(line);
        Ok(self.lines.len() - 1)
    }

    /// Remove the line at `index` and return it.
    pub fn delete_at(&mut self, index: usize) -> Result<Line> {
        self.check_index(index)?;
        let removed = self.lines.remove(index);
        if self.lines.is_empty() {
            self.lines.push(Line::empty());
        }
        Ok(removed)
    }

    pub fn update_content(&mut self, index: usize, content: impl Into<String>) -> Result<()> {
        self.check_index(index)?;
        self.lines[index].content = content.into();
        Ok(())
    }

    pub fn update_kind(&mut self, index: usize, kind: LineKind) -> Result<()> {
        self.check_index(index)?;
        self.lines[index].kind = kind;
        Ok(())
    }

    /// Flip the stored problem-context flag and return its new value.
    pub fn toggle_problem_context(&mut self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        let line = &mut self.lines[index];
        line.is_problem_context = !line.is_problem_context;
        Ok(line.is_problem_context)
    }

    pub fn replace_all(&mut self, lines: Vec<Line>) -> Result<()> {
        let mut seen = HashSet::new();
        for line in &lines {
            if !seen.insert(&line.id) {
                return Err(NotebookError::Validation(format!(
                    "duplicate line id {}",
                    line.id
                )));
            }
        }

        self.lines = if lines.is_empty() {
            vec![Line::empty()]
        } else {
            lines
        };
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
