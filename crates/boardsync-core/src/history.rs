//! Edit history
//!
//! Cursor-addressed list of sealed edits with undo/redo and branch
//! truncation. Continuous gestures accumulate into an [`OpenEdit`] token that
//! is sealed atomically on release.

use tracing::debug;

use crate::board::BoardState;
use crate::change::{apply_edit, Edit};
use crate::errors::Result;
use crate::types::Coords;

// ----------------------------------------------------------------------------
// Selection
// ----------------------------------------------------------------------------

/// The currently selected piece, if any
///
/// Pieces must be unselected before the board under them is modified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    selected: Option<Coords>,
}

impl Selection {
    pub fn select(&mut self, coords: Coords) {
        self.selected = Some(coords);
    }

    /// Clear the selection, returning whether something was selected
    pub fn unselect(&mut self) -> bool {
        self.selected.take().is_some()
    }

    pub fn selected(&self) -> Option<Coords> {
        self.selected
    }
}

// ----------------------------------------------------------------------------
// Open Edit
// ----------------------------------------------------------------------------

/// An edit being accumulated for one input gesture
///
/// Only [`EditHistory::begin_edit`] creates one and only
/// [`EditHistory::seal_edit`] consumes it, so at most one is live per
/// gesture.
#[derive(Debug, Default)]
pub struct OpenEdit {
    edit: Edit,
}

impl OpenEdit {
    /// Fold an already-applied delta into the open edit
    pub fn append(&mut self, delta: Edit) {
        self.edit.extend(delta);
    }

    pub fn is_empty(&self) -> bool {
        self.edit.is_empty()
    }

    pub fn edit(&self) -> &Edit {
        &self.edit
    }
}

// ----------------------------------------------------------------------------
// Edit History
// ----------------------------------------------------------------------------

/// Ordered list of edits and the undo cursor
#[derive(Debug, Clone, Default)]
pub struct EditHistory {
    edits: Vec<Edit>,
    cursor: usize,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new empty edit for a continuous gesture
    pub fn begin_edit(&self, selection: &mut Selection) -> OpenEdit {
        selection.unselect();
        OpenEdit::default()
    }

    /// Accumulate a delta into the open edit without touching board or history
    pub fn append_to_open_edit(&self, open: &mut OpenEdit, delta: Edit) {
        open.append(delta);
    }

    /// Seal the open edit into the history; empty edits are discarded
    pub fn seal_edit(&mut self, open: OpenEdit) -> bool {
        self.record(open.edit)
    }

    /// Record an already-applied edit, truncating any redo branch
    pub fn record(&mut self, edit: Edit) -> bool {
        if edit.is_empty() {
            return false;
        }
        self.edits.truncate(self.cursor);
        self.edits.push(edit);
        self.cursor += 1;
        debug!(cursor = self.cursor, "Edit recorded");
        true
    }

    /// Step back one edit; no-op at the start
    pub fn undo(&mut self, board: &mut BoardState) -> Result<bool> {
        if self.cursor == 0 {
            return Ok(false);
        }
        apply_edit(board, &self.edits[self.cursor - 1], false, true)?;
        self.cursor -= 1;
        Ok(true)
    }

    /// Step forward one edit; no-op at the end
    pub fn redo(&mut self, board: &mut BoardState) -> Result<bool> {
        if self.cursor >= self.edits.len() {
            return Ok(false);
        }
        apply_edit(board, &self.edits[self.cursor], true, true)?;
        self.cursor += 1;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.edits.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
