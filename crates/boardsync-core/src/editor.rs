//! Board editor
//!
//! Free-form position editing on top of the shared edit engine. Drawing tools
//! turn a pointer stroke into one reversible edit; every other operation
//! records a single edit of its own.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::board::{BoardState, Piece};
use crate::change::{apply_edit, Edit, StateChange};
use crate::errors::Result;
use crate::history::{EditHistory, OpenEdit, Selection};
use crate::moves::{generate_editor_move_edit, MoveDraft};
use crate::types::{Coords, PieceType, Player, RawType};

// ----------------------------------------------------------------------------
// Tools
// ----------------------------------------------------------------------------

/// Editor tool selected in the toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorTool {
    Normal,
    Placer,
    Eraser,
    Selector,
    GameRules,
    SpecialRights,
}

impl EditorTool {
    /// Tools that edit the board while the pointer is held
    pub fn is_drawing_tool(self) -> bool {
        matches!(
            self,
            EditorTool::Placer | EditorTool::Eraser | EditorTool::SpecialRights
        )
    }
}

// ----------------------------------------------------------------------------
// Board Editor
// ----------------------------------------------------------------------------

/// Board editor state; the board itself is owned by the caller
#[derive(Debug)]
pub struct BoardEditor {
    history: EditHistory,
    tool: EditorTool,
    piece_type: PieceType,
    /// Edit of the stroke in progress
    stroke: Option<OpenEdit>,
    previous_square: Option<Coords>,
    /// Direction of the special-rights stroke, fixed by its first toggle
    adding_special_rights: Option<bool>,
}

impl Default for BoardEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardEditor {
    pub fn new() -> Self {
        Self {
            history: EditHistory::new(),
            tool: EditorTool::Normal,
            piece_type: PieceType::new(RawType::Pawn, Player::White),
            stroke: None,
            previous_square: None,
            adding_special_rights: None,
        }
    }

    pub fn tool(&self) -> EditorTool {
        self.tool
    }

    /// Change tool, sealing any stroke in progress
    pub fn set_tool(&mut self, tool: EditorTool) {
        self.end_stroke();
        self.tool = tool;
    }

    pub fn piece_type(&self) -> PieceType {
        self.piece_type
    }

    /// Piece type the placer puts down
    pub fn set_piece_type(&mut self, piece_type: PieceType) {
        self.piece_type = piece_type;
    }

    pub fn set_color(&mut self, color: Player) {
        self.piece_type.color = color;
    }

    pub fn is_drawing(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    // ------------------------------------------------------------------------
    // Pointer Gesture
    // ------------------------------------------------------------------------

    /// Start a stroke; only drawing tools do anything
    pub fn pointer_down(&mut self, selection: &mut Selection) -> bool {
        if !self.tool.is_drawing_tool() || self.stroke.is_some() {
            return false;
        }
        self.stroke = Some(self.history.begin_edit(selection));
        true
    }

    /// Apply the current tool to the square under the pointer
    pub fn pointer_over(&mut self, board: &mut BoardState, coords: Coords) -> Result<()> {
        if self.stroke.is_none() || self.previous_square == Some(coords) {
            return Ok(());
        }
        self.previous_square = Some(coords);

        let hovered = board.piece_at(coords);
        let mut delta = Edit::new();
        match self.tool {
            EditorTool::Placer => queue_add_piece(board, &mut delta, hovered, coords, self.piece_type),
            EditorTool::Eraser => queue_remove_piece(board, &mut delta, hovered),
            EditorTool::SpecialRights => self.queue_toggle_special_right(board, &mut delta, hovered),
            _ => {}
        }
        if delta.is_empty() {
            return Ok(());
        }

        apply_edit(board, &delta, true, true)?;
        if let Some(stroke) = self.stroke.as_mut() {
            self.history.append_to_open_edit(stroke, delta);
        }
        Ok(())
    }

    /// Finish the stroke, returning whether an edit was recorded
    pub fn pointer_up(&mut self) -> bool {
        self.end_stroke()
    }

    fn end_stroke(&mut self) -> bool {
        self.previous_square = None;
        self.adding_special_rights = None;
        match self.stroke.take() {
            Some(stroke) => self.history.seal_edit(stroke),
            None => false,
        }
    }

    fn queue_toggle_special_right(
        &mut self,
        board: &BoardState,
        edit: &mut Edit,
        hovered: Option<Piece>,
    ) {
        let Some(piece) = hovered else {
            return;
        };
        let current = board.has_special_right(piece.coords);
        let future = !current;
        match self.adding_special_rights {
            None => self.adding_special_rights = Some(future),
            Some(adding) if adding != future => return,
            Some(_) => {}
        }
        edit.push_global(StateChange::special_right(piece.coords, current, future));
    }

    // ------------------------------------------------------------------------
    // Whole-Board Operations
    // ------------------------------------------------------------------------

    /// Erase every piece as a single edit
    pub fn clear_all(&mut self, board: &mut BoardState, selection: &mut Selection) -> Result<()> {
        self.end_stroke();
        selection.unselect();
        let mut edit = Edit::new();
        let pieces: Vec<Piece> = board.pieces().collect();
        for piece in pieces {
            queue_remove_piece(board, &mut edit, Some(piece));
        }
        apply_edit(board, &edit, true, true)?;
        info!(changes = edit.changes.len(), "Board cleared");
        self.history.record(edit);
        Ok(())
    }

    /// Apply and record an editor move (no special moves)
    pub fn make_move_edit(&mut self, board: &mut BoardState, draft: &MoveDraft) -> Result<Edit> {
        let edit = generate_editor_move_edit(board, draft)?;
        apply_edit(board, &edit, true, true)?;
        self.history.record(edit.clone());
        Ok(edit)
    }

    pub fn undo(&mut self, board: &mut BoardState, selection: &mut Selection) -> Result<bool> {
        selection.unselect();
        self.history.undo(board)
    }

    pub fn redo(&mut self, board: &mut BoardState, selection: &mut Selection) -> Result<bool> {
        selection.unselect();
        self.history.redo(board)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Export the position as `abbrX,Y|...`, pieces in index order
    ///
    /// Squares holding a special right are suffixed with `+`.
    pub fn save_position(board: &BoardState) -> String {
        let entries: Vec<String> = board
            .pieces()
            .map(|piece| {
                let marker = if board.has_special_right(piece.coords) {
                    "+"
                } else {
                    ""
                };
                format!("{}{}{}", piece.piece_type, piece.coords, marker)
            })
            .collect();
        debug!(pieces = entries.len(), "Position exported");
        entries.join("|")
    }
}

// ----------------------------------------------------------------------------
// Queued Deltas
// ----------------------------------------------------------------------------

fn queue_add_piece(
    board: &BoardState,
    edit: &mut Edit,
    hovered: Option<Piece>,
    coords: Coords,
    piece_type: PieceType,
) {
    if hovered.map(|piece| piece.piece_type) == Some(piece_type) {
        return;
    }
    queue_remove_piece(board, edit, hovered);
    edit.queue_add(piece_type, coords);
}

fn queue_remove_piece(board: &BoardState, edit: &mut Edit, hovered: Option<Piece>) {
    let Some(piece) = hovered else {
        return;
    };
    edit.queue_delete(piece, false);
    edit.push_global(StateChange::special_right(
        piece.coords,
        board.has_special_right(piece.coords),
        false,
    ));
    if let Some(target) = board.en_passant().filter(|target| target.pawn == piece.coords) {
        edit.push_global(StateChange::en_passant(Some(target), None));
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
