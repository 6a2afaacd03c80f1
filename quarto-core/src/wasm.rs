//! WASM bindings for quarto-core
//!
//! Provides a JavaScript-friendly API over the game engine. Commands return
//! whether they were accepted; the page re-reads state afterwards.

use wasm_bindgen::prelude::*;
use crate::{Command, Game, Piece, PieceId, Pos};

/// WASM-friendly wrapper around Game
#[wasm_bindgen]
pub struct WasmGame {
    inner: Game,
}

#[wasm_bindgen]
impl WasmGame {
    /// Start a new game
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmGame {
        WasmGame { inner: Game::new() }
    }

    /// Select a piece (0-15) for the current player to place
    #[wasm_bindgen(js_name = selectPiece)]
    pub fn select_piece(&mut self, piece: u8) -> bool {
        self.inner.select_piece(piece).is_ok()
    }

    /// Place the selected piece. Returns true if accepted.
    #[wasm_bindgen(js_name = placePiece)]
    pub fn place_piece(&mut self, row: u8, col: u8) -> bool {
        self.inner.place_piece(row, col).is_ok()
    }

    /// Undo the last placement. Returns the notice to show when rejected.
    pub fn undo(&mut self) -> Option<String> {
        self.inner.undo().err().map(|err| err.to_string())
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    /// Apply a command object such as `{ type: "place", row: 1, col: 2 }`.
    /// Returns the rejection message, or undefined when accepted.
    pub fn apply(&mut self, command: JsValue) -> Result<Option<String>, JsValue> {
        let command: Command = serde_wasm_bindgen::from_value(command)?;
        Ok(self.inner.apply(command).err().map(|err| err.to_string()))
    }

    /// Player placing this turn (0 or 1)
    #[wasm_bindgen(js_name = currentPlayer)]
    pub fn current_player(&self) -> u8 {
        self.inner.current_player().index()
    }

    #[wasm_bindgen(js_name = turnCount)]
    pub fn turn_count(&self) -> u32 {
        self.inner.turn()
    }

    /// Selected piece id, if any
    #[wasm_bindgen(js_name = selectedPiece)]
    pub fn selected_piece(&self) -> Option<u8> {
        self.inner.selected().map(PieceId::index)
    }

    #[wasm_bindgen(js_name = isGameOver)]
    pub fn is_game_over(&self) -> bool {
        self.inner.is_game_over()
    }

    #[wasm_bindgen(js_name = isDraw)]
    pub fn is_draw(&self) -> bool {
        self.inner.is_draw()
    }

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.inner.can_undo()
    }

    /// Winning line as [row, col, row, col, ...]. Empty if nobody has won.
    #[wasm_bindgen(js_name = winningCells)]
    pub fn winning_cells(&self) -> Vec<u8> {
        self.inner
            .winning_cells()
            .iter()
            .flat_map(|pos| [pos.row(), pos.col()])
            .collect()
    }

    /// Last placed cell as [row, col], or empty
    #[wasm_bindgen(js_name = lastPlaced)]
    pub fn last_placed(&self) -> Vec<u8> {
        self.inner
            .last_placed()
            .map(|pos| vec![pos.row(), pos.col()])
            .unwrap_or_default()
    }

    /// Piece code at a cell, e.g. "tdro"
    #[wasm_bindgen(js_name = cellCode)]
    pub fn cell_code(&self, row: u8, col: u8) -> Option<String> {
        let pos = Pos::new(row, col)?;
        self.inner.board().get(pos).map(|id| id.to_string())
    }

    /// Ids of pieces that can still be selected
    #[wasm_bindgen(js_name = unusedPieces)]
    pub fn unused_pieces(&self) -> Vec<u8> {
        self.inner.unused_pieces().map(|p| p.id.index()).collect()
    }

    /// All 16 pieces as [{ id, code, title, asset, used }]
    pub fn pieces(&self) -> Result<JsValue, JsValue> {
        let catalog = self.inner.catalog();
        let pieces: Vec<WasmPiece> = catalog
            .iter()
            .map(|p| WasmPiece::new(p, catalog.is_used(p.id)))
            .collect();
        Ok(serde_wasm_bindgen::to_value(&pieces)?)
    }

    /// Log lines, oldest first
    pub fn log(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(self.inner.log())?)
    }

    /// Text for the turn banner
    pub fn prompt(&self) -> String {
        self.inner.prompt()
    }
}

impl Default for WasmGame {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable piece for JavaScript
#[derive(serde::Serialize)]
struct WasmPiece {
    id: u8,
    code: String,
    title: String,
    asset: String,
    used: bool,
}

impl WasmPiece {
    fn new(piece: &Piece, used: bool) -> WasmPiece {
        WasmPiece {
            id: piece.id.index(),
            code: piece.code(),
            title: piece.title(),
            asset: piece.asset_path(),
            used,
        }
    }
}
