//! Turn engine: select-then-place turns, win detection and undo history.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{Board, Catalog, Piece, PieceId, Player, Pos};

/// Where the game currently stands.
///
/// Derived from the engine fields: a pending selection is what makes the
/// game await a placement.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The player who is not placing picks a piece for the other.
    AwaitingSelection,
    /// A piece is selected and the current player must place it.
    AwaitingPlacement,
    /// A winning line was completed. Only `reset` leaves this phase.
    GameOver,
}

/// A command from the UI.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Select { piece: u8 },
    Place { row: u8, col: u8 },
    Undo,
    Reset,
}

/// Why a command was rejected. The game is unchanged whenever one is returned.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, Error)]
pub enum CommandError {
    #[display("The game is over")]
    GameOver,
    #[display("A piece is already selected")]
    AlreadySelected,
    #[display("Piece {id} does not exist")]
    UnknownPiece { id: u8 },
    #[display("Piece {piece} has already been used")]
    PieceUsed { piece: PieceId },
    #[display("No piece is selected")]
    NoSelection,
    #[display("Cell ({row}, {col}) is off the board")]
    OutOfBounds { row: u8, col: u8 },
    #[display("Cell ({row}, {col}) is already occupied")]
    Occupied { row: u8, col: u8 },
    #[display("No turn to undo")]
    NothingToUndo,
}

/// Result of a successful placement.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlaceOutcome {
    /// No line completed; the turn passed to the other player.
    Placed,
    /// The placement completed a winning line and ended the game.
    Won { player: Player, line: [Pos; 4] },
}

/// Engine state captured right before a placement.
///
/// The log is append-only between a snapshot and the undo that pops it, so
/// its length is enough to restore it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Snapshot {
    pub board: Board,
    pub used: u16,
    pub selected: PieceId,
    pub current_player: Player,
    pub turn: u32,
    pub last_placed: Option<Pos>,
    pub log_len: usize,
}

/// One game of Quarto between two players sharing a device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Game {
    catalog: Catalog,
    board: Board,
    selected: Option<PieceId>,
    /// The player who places this turn.
    current_player: Player,
    turn: u32,
    last_placed: Option<Pos>,
    game_over: bool,
    winning_cells: Option<[Pos; 4]>,
    log: Vec<String>,
    history: Vec<Snapshot>,
}

impl Game {
    /// Start a fresh game: empty board, all pieces unused, Player 1 places first.
    pub fn new() -> Game {
        Game {
            catalog: Catalog::build(),
            board: Board::new(),
            selected: None,
            current_player: Player::One,
            turn: 1,
            last_placed: None,
            game_over: false,
            winning_cells: None,
            log: Vec::new(),
            history: Vec::new(),
        }
    }

    // ========== Queries ==========

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Pieces that can still be selected.
    pub fn unused_pieces(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.catalog.unused()
    }

    /// The player placing this turn.
    pub fn current_player(&self) -> Player {
        self.current_player
    }

    /// The player choosing the piece this turn.
    pub fn selector(&self) -> Player {
        self.current_player.other()
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn selected(&self) -> Option<PieceId> {
        self.selected
    }

    pub fn selected_piece(&self) -> Option<&Piece> {
        self.selected.map(|id| self.catalog.get(id))
    }

    pub fn phase(&self) -> Phase {
        if self.game_over {
            Phase::GameOver
        } else if self.selected.is_some() {
            Phase::AwaitingPlacement
        } else {
            Phase::AwaitingSelection
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Winner, once the game is over.
    pub fn winner(&self) -> Option<Player> {
        self.game_over.then_some(self.current_player)
    }

    /// Cells of the winning line, or empty while nobody has won.
    pub fn winning_cells(&self) -> &[Pos] {
        match &self.winning_cells {
            Some(line) => line,
            None => &[],
        }
    }

    pub fn last_placed(&self) -> Option<Pos> {
        self.last_placed
    }

    /// Log lines in the order they were written.
    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Undo needs a recorded placement and a game that is still running.
    pub fn can_undo(&self) -> bool {
        !self.game_over && !self.history.is_empty()
    }

    /// Every piece is on the board and no line won.
    ///
    /// Does not end the game; undo remains available.
    pub fn is_draw(&self) -> bool {
        !self.game_over && self.board.is_full()
    }

    /// Instruction for whoever has to act next.
    pub fn prompt(&self) -> String {
        match self.phase() {
            Phase::GameOver => format!("{} wins!", self.current_player),
            _ if self.is_draw() => "Board full: the game is a draw".to_string(),
            Phase::AwaitingSelection => format!("{}: choose a piece", self.selector()),
            Phase::AwaitingPlacement => {
                format!("{}: place the piece on the board", self.current_player)
            }
        }
    }

    // ========== Commands ==========

    /// Dispatch a UI command to its handler.
    pub fn apply(&mut self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::Select { piece } => self.select_piece(piece).map(drop),
            Command::Place { row, col } => self.place_piece(row, col).map(drop),
            Command::Undo => self.undo(),
            Command::Reset => {
                self.reset();
                Ok(())
            }
        }
    }

    /// Pick an unused piece for the current player to place.
    ///
    /// Rejected while another selection is pending, after the game ended, or
    /// for an unknown or used piece.
    #[instrument(level = "debug", skip(self), fields(turn = self.turn))]
    pub fn select_piece(&mut self, piece: u8) -> Result<PieceId, CommandError> {
        let id = self
            .check_select(piece)
            .inspect_err(|err| debug!(%err, "selection rejected"))?;

        self.selected = Some(id);
        let entry = format!("Turn {} - {}: selected {}", self.turn, self.selector(), id);
        self.log.push(entry);
        Ok(id)
    }

    fn check_select(&self, piece: u8) -> Result<PieceId, CommandError> {
        if self.game_over {
            return Err(CommandError::GameOver);
        }
        if self.selected.is_some() {
            return Err(CommandError::AlreadySelected);
        }
        let id = PieceId::try_from(piece)?;
        if self.catalog.is_used(id) {
            return Err(CommandError::PieceUsed { piece: id });
        }
        Ok(id)
    }

    /// Place the selected piece at `(row, col)`.
    ///
    /// Pushes a snapshot first, then checks the lines through the new cell.
    /// A win ends the game and leaves selection, player and turn as they
    /// were; otherwise the turn passes to the other player.
    #[instrument(level = "debug", skip(self), fields(turn = self.turn))]
    pub fn place_piece(&mut self, row: u8, col: u8) -> Result<PlaceOutcome, CommandError> {
        let (piece, pos) = self
            .check_place(row, col)
            .inspect_err(|err| debug!(%err, "placement rejected"))?;

        let snapshot = self.snapshot(piece);
        self.history.push(snapshot);

        self.board.place(pos, piece);
        self.catalog.mark_used(piece);
        self.last_placed = Some(pos);
        let placer = self.current_player;
        let entry = format!("Turn {} - {}: {} → ({}, {})", self.turn, placer, piece, row, col);
        self.log.push(entry);

        if let Some(line) = self.board.winning_line_through(pos) {
            self.game_over = true;
            self.winning_cells = Some(line);
            self.log.push(format!("{placer} wins!"));
            info!(player = placer.number(), turn = self.turn, "game won");
            return Ok(PlaceOutcome::Won { player: placer, line });
        }

        self.selected = None;
        self.current_player = placer.other();
        self.turn += 1;
        Ok(PlaceOutcome::Placed)
    }

    fn check_place(&self, row: u8, col: u8) -> Result<(PieceId, Pos), CommandError> {
        if self.game_over {
            return Err(CommandError::GameOver);
        }
        let piece = self.selected.ok_or(CommandError::NoSelection)?;
        let pos = Pos::new(row, col).ok_or(CommandError::OutOfBounds { row, col })?;
        if !self.board.is_empty(pos) {
            return Err(CommandError::Occupied { row, col });
        }
        Ok((piece, pos))
    }

    fn snapshot(&self, selected: PieceId) -> Snapshot {
        Snapshot {
            board: self.board,
            used: self.catalog.used_mask(),
            selected,
            current_player: self.current_player,
            turn: self.turn,
            last_placed: self.last_placed,
            log_len: self.log.len(),
        }
    }

    /// Take back the most recent placement.
    ///
    /// The game returns to the moment before that placement, with its piece
    /// selected again. Not available once the game is over.
    #[instrument(level = "debug", skip(self), fields(turn = self.turn))]
    pub fn undo(&mut self) -> Result<(), CommandError> {
        if self.game_over {
            debug!("undo rejected after game over");
            return Err(CommandError::GameOver);
        }
        let Some(snapshot) = self.history.pop() else {
            debug!("undo rejected with empty history");
            return Err(CommandError::NothingToUndo);
        };

        self.board = snapshot.board;
        self.catalog.restore(snapshot.used);
        self.selected = Some(snapshot.selected);
        self.current_player = snapshot.current_player;
        self.turn = snapshot.turn;
        self.last_placed = snapshot.last_placed;
        self.log.truncate(snapshot.log_len);
        info!(turn = self.turn, remaining = self.history.len(), "placement undone");
        Ok(())
    }

    /// Start over. Always succeeds.
    pub fn reset(&mut self) {
        self.catalog.clear();
        self.board = Board::new();
        self.selected = None;
        self.current_player = Player::One;
        self.turn = 1;
        self.last_placed = None;
        self.game_over = false;
        self.winning_cells = None;
        self.log.clear();
        self.history.clear();
        info!("game reset");
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(piece: &str) -> u8 {
        PieceId::from_code(piece).unwrap().index()
    }

    fn pos(row: u8, col: u8) -> Pos {
        Pos::new(row, col).unwrap()
    }

    /// Play `(piece, row, col)` turns in order, asserting each one is accepted.
    fn play(game: &mut Game, turns: &[(&str, u8, u8)]) -> PlaceOutcome {
        let mut outcome = PlaceOutcome::Placed;
        for &(piece, row, col) in turns {
            game.select_piece(code(piece)).unwrap();
            outcome = game.place_piece(row, col).unwrap();
        }
        outcome
    }

    const DARK_ROW: [(&str, u8, u8); 4] = [
        ("tdro", 0, 0),
        ("tdsx", 0, 1),
        ("sdrx", 0, 2),
        ("sdso", 0, 3),
    ];

    #[test]
    fn test_new_game() {
        let game = Game::new();
        assert_eq!(game.phase(), Phase::AwaitingSelection);
        assert_eq!(game.current_player(), Player::One);
        assert_eq!(game.selector(), Player::Two);
        assert_eq!(game.turn(), 1);
        assert_eq!(game.unused_pieces().count(), 16);
        assert!(game.log().is_empty());
        assert!(!game.can_undo());
        assert_eq!(game.prompt(), "Player 2: choose a piece");
    }

    #[test]
    fn test_select_piece() {
        let mut game = Game::new();
        let id = game.select_piece(code("tdro")).unwrap();
        assert_eq!(id.to_string(), "tdro");
        assert_eq!(game.phase(), Phase::AwaitingPlacement);
        assert_eq!(game.log(), ["Turn 1 - Player 2: selected tdro"]);
        // Selection alone does not use the piece
        assert!(!game.catalog().is_used(id));
        assert_eq!(game.prompt(), "Player 1: place the piece on the board");
    }

    #[test]
    fn test_second_selection_is_ignored() {
        let mut game = Game::new();
        game.select_piece(code("tdro")).unwrap();
        assert_eq!(game.select_piece(code("slsx")), Err(CommandError::AlreadySelected));
        assert_eq!(game.selected(), PieceId::from_code("tdro"));
        assert_eq!(game.log().len(), 1);
    }

    #[test]
    fn test_select_rejects_unknown_and_used() {
        let mut game = Game::new();
        assert_eq!(game.select_piece(16), Err(CommandError::UnknownPiece { id: 16 }));

        play(&mut game, &[("tdro", 0, 0)]);
        let err = game.select_piece(code("tdro")).unwrap_err();
        assert_eq!(err.to_string(), "Piece tdro has already been used");
        assert_eq!(game.selected(), None);
    }

    #[test]
    fn test_place_piece_passes_turn() {
        let mut game = Game::new();
        game.select_piece(code("tdro")).unwrap();
        assert_eq!(game.place_piece(0, 0), Ok(PlaceOutcome::Placed));

        assert_eq!(game.board().get(pos(0, 0)), PieceId::from_code("tdro"));
        assert!(game.catalog().is_used(PieceId::from_code("tdro").unwrap()));
        assert_eq!(game.current_player(), Player::Two);
        assert_eq!(game.turn(), 2);
        assert_eq!(game.selected(), None);
        assert_eq!(game.last_placed(), Some(pos(0, 0)));
        assert_eq!(
            game.log(),
            [
                "Turn 1 - Player 2: selected tdro",
                "Turn 1 - Player 1: tdro → (0, 0)",
            ]
        );
        assert_eq!(game.history_len(), 1);
        assert!(game.can_undo());
    }

    #[test]
    fn test_place_rejections_leave_state() {
        let mut game = Game::new();
        assert_eq!(game.place_piece(0, 0), Err(CommandError::NoSelection));

        play(&mut game, &[("tdro", 1, 1)]);
        game.select_piece(code("tdrx")).unwrap();
        let before = game.clone();

        assert_eq!(game.place_piece(4, 0), Err(CommandError::OutOfBounds { row: 4, col: 0 }));
        assert_eq!(game.place_piece(1, 1), Err(CommandError::Occupied { row: 1, col: 1 }));
        assert_eq!(game, before);
    }

    #[test]
    fn test_dark_row_wins() {
        let mut game = Game::new();
        let outcome = play(&mut game, &DARK_ROW);

        let line = [pos(0, 0), pos(0, 1), pos(0, 2), pos(0, 3)];
        assert_eq!(outcome, PlaceOutcome::Won { player: Player::Two, line });
        assert!(game.is_game_over());
        assert_eq!(game.phase(), Phase::GameOver);
        assert_eq!(game.winning_cells(), line);
        assert_eq!(game.winner(), Some(Player::Two));
        assert_eq!(game.log().last().map(String::as_str), Some("Player 2 wins!"));
        assert_eq!(game.prompt(), "Player 2 wins!");

        // Turn state is frozen at the winning placement
        assert_eq!(game.turn(), 4);
        assert_eq!(game.current_player(), Player::Two);
        assert_eq!(game.selected(), PieceId::from_code("sdso"));
    }

    #[test]
    fn test_commands_after_win_rejected() {
        let mut game = Game::new();
        play(&mut game, &DARK_ROW);
        let before = game.clone();

        assert_eq!(game.select_piece(code("slsx")), Err(CommandError::GameOver));
        assert_eq!(game.place_piece(3, 3), Err(CommandError::GameOver));
        assert_eq!(game.undo(), Err(CommandError::GameOver));
        assert!(!game.can_undo());
        assert_eq!(game, before);
    }

    #[test]
    fn test_undo_empty_history() {
        let mut game = Game::new();
        let err = game.undo().unwrap_err();
        assert_eq!(err, CommandError::NothingToUndo);
        assert_eq!(err.to_string(), "No turn to undo");
    }

    #[test]
    fn test_undo_restores_previous_turn() {
        let mut game = Game::new();
        play(&mut game, &[("tdro", 0, 0)]);
        game.select_piece(code("slsx")).unwrap();
        let before = game.clone();

        game.place_piece(2, 3).unwrap();
        game.undo().unwrap();

        assert_eq!(game, before);
        assert_eq!(game.selected(), PieceId::from_code("slsx"));
        assert_eq!(game.last_placed(), Some(pos(0, 0)));
        assert_eq!(game.phase(), Phase::AwaitingPlacement);
    }

    #[test]
    fn test_undo_all_placements() {
        let mut game = Game::new();
        play(&mut game, &[("tdro", 0, 0), ("slsx", 1, 2), ("tlso", 3, 3)]);
        for _ in 0..3 {
            game.undo().unwrap();
        }
        assert_eq!(game.undo(), Err(CommandError::NothingToUndo));

        assert_eq!(*game.board(), Board::new());
        assert_eq!(game.catalog().used_count(), 0);
        assert_eq!(game.current_player(), Player::One);
        assert_eq!(game.turn(), 1);
        assert_eq!(game.last_placed(), None);
        // The first selection is still pending
        assert_eq!(game.selected(), PieceId::from_code("tdro"));
        assert_eq!(game.log(), ["Turn 1 - Player 2: selected tdro"]);
    }

    #[test]
    fn test_reset() {
        let mut game = Game::new();
        play(&mut game, &DARK_ROW);
        game.reset();
        assert_eq!(game, Game::new());
    }

    #[test]
    fn test_apply_dispatch() {
        let mut game = Game::new();
        assert_eq!(game.apply(Command::Select { piece: 0 }), Ok(()));
        assert_eq!(game.apply(Command::Place { row: 3, col: 0 }), Ok(()));
        assert_eq!(game.apply(Command::Undo), Ok(()));
        assert!(game.apply(Command::Place { row: 9, col: 9 }).is_err());
        assert_eq!(game.apply(Command::Reset), Ok(()));
        assert_eq!(game, Game::new());
    }

    #[test]
    fn test_command_json() {
        let command: Command = serde_json::from_str(r#"{"type":"place","row":1,"col":2}"#).unwrap();
        assert_eq!(command, Command::Place { row: 1, col: 2 });
        let command: Command = serde_json::from_str(r#"{"type":"undo"}"#).unwrap();
        assert_eq!(command, Command::Undo);
    }

    #[test]
    fn test_draw_after_sixteen_placements() {
        // No line of this arrangement shares an attribute
        const LAYOUT: [[&str; 4]; 4] = [
            ["slro", "sdro", "tdso", "tlsx"],
            ["tlrx", "tdro", "sdso", "tlro"],
            ["sdsx", "slso", "sdrx", "tdsx"],
            ["tdrx", "slrx", "tlso", "slsx"],
        ];
        let mut game = Game::new();
        for (r, row) in LAYOUT.iter().enumerate() {
            for (c, piece) in row.iter().enumerate() {
                game.select_piece(code(piece)).unwrap();
                assert_eq!(game.place_piece(r as u8, c as u8), Ok(PlaceOutcome::Placed));
            }
        }
        assert!(game.board().is_full());
        assert_eq!(game.board().check_all_lines(), None);
        assert!(game.is_draw());
        assert!(!game.is_game_over());
        assert!(game.can_undo());
        assert_eq!(game.unused_pieces().count(), 0);
        assert_eq!(game.turn(), 17);
        assert_eq!(game.prompt(), "Board full: the game is a draw");
    }

    #[test]
    fn test_random_playouts_keep_invariants() {
        use rand::prelude::*;

        let mut rng = rand::rng();

        for _ in 0..200 {
            let mut game = Game::new();
            while !game.is_game_over() && !game.board().is_full() {
                let unused: Vec<u8> = game.unused_pieces().map(|p| p.id.index()).collect();
                let piece = unused[rng.random_range(0..unused.len())];
                game.select_piece(piece).unwrap();

                let empty: Vec<Pos> = Pos::all().filter(|&p| game.board().is_empty(p)).collect();
                let target = empty[rng.random_range(0..empty.len())];
                game.place_piece(target.row(), target.col()).unwrap();

                // Every used piece is on the board and vice versa
                for id in PieceId::all() {
                    let on_board = Pos::all().any(|p| game.board().get(p) == Some(id));
                    assert_eq!(on_board, game.catalog().is_used(id));
                }
                assert_eq!(game.history_len() as u32, game.board().count());
                assert_eq!(game.is_game_over(), game.board().check_all_lines().is_some());

                // Occasionally take the move back and play on
                if !game.is_game_over() && rng.random_bool(0.2) {
                    let turn = game.turn();
                    game.undo().unwrap();
                    assert_eq!(game.turn(), turn - 1);
                    let again = game.place_piece(target.row(), target.col());
                    assert_eq!(again, Ok(PlaceOutcome::Placed));
                }
            }
        }
    }
}
