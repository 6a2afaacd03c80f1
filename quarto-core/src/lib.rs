//! Quarto game logic with a packed board representation.
//!
//! # Piece Encoding (4-bit)
//!
//! ```text
//! Bit 3: height (0 = tall,  1 = short)
//! Bit 2: color  (0 = dark,  1 = light)
//! Bit 1: shape  (0 = round, 1 = square)
//! Bit 0: hole   (0 = hole,  1 = solid)
//! ```
//!
//! A piece id IS its attribute bits, so the catalog order is height outer,
//! then color, then shape, then hole: `tdro` = 0, `tdrx` = 1, ... `slsx` = 15.
//!
//! # Board Encoding
//!
//! ```text
//! cells:    u64, 4 bits per cell (cell i at bits 4i..4i+4)
//! occupied: u16, bit i set when cell i holds a piece
//!
//! Cell indices (row-major order):
//!    0  1  2  3
//!    4  5  6  7
//!    8  9 10 11
//!   12 13 14 15
//! ```

use std::fmt;

use derive_more::Display;
use serde::{Deserialize, Serialize, Serializer};

mod game;
#[cfg(feature = "wasm")]
pub mod wasm;

pub use game::{Command, CommandError, Game, Phase, PlaceOutcome, Snapshot};

/// Player identifier.
///
/// The player stored as "current" is the one placing this turn; the other
/// one picks the piece they must place.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum Player {
    One,
    Two,
}

impl Player {
    /// Get the other player.
    #[inline]
    pub fn other(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Zero-based index (0 or 1).
    #[inline]
    pub fn index(self) -> u8 {
        match self {
            Player::One => 0,
            Player::Two => 1,
        }
    }

    /// One-based number used in log text (1 or 2).
    #[inline]
    pub fn number(self) -> u8 {
        self.index() + 1
    }

    /// Convert from a zero-based index.
    #[inline]
    pub fn from_index(idx: u8) -> Option<Player> {
        match idx {
            0 => Some(Player::One),
            1 => Some(Player::Two),
            _ => None,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player {}", self.number())
    }
}

// ============================================================================
// PIECES
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Height {
    #[display("tall")]
    Tall,
    #[display("short")]
    Short,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[display("dark")]
    Dark,
    #[display("light")]
    Light,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[display("round")]
    Round,
    #[display("square")]
    Square,
}

/// Identifier of one of the 16 pieces (0-15).
///
/// Displays as the 4-character piece code, e.g. `tdro`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PieceId(u8);

impl PieceId {
    const SHORT: u8 = 0b1000;
    const LIGHT: u8 = 0b0100;
    const SQUARE: u8 = 0b0010;
    const SOLID: u8 = 0b0001;
    /// Mask covering all four attribute bits.
    pub const ATTR_MASK: u8 = 0b1111;
    /// Number of pieces in a set.
    pub const COUNT: u8 = 16;

    /// Create an id, rejecting anything outside 0-15.
    #[inline]
    pub fn new(id: u8) -> Option<PieceId> {
        (id < Self::COUNT).then_some(PieceId(id))
    }

    /// Raw id, which is also the attribute bits.
    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }

    /// Iterate over all 16 ids in catalog order.
    pub fn all() -> impl Iterator<Item = PieceId> {
        (0..Self::COUNT).map(PieceId)
    }

    #[inline]
    pub fn height(self) -> Height {
        if self.0 & Self::SHORT != 0 {
            Height::Short
        } else {
            Height::Tall
        }
    }

    #[inline]
    pub fn color(self) -> Color {
        if self.0 & Self::LIGHT != 0 {
            Color::Light
        } else {
            Color::Dark
        }
    }

    #[inline]
    pub fn shape(self) -> Shape {
        if self.0 & Self::SQUARE != 0 {
            Shape::Square
        } else {
            Shape::Round
        }
    }

    #[inline]
    pub fn has_hole(self) -> bool {
        self.0 & Self::SOLID == 0
    }

    /// Parse a 4-character piece code such as `tdro` or `slsx`.
    pub fn from_code(code: &str) -> Option<PieceId> {
        let [h, c, s, o] = code.as_bytes() else {
            return None;
        };
        let mut bits = 0;
        match h {
            b't' => {}
            b's' => bits |= Self::SHORT,
            _ => return None,
        }
        match c {
            b'd' => {}
            b'l' => bits |= Self::LIGHT,
            _ => return None,
        }
        match s {
            b'r' => {}
            b's' => bits |= Self::SQUARE,
            _ => return None,
        }
        match o {
            b'o' => {}
            b'x' => bits |= Self::SOLID,
            _ => return None,
        }
        Some(PieceId(bits))
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let height = if self.0 & Self::SHORT != 0 { 's' } else { 't' };
        let color = if self.0 & Self::LIGHT != 0 { 'l' } else { 'd' };
        let shape = if self.0 & Self::SQUARE != 0 { 's' } else { 'r' };
        let hole = if self.0 & Self::SOLID != 0 { 'x' } else { 'o' };
        write!(f, "{height}{color}{shape}{hole}")
    }
}

impl TryFrom<u8> for PieceId {
    type Error = CommandError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        PieceId::new(id).ok_or(CommandError::UnknownPiece { id })
    }
}

impl From<PieceId> for u8 {
    fn from(id: PieceId) -> u8 {
        id.0
    }
}

/// A game piece. Attributes never change once the catalog is built.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize)]
pub struct Piece {
    pub id: PieceId,
    pub height: Height,
    pub color: Color,
    pub shape: Shape,
    pub hole: bool,
}

impl Piece {
    pub fn from_id(id: PieceId) -> Piece {
        Piece {
            id,
            height: id.height(),
            color: id.color(),
            shape: id.shape(),
            hole: id.has_hole(),
        }
    }

    /// Compact code: height, color, shape initials plus `o` (hole) or `x` (solid).
    pub fn code(&self) -> String {
        self.id.to_string()
    }

    /// Human-readable description, e.g. "tall, dark, round, hole".
    pub fn title(&self) -> String {
        let hole = if self.hole { "hole" } else { "solid" };
        format!("{}, {}, {}, {}", self.height, self.color, self.shape, hole)
    }

    /// Image path the frontend loads for this piece.
    pub fn asset_path(&self) -> String {
        format!("./pieces/{}.png", self.id)
    }
}

/// The 16 pieces together with their `used` flags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    pieces: [Piece; PieceId::COUNT as usize],
    /// Bit i set when piece i is on the board.
    used: u16,
}

impl Catalog {
    /// Build the full set, one piece per attribute combination, all unused.
    pub fn build() -> Catalog {
        Catalog {
            pieces: std::array::from_fn(|i| Piece::from_id(PieceId(i as u8))),
            used: 0,
        }
    }

    #[inline]
    pub fn get(&self, id: PieceId) -> &Piece {
        &self.pieces[id.0 as usize]
    }

    #[inline]
    pub fn is_used(&self, id: PieceId) -> bool {
        self.used & (1 << id.0) != 0
    }

    /// Raw used mask (bit i = piece i).
    #[inline]
    pub fn used_mask(&self) -> u16 {
        self.used
    }

    pub fn used_count(&self) -> u32 {
        self.used.count_ones()
    }

    /// All pieces in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.pieces.iter()
    }

    /// Pieces still available for selection, in id order.
    pub fn unused(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.pieces.iter().filter(|p| !self.is_used(p.id))
    }

    #[inline]
    pub(crate) fn mark_used(&mut self, id: PieceId) {
        self.used |= 1 << id.0;
    }

    #[inline]
    pub(crate) fn restore(&mut self, used: u16) {
        self.used = used;
    }

    #[inline]
    pub(crate) fn clear(&mut self) {
        self.used = 0;
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::build()
    }
}

// ============================================================================
// BOARD
// ============================================================================

/// Position on the 4x4 board (0-15), row-major.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct Pos(u8);

impl Pos {
    pub const SIDE: u8 = 4;
    pub const COUNT: u8 = 16;

    /// Create a position from row and column, or `None` if either is off the board.
    #[inline]
    pub fn new(row: u8, col: u8) -> Option<Pos> {
        (row < Self::SIDE && col < Self::SIDE).then(|| Pos(row * Self::SIDE + col))
    }

    #[inline]
    pub fn from_index(idx: u8) -> Option<Pos> {
        (idx < Self::COUNT).then_some(Pos(idx))
    }

    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn row(self) -> u8 {
        self.0 / Self::SIDE
    }

    #[inline]
    pub fn col(self) -> u8 {
        self.0 % Self::SIDE
    }

    /// Iterate over all 16 positions.
    pub fn all() -> impl Iterator<Item = Pos> {
        (0..Self::COUNT).map(Pos)
    }
}

/// Serialized as `[row, col]`.
impl Serialize for Pos {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.row(), self.col()).serialize(serializer)
    }
}

/// Compact 4x4 board. `Copy`, so history snapshots hold it by value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Board {
    cells: u64,
    occupied: u16,
}

impl Board {
    /// Bits per cell (one piece id).
    const CELL_BITS: u32 = 4;
    const CELL_MASK: u64 = 0b1111;

    /// The 10 lines: rows 0-3, columns 0-3, main diagonal, anti-diagonal.
    pub const LINES: [[Pos; 4]; 10] = [
        [Pos(0), Pos(1), Pos(2), Pos(3)],
        [Pos(4), Pos(5), Pos(6), Pos(7)],
        [Pos(8), Pos(9), Pos(10), Pos(11)],
        [Pos(12), Pos(13), Pos(14), Pos(15)],
        [Pos(0), Pos(4), Pos(8), Pos(12)],
        [Pos(1), Pos(5), Pos(9), Pos(13)],
        [Pos(2), Pos(6), Pos(10), Pos(14)],
        [Pos(3), Pos(7), Pos(11), Pos(15)],
        [Pos(0), Pos(5), Pos(10), Pos(15)],
        [Pos(3), Pos(6), Pos(9), Pos(12)],
    ];
    const MAIN_DIAGONAL: usize = 8;
    const ANTI_DIAGONAL: usize = 9;

    /// Create an empty board.
    #[inline]
    pub fn new() -> Board {
        Board::default()
    }

    /// Get the piece at a position, if any.
    #[inline]
    pub fn get(&self, pos: Pos) -> Option<PieceId> {
        if self.occupied & (1 << pos.0) == 0 {
            return None;
        }
        let bits = (self.cells >> (pos.0 as u32 * Self::CELL_BITS)) & Self::CELL_MASK;
        Some(PieceId(bits as u8))
    }

    #[inline]
    pub fn is_empty(&self, pos: Pos) -> bool {
        self.occupied & (1 << pos.0) == 0
    }

    /// Put a piece on an empty cell.
    #[inline]
    pub fn place(&mut self, pos: Pos, piece: PieceId) {
        debug_assert!(self.is_empty(pos), "cell {} already occupied", pos.0);
        let shift = pos.0 as u32 * Self::CELL_BITS;
        self.cells = (self.cells & !(Self::CELL_MASK << shift)) | ((piece.0 as u64) << shift);
        self.occupied |= 1 << pos.0;
    }

    /// Number of occupied cells.
    #[inline]
    pub fn count(&self) -> u32 {
        self.occupied.count_ones()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.occupied == u16::MAX
    }

    /// Board contents as rows of optional piece ids.
    pub fn rows(&self) -> [[Option<PieceId>; 4]; 4] {
        let mut rows = [[None; 4]; 4];
        for pos in Pos::all() {
            rows[pos.row() as usize][pos.col() as usize] = self.get(pos);
        }
        rows
    }

    /// The pieces on a line, or `None` if any cell is empty.
    pub fn line_pieces(&self, line: &[Pos; 4]) -> Option<[PieceId; 4]> {
        let [a, b, c, d] = *line;
        Some([self.get(a)?, self.get(b)?, self.get(c)?, self.get(d)?])
    }

    /// Whether a full line wins.
    pub fn is_winning_line(&self, line: &[Pos; 4]) -> bool {
        self.line_pieces(line).is_some_and(shares_attribute)
    }

    /// Lines that pass through a cell: its row, its column, and each
    /// diagonal it lies on, in that order.
    pub fn lines_through(pos: Pos) -> impl Iterator<Item = &'static [Pos; 4]> {
        let (row, col) = (pos.row(), pos.col());
        let main = (row == col).then_some(Self::MAIN_DIAGONAL);
        let anti = (row + col == Pos::SIDE - 1).then_some(Self::ANTI_DIAGONAL);
        [Some(row as usize), Some(Pos::SIDE as usize + col as usize), main, anti]
            .into_iter()
            .flatten()
            .map(|idx| &Self::LINES[idx])
    }

    /// Find a winning line through the cell that was just filled.
    ///
    /// Only those lines can have changed since the previous check, so this
    /// agrees with [`Board::check_all_lines`] as long as it runs after every
    /// placement.
    pub fn winning_line_through(&self, pivot: Pos) -> Option<[Pos; 4]> {
        Self::lines_through(pivot)
            .find(|line| self.is_winning_line(line))
            .copied()
    }

    /// Scan all 10 lines and return the first winning one.
    pub fn check_all_lines(&self) -> Option<[Pos; 4]> {
        Self::LINES.iter().find(|line| self.is_winning_line(line)).copied()
    }
}

/// Attribute bits on which all four pieces agree.
///
/// A bit is shared when it is set on every piece or clear on every piece.
#[inline]
pub fn shared_attributes(pieces: [PieceId; 4]) -> u8 {
    let all_set = pieces.iter().fold(PieceId::ATTR_MASK, |acc, p| acc & p.0);
    let all_clear = pieces.iter().fold(PieceId::ATTR_MASK, |acc, p| acc & !p.0);
    all_set | all_clear
}

/// Four pieces form a winning line when at least one attribute is shared.
#[inline]
pub fn shares_attribute(pieces: [PieceId; 4]) -> bool {
    shared_attributes(pieces) != 0
}
