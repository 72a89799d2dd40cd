use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Board sizes offered by the setup menu
pub const DEFAULT_DIM: usize = 8;
pub const DEFAULT_ROWS: usize = 3;

/// One side of the game. Black moves first and advances toward the last row;
/// red advances toward row 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Black,
    Red,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Black => Side::Red,
            Side::Red => Side::Black,
        }
    }

    /// Row on which this side's pawns are crowned.
    pub fn promotion_row(self, dim: usize) -> usize {
        match self {
            Side::Black => dim - 1,
            Side::Red => 0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Black => write!(f, "Black"),
            Side::Red => write!(f, "Red"),
        }
    }
}

/// Contents of a single board square. The discriminants double as the wire
/// codes: even codes belong to black, odd codes to red, empty excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    RedPawn,
    BlackPawn,
    RedKing,
    BlackKing,
}

impl Cell {
    pub fn code(self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::RedPawn => 1,
            Cell::BlackPawn => 2,
            Cell::RedKing => 3,
            Cell::BlackKing => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Cell> {
        match code {
            0 => Some(Cell::Empty),
            1 => Some(Cell::RedPawn),
            2 => Some(Cell::BlackPawn),
            3 => Some(Cell::RedKing),
            4 => Some(Cell::BlackKing),
            _ => None,
        }
    }

    pub fn owner(self) -> Option<Side> {
        match self {
            Cell::Empty => None,
            Cell::RedPawn | Cell::RedKing => Some(Side::Red),
            Cell::BlackPawn | Cell::BlackKing => Some(Side::Black),
        }
    }

    pub fn is_king(self) -> bool {
        matches!(self, Cell::RedKing | Cell::BlackKing)
    }

    /// Crowned form of a pawn. Kings and empty squares are returned unchanged.
    pub fn promoted(self) -> Cell {
        match self {
            Cell::RedPawn => Cell::RedKing,
            Cell::BlackPawn => Cell::BlackKing,
            other => other,
        }
    }
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("board payload has {got} cells, expected {want}")]
    WrongLength { got: usize, want: usize },
    #[error("invalid cell code {0:?} in board payload")]
    BadCell(char),
}

/// An N x N checkers board. The board itself performs no rules validation;
/// legality is the move engine's concern. Deserialization is the one
/// exception, because its input arrives off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    dim: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// Starting position: `rows` rows of black pawns along the top, mirrored
    /// red pawns along the bottom, pieces on alternating squares.
    pub fn new(dim: usize, rows: usize) -> Board {
        let mut board = Board::empty(dim);
        for col in 0..dim / 2 {
            for row in 0..rows {
                board.set(row, col * 2 + row % 2, Cell::BlackPawn);
                let row = dim - (row + 1);
                board.set(row, col * 2 + row % 2, Cell::RedPawn);
            }
        }
        board
    }

    pub fn empty(dim: usize) -> Board {
        Board { dim, cells: vec![Cell::Empty; dim * dim] }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.cells[row * self.dim + col]
    }

    pub fn set(&mut self, row: usize, col: usize, cell: Cell) {
        self.cells[row * self.dim + col] = cell;
    }

    /// Row-major sequence of single-digit cell codes.
    pub fn serialize(&self) -> String {
        self.cells.iter().map(|c| char::from(b'0' + c.code())).collect()
    }

    pub fn deserialize(payload: &str, dim: usize) -> Result<Board, BoardError> {
        if payload.chars().count() != dim * dim {
            return Err(BoardError::WrongLength { got: payload.chars().count(), want: dim * dim });
        }
        let mut cells = Vec::with_capacity(dim * dim);
        for ch in payload.chars() {
            let code = ch.to_digit(10).and_then(|d| Cell::from_code(d as u8));
            match code {
                Some(cell) => cells.push(cell),
                None => return Err(BoardError::BadCell(ch)),
            }
        }
        Ok(Board { dim, cells })
    }

    /// Count of pieces owned by `side`.
    pub fn count(&self, side: Side) -> usize {
        self.cells.iter().filter(|c| c.owner() == Some(side)).count()
    }

    /// ASCII rendering for the demo binary and test diagnostics.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("   ");
        for col in 0..self.dim {
            out.push_str(&format!("{:2} ", col));
        }
        out.push('\n');
        for row in 0..self.dim {
            out.push_str(&format!("{:2} ", row));
            for col in 0..self.dim {
                let c = match self.get(row, col) {
                    Cell::Empty => '.',
                    Cell::RedPawn => 'r',
                    Cell::BlackPawn => 'b',
                    Cell::RedKing => 'R',
                    Cell::BlackKing => 'B',
                };
                out.push_str(&format!(" {} ", c));
            }
            out.push('\n');
        }
        out
    }
}
