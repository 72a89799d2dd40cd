use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::board::{Board, BoardError, Cell, Side};
use crate::bot::Bot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Coord { row, col }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub from: Coord,
    pub to: Coord,
}

impl Move {
    pub fn new(from: Coord, to: Coord) -> Self {
        Move { from, to }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// How a game of checkers is being driven. Fixed for the life of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Two humans sharing one machine.
    LocalHuman,
    /// Human plays black, the computer plays red.
    LocalCpu,
    /// Networked game, this process hosts and plays black.
    NetHost,
    /// Networked game, this process joined and plays red.
    NetJoin,
}

impl Mode {
    pub fn is_networked(self) -> bool {
        matches!(self, Mode::NetHost | Mode::NetJoin)
    }

    /// Side controlled by this process. For `LocalHuman` both sides are
    /// local; black is reported as the primary side.
    pub fn local_side(self) -> Side {
        match self {
            Mode::NetJoin => Side::Red,
            _ => Side::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Undecided,
    BlackWins,
    RedWins,
}

impl Outcome {
    pub fn win_for(side: Side) -> Outcome {
        match side {
            Side::Black => Outcome::BlackWins,
            Side::Red => Outcome::RedWins,
        }
    }

    pub fn winner(self) -> Option<Side> {
        match self {
            Outcome::Undecided => None,
            Outcome::BlackWins => Some(Side::Black),
            Outcome::RedWins => Some(Side::Red),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveResult {
    pub captured: bool,
    pub promoted: bool,
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("game is already over")]
    GameOver,
}

const BLACK_DIRS: [(i32, i32); 2] = [(1, -1), (1, 1)];
const RED_DIRS: [(i32, i32); 2] = [(-1, -1), (-1, 1)];
const KING_DIRS: [(i32, i32); 4] = [(1, -1), (1, 1), (-1, -1), (-1, 1)];

fn offset(board: &Board, from: Coord, dr: i32, dc: i32) -> Option<Coord> {
    let row = from.row as i32 + dr;
    let col = from.col as i32 + dc;
    if row < 0 || row >= board.dim() as i32 || col < 0 || col >= board.dim() as i32 {
        return None;
    }
    Some(Coord::new(row as usize, col as usize))
}

/// Legal destination squares for the piece at `from`. Jump candidates come
/// first. Once a jump has been made this turn only further jumps are open;
/// a piece that has already taken a plain step may not move again.
pub fn legal_destinations(board: &Board, from: Coord, has_jumped: bool, has_moved: bool) -> Vec<Coord> {
    let piece = board.get(from.row, from.col);
    let Some(side) = piece.owner() else {
        return Vec::new();
    };

    let directions: &[(i32, i32)] = if piece.is_king() {
        &KING_DIRS
    } else if side == Side::Black {
        &BLACK_DIRS
    } else {
        &RED_DIRS
    };

    let mut steps = Vec::new();
    let mut jumps = Vec::new();
    for &(dr, dc) in directions {
        let Some(adjacent) = offset(board, from, dr, dc) else {
            continue;
        };
        let neighbor = board.get(adjacent.row, adjacent.col);
        if neighbor == Cell::Empty {
            steps.push(adjacent);
        } else if neighbor.owner() == Some(side.opponent()) {
            if let Some(landing) = offset(board, adjacent, dr, dc) {
                if board.get(landing.row, landing.col) == Cell::Empty {
                    jumps.push(landing);
                }
            }
        }
    }

    if has_jumped {
        jumps
    } else if !has_moved {
        jumps.extend(steps);
        jumps
    } else {
        Vec::new()
    }
}

/// Relocate the piece at `from` to `to`, removing the jumped piece on a jump
/// and crowning a pawn that lands on its promotion row.
pub fn apply_move(board: &mut Board, from: Coord, to: Coord) -> MoveResult {
    let mut piece = board.get(from.row, from.col);
    let mut result = MoveResult::default();

    if from.row.abs_diff(to.row) > 1 {
        let mid = Coord::new((from.row + to.row) / 2, (from.col + to.col) / 2);
        board.set(mid.row, mid.col, Cell::Empty);
        result.captured = true;
    }

    if let Some(side) = piece.owner() {
        if !piece.is_king() && to.row == side.promotion_row(board.dim()) {
            piece = piece.promoted();
            result.promoted = true;
        }
    }

    board.set(to.row, to.col, piece);
    board.set(from.row, from.col, Cell::Empty);
    result
}

/// A side with no pieces left has lost. This is the sole win condition; being
/// unable to move is only a loss for the CPU (see `Game::play_cpu_turn`).
pub fn check_win(board: &Board) -> Outcome {
    if board.count(Side::Black) == 0 {
        Outcome::RedWins
    } else if board.count(Side::Red) == 0 {
        Outcome::BlackWins
    } else {
        Outcome::Undecided
    }
}

/// Per-turn bookkeeping: the side to move, the snapshot the turn can revert
/// to, the current selection with its cached legal destinations, and the
/// moved/jumped flags that gate continuation moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    side: Side,
    snapshot: Board,
    selected: Option<Coord>,
    legal: Vec<Coord>,
    moved: Option<Coord>,
    jumped: bool,
}

impl TurnState {
    fn new(side: Side, snapshot: Board) -> TurnState {
        TurnState { side, snapshot, selected: None, legal: Vec::new(), moved: None, jumped: false }
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.legal.clear();
    }
}

/// What a cell selection did to the turn in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// An owned piece was selected and its destinations computed.
    Selected,
    /// The selected piece was clicked again and released.
    Deselected,
    /// A legal destination was clicked and the piece moved there.
    Moved(MoveResult),
    /// An illegal destination was clicked; the whole turn was reverted.
    Canceled,
    /// The click did not apply (not an owned piece, piece lock, game over).
    Rejected,
}

/// One game of checkers: the board plus the turn state machine that the UI,
/// the CPU and the network session all drive through the same entry points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    board: Board,
    turn: TurnState,
    mode: Mode,
    outcome: Outcome,
}

impl Game {
    pub fn new(dim: usize, rows: usize, mode: Mode) -> Game {
        Game::from_board(Board::new(dim, rows), mode)
    }

    pub fn from_board(board: Board, mode: Mode) -> Game {
        let turn = TurnState::new(Side::Black, board.clone());
        Game { board, turn, mode, outcome: Outcome::Undecided }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn side_to_move(&self) -> Side {
        self.turn.side
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn selected(&self) -> Option<Coord> {
        self.turn.selected
    }

    /// Destinations of the current selection, for move hints.
    pub fn legal_moves(&self) -> &[Coord] {
        &self.turn.legal
    }

    pub fn has_moved(&self) -> bool {
        self.turn.moved.is_some()
    }

    pub fn has_jumped(&self) -> bool {
        self.turn.jumped
    }

    /// Handle a click on a board cell. This is the whole human-input state
    /// machine: selecting a piece, releasing it, moving it, or cancelling
    /// the turn on an invalid destination.
    pub fn select(&mut self, at: Coord) -> SelectOutcome {
        if self.outcome != Outcome::Undecided {
            return SelectOutcome::Rejected;
        }
        if at.row >= self.board.dim() || at.col >= self.board.dim() {
            return SelectOutcome::Rejected;
        }

        if let Some(selected) = self.turn.selected {
            if self.turn.legal.contains(&at) {
                let result = apply_move(&mut self.board, selected, at);
                if result.captured {
                    self.turn.jumped = true;
                }
                self.turn.moved = Some(at);
                self.turn.clear_selection();
                return SelectOutcome::Moved(result);
            }
            if at == selected {
                self.turn.clear_selection();
                return SelectOutcome::Deselected;
            }
            self.cancel_turn();
            return SelectOutcome::Canceled;
        }

        if self.board.get(at.row, at.col).owner() != Some(self.turn.side) {
            return SelectOutcome::Rejected;
        }
        // A piece that has moved this turn locks the selection: the only
        // continuation allowed is that same piece chaining further jumps.
        if let Some(moved) = self.turn.moved {
            if moved != at {
                return SelectOutcome::Rejected;
            }
        }
        self.turn.selected = Some(at);
        self.turn.legal =
            legal_destinations(&self.board, at, self.turn.jumped, self.turn.moved.is_some());
        SelectOutcome::Selected
    }

    /// Revert the board to the start-of-turn snapshot and drop all selection
    /// state. Also the handler for an explicit cancel input.
    pub fn cancel_turn(&mut self) {
        self.board = self.turn.snapshot.clone();
        self.turn.clear_selection();
        self.turn.moved = None;
        self.turn.jumped = false;
    }

    /// Commit the turn: the current board becomes the new snapshot, the other
    /// side is handed the move, and the win condition is checked.
    pub fn end_turn(&mut self) -> Outcome {
        if self.outcome != Outcome::Undecided {
            return self.outcome;
        }
        self.turn.clear_selection();
        self.turn.moved = None;
        self.turn.jumped = false;
        self.turn.snapshot = self.board.clone();
        self.turn.side = self.turn.side.opponent();
        self.outcome = check_win(&self.board);
        self.outcome
    }

    /// Overwrite the board wholesale with the state the peer sent and commit
    /// the remote turn. The payload is format-checked but not legality-checked;
    /// the relay protocol trusts the peer's rules engine.
    pub fn apply_remote_board(&mut self, cells: &str) -> Result<Outcome, BoardError> {
        self.board = Board::deserialize(cells, self.board.dim())?;
        Ok(self.end_turn())
    }

    /// `side` concedes; their opponent wins immediately.
    pub fn forfeit(&mut self, side: Side) -> Outcome {
        self.outcome = Outcome::win_for(side.opponent());
        self.outcome
    }

    /// Let `bot` play out the whole turn for the side to move: one scored
    /// opening move, then randomly chosen jump continuations while any are
    /// open. A CPU with no move at all loses on the spot.
    pub fn play_cpu_turn(&mut self, bot: &mut dyn Bot) -> Result<Outcome, GameError> {
        if self.outcome != Outcome::Undecided {
            return Err(GameError::GameOver);
        }
        let side = self.turn.side;
        let Some(opening) = bot.choose_move(&self.board, side) else {
            self.outcome = Outcome::win_for(side.opponent());
            return Ok(self.outcome);
        };

        let result = apply_move(&mut self.board, opening.from, opening.to);
        let mut at = opening.to;
        let mut jumped = result.captured;
        loop {
            let options = legal_destinations(&self.board, at, jumped, true);
            if options.is_empty() {
                break;
            }
            let Some(next) = bot.choose_continuation(&options) else {
                break;
            };
            let result = apply_move(&mut self.board, at, next);
            jumped |= result.captured;
            at = next;
        }
        Ok(self.end_turn())
    }
}
