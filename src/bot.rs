use rand::seq::SliceRandom;

use crate::board::{Board, Side};
use crate::game::{Coord, Move, legal_destinations};

/// A computer player. `choose_move` opens the turn; `choose_continuation`
/// picks among the jump chains that stay open after it.
pub trait Bot: Send {
    /// Get the name of the bot
    fn name(&self) -> &str;

    /// Opening move for the turn, or `None` when no piece can move.
    fn choose_move(&mut self, board: &Board, side: Side) -> Option<Move>;

    /// Next landing square while a jump chain is open.
    fn choose_continuation(&mut self, options: &[Coord]) -> Option<Coord> {
        options.first().copied()
    }
}

/// The stock CPU opponent: favors captures and crowning moves, breaks ties
/// uniformly at random, and chains jumps at random until none remain.
pub struct HeuristicBot {
    name: String,
}

impl HeuristicBot {
    pub fn new(name: String) -> Self {
        HeuristicBot { name }
    }

    fn score_move(&self, board: &Board, side: Side, mv: Move) -> i32 {
        let mut score = 0;
        if mv.from.row.abs_diff(mv.to.row) >= 2 {
            score += 1;
        }
        let piece = board.get(mv.from.row, mv.from.col);
        if !piece.is_king() && mv.to.row == side.promotion_row(board.dim()) {
            score += 1;
        }
        score
    }
}

impl Bot for HeuristicBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn choose_move(&mut self, board: &Board, side: Side) -> Option<Move> {
        let mut candidates = Vec::new();
        for row in 0..board.dim() {
            for col in 0..board.dim() {
                let from = Coord::new(row, col);
                if board.get(row, col).owner() != Some(side) {
                    continue;
                }
                for to in legal_destinations(board, from, false, false) {
                    candidates.push(Move::new(from, to));
                }
            }
        }
        if candidates.is_empty() {
            return None;
        }

        // Shuffle before the scan so equal scores are settled uniformly at
        // random; the scan only replaces on a strictly higher score.
        let mut rng = rand::thread_rng();
        candidates.shuffle(&mut rng);
        let mut best = candidates[0];
        let mut best_score = self.score_move(board, side, best);
        for &mv in &candidates[1..] {
            let score = self.score_move(board, side, mv);
            if score > best_score {
                best = mv;
                best_score = score;
            }
        }
        Some(best)
    }

    fn choose_continuation(&mut self, options: &[Coord]) -> Option<Coord> {
        options.choose(&mut rand::thread_rng()).copied()
    }
}

/// Plays the first move it finds. Kept around for tests that need a
/// deterministic opponent.
pub struct FirstMoveBot {
    name: String,
}

impl FirstMoveBot {
    pub fn new(name: String) -> Self {
        FirstMoveBot { name }
    }
}

impl Bot for FirstMoveBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn choose_move(&mut self, board: &Board, side: Side) -> Option<Move> {
        for row in 0..board.dim() {
            for col in 0..board.dim() {
                let from = Coord::new(row, col);
                if board.get(row, col).owner() != Some(side) {
                    continue;
                }
                if let Some(&to) = legal_destinations(board, from, false, false).first() {
                    return Some(Move::new(from, to));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;
    use crate::game::{Game, Mode, Outcome};

    fn board_with(pieces: &[(usize, usize, Cell)]) -> Board {
        let mut board = Board::empty(8);
        for &(row, col, cell) in pieces {
            board.set(row, col, cell);
        }
        board
    }

    #[test]
    fn test_heuristic_prefers_capture() {
        // Red to move: one pawn has a capture, the others only plain steps.
        let board = board_with(&[
            (5, 4, Cell::RedPawn),
            (4, 3, Cell::BlackPawn),
            (6, 0, Cell::RedPawn),
            (7, 7, Cell::RedPawn),
        ]);
        let mut bot = HeuristicBot::new("cpu".to_string());
        for _ in 0..20 {
            let mv = bot.choose_move(&board, Side::Red).unwrap();
            assert_eq!(mv, Move::new(Coord::new(5, 4), Coord::new(3, 2)));
        }
    }

    #[test]
    fn test_heuristic_prefers_crowning() {
        let board = board_with(&[(1, 2, Cell::RedPawn), (5, 6, Cell::RedPawn)]);
        let mut bot = HeuristicBot::new("cpu".to_string());
        for _ in 0..20 {
            let mv = bot.choose_move(&board, Side::Red).unwrap();
            assert_eq!(mv.from, Coord::new(1, 2));
            assert_eq!(mv.to.row, 0);
        }
    }

    #[test]
    fn test_heuristic_crowning_does_not_score_for_kings() {
        // A king stepping back onto the promotion row gets no bonus, so the
        // capture elsewhere must win.
        let board = board_with(&[
            (1, 2, Cell::RedKing),
            (5, 4, Cell::RedPawn),
            (4, 3, Cell::BlackPawn),
        ]);
        let mut bot = HeuristicBot::new("cpu".to_string());
        for _ in 0..20 {
            let mv = bot.choose_move(&board, Side::Red).unwrap();
            assert_eq!(mv.from, Coord::new(5, 4));
        }
    }

    #[test]
    fn test_no_moves_returns_none() {
        // Lone red pawn in the corner, both its step and its jump blocked.
        let board = board_with(&[
            (7, 7, Cell::RedPawn),
            (6, 6, Cell::BlackPawn),
            (5, 5, Cell::BlackPawn),
        ]);
        let mut bot = HeuristicBot::new("cpu".to_string());
        assert!(bot.choose_move(&board, Side::Red).is_none());
    }

    #[test]
    fn test_stuck_cpu_loses_immediately() {
        let board = board_with(&[
            (7, 7, Cell::RedPawn),
            (6, 6, Cell::BlackPawn),
            (5, 5, Cell::BlackPawn),
        ]);
        let mut game = Game::from_board(board, Mode::LocalCpu);
        game.end_turn(); // hand the move to red, the CPU side
        let mut bot = HeuristicBot::new("cpu".to_string());
        let outcome = game.play_cpu_turn(&mut bot).unwrap();
        assert_eq!(outcome, Outcome::BlackWins);
    }

    #[test]
    fn test_cpu_chains_double_jump() {
        // Red at (6, 1) must jump to (4, 3) and the chain to (2, 5) stays
        // open, so the whole turn removes both black pawns.
        let board = board_with(&[
            (6, 1, Cell::RedPawn),
            (5, 2, Cell::BlackPawn),
            (3, 4, Cell::BlackPawn),
            (0, 0, Cell::BlackKing),
        ]);
        let mut game = Game::from_board(board, Mode::LocalCpu);
        game.end_turn();
        let mut bot = HeuristicBot::new("cpu".to_string());
        let outcome = game.play_cpu_turn(&mut bot).unwrap();

        assert_eq!(outcome, Outcome::Undecided);
        assert_eq!(game.board().get(5, 2), Cell::Empty);
        assert_eq!(game.board().get(3, 4), Cell::Empty);
        assert_eq!(game.board().get(2, 5), Cell::RedPawn);
        assert_eq!(game.side_to_move(), Side::Black);
    }

    #[test]
    fn test_cpu_turn_ends_after_plain_step() {
        let board = board_with(&[(5, 4, Cell::RedPawn), (0, 0, Cell::BlackKing)]);
        let mut game = Game::from_board(board, Mode::LocalCpu);
        game.end_turn();
        let mut bot = FirstMoveBot::new("first".to_string());
        let outcome = game.play_cpu_turn(&mut bot).unwrap();

        assert_eq!(outcome, Outcome::Undecided);
        assert_eq!(game.board().count(Side::Red), 1);
        assert_eq!(game.side_to_move(), Side::Black);
    }
}
