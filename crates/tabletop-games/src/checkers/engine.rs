//! Checkers move generation.
//!
//! Seat 0 ("player1") starts on the bottom rows and moves toward row 0;
//! seat 1 starts on the top rows and moves toward the last row. Men step
//! diagonally forward, kings in all four diagonal directions.
//!
//! Captures are mandatory for the whole side: if any piece of the side to
//! move can jump, only jumps are legal that turn. A jump lands two cells
//! away over an opponent piece and continues from the landing cell until
//! no further jump exists or the piece is crowned. Every such terminating
//! chain is offered as its own move, short branches included.

use serde::{Deserialize, Serialize};
use tabletop_protocol::Seat;

const MAN_DIRS_UP: [(isize, isize); 2] = [(-1, -1), (-1, 1)];
const MAN_DIRS_DOWN: [(isize, isize); 2] = [(1, -1), (1, 1)];
const KING_DIRS: [(isize, isize); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];

/// A board coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    fn offset(self, dr: isize, dc: isize, size: usize) -> Option<Cell> {
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        (row < size && col < size).then_some(Cell { row, col })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub owner: Seat,
    pub king: bool,
}

impl Piece {
    pub const fn man(owner: Seat) -> Self {
        Self { owner, king: false }
    }

    pub const fn king(owner: Seat) -> Self {
        Self { owner, king: true }
    }

    fn directions(self) -> &'static [(isize, isize)] {
        if self.king {
            &KING_DIRS
        } else if self.owner == Seat(0) {
            &MAN_DIRS_UP
        } else {
            &MAN_DIRS_DOWN
        }
    }
}

/// One candidate move: a step, or a capture chain with every jumped cell
/// in jump order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceMove {
    pub from: Cell,
    pub to: Cell,
    #[serde(default)]
    pub captured: Vec<Cell>,
}

impl PieceMove {
    pub fn is_capture(&self) -> bool {
        !self.captured.is_empty()
    }

    /// Whether `other` ends on the same cell and takes the same pieces,
    /// regardless of the order the jumps are listed in.
    pub fn same_result(&self, other: &PieceMove) -> bool {
        if self.from != other.from || self.to != other.to {
            return false;
        }
        let mut a = self.captured.clone();
        let mut b = other.captured.clone();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }
}

/// A square board, row-major. Serializes as rows of optional pieces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    rows: Vec<Vec<Option<Piece>>>,
}

impl Board {
    /// Pieces per side fill this many rows at each end.
    pub fn rows_per_side(size: usize) -> usize {
        if size >= 10 { 4 } else { 3 }
    }

    pub fn empty(size: usize) -> Self {
        Self {
            rows: vec![vec![None; size]; size],
        }
    }

    /// The opening position: men on the dark squares (`(row + col)` odd)
    /// of the first rows on each side.
    pub fn standard(size: usize) -> Self {
        let mut board = Self::empty(size);
        let per_side = Self::rows_per_side(size).min(size / 2);
        for row in 0..size {
            let owner = if row < per_side {
                Seat(1)
            } else if row >= size - per_side {
                Seat(0)
            } else {
                continue;
            };
            for col in 0..size {
                if (row + col) % 2 == 1 {
                    board.rows[row][col] = Some(Piece::man(owner));
                }
            }
        }
        board
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.size() && cell.col < self.size()
    }

    pub fn get(&self, cell: Cell) -> Option<Piece> {
        self.rows.get(cell.row)?.get(cell.col).copied().flatten()
    }

    pub fn set(&mut self, cell: Cell, piece: Option<Piece>) {
        if let Some(slot) = self.rows.get_mut(cell.row).and_then(|r| r.get_mut(cell.col)) {
            *slot = piece;
        }
    }

    pub fn count(&self, owner: Seat) -> usize {
        self.pieces(owner).count()
    }

    /// Cells holding a piece of `owner`, in row-major order.
    pub fn pieces(&self, owner: Seat) -> impl Iterator<Item = Cell> + '_ {
        self.rows.iter().enumerate().flat_map(move |(row, cells)| {
            cells.iter().enumerate().filter_map(move |(col, piece)| {
                piece
                    .filter(|p| p.owner == owner)
                    .map(|_| Cell::new(row, col))
            })
        })
    }

    fn promotion_row(&self, owner: Seat) -> usize {
        if owner == Seat(0) { 0 } else { self.size() - 1 }
    }

    /// Moves the piece, removes captured pieces and crowns a man that
    /// reaches the far row. Returns `true` if the piece was crowned.
    pub fn apply(&mut self, mv: &PieceMove) -> bool {
        let Some(mut piece) = self.get(mv.from) else {
            return false;
        };
        self.set(mv.from, None);
        for cell in &mv.captured {
            self.set(*cell, None);
        }
        let crowned = !piece.king && mv.to.row == self.promotion_row(piece.owner);
        piece.king |= crowned;
        self.set(mv.to, Some(piece));
        crowned
    }
}

// ---------------------------------------------------------------------------
// Move generation
// ---------------------------------------------------------------------------

/// Single jumps available to the piece on `from`.
fn single_jumps(board: &Board, from: Cell, piece: Piece) -> Vec<PieceMove> {
    let size = board.size();
    piece
        .directions()
        .iter()
        .filter_map(|&(dr, dc)| {
            let over = from.offset(dr, dc, size)?;
            let to = from.offset(2 * dr, 2 * dc, size)?;
            let victim = board.get(over)?;
            (victim.owner != piece.owner && board.get(to).is_none()).then(|| PieceMove {
                from,
                to,
                captured: vec![over],
            })
        })
        .collect()
}

fn chains_from(board: &Board, from: Cell, piece: Piece, depth: usize, out: &mut Vec<PieceMove>) {
    if depth == 0 {
        return;
    }
    for jump in single_jumps(board, from, piece) {
        let mut next = board.clone();
        let crowned = next.apply(&jump);
        if crowned {
            out.push(jump);
            continue;
        }
        let Some(moved) = next.get(jump.to) else {
            continue;
        };
        let mut further = Vec::new();
        chains_from(&next, jump.to, moved, depth - 1, &mut further);
        if further.is_empty() {
            out.push(jump);
        } else {
            for tail in further {
                let mut captured = jump.captured.clone();
                captured.extend(tail.captured);
                out.push(PieceMove {
                    from,
                    to: tail.to,
                    captured,
                });
            }
        }
    }
}

/// Every terminating capture chain for the piece on `from`. Empty if the
/// cell is empty or the piece cannot jump.
pub fn capture_chains(board: &Board, from: Cell) -> Vec<PieceMove> {
    let Some(piece) = board.get(from) else {
        return Vec::new();
    };
    // Each jump removes an opponent piece, so no chain is longer than
    // the opponent's piece count.
    let depth = board.count(opponent(piece.owner));
    let mut out = Vec::new();
    chains_from(board, from, piece, depth, &mut out);
    out
}

/// Non-capturing steps for the piece on `from`.
pub fn simple_moves(board: &Board, from: Cell) -> Vec<PieceMove> {
    let Some(piece) = board.get(from) else {
        return Vec::new();
    };
    let size = board.size();
    piece
        .directions()
        .iter()
        .filter_map(|&(dr, dc)| from.offset(dr, dc, size))
        .filter(|to| board.get(*to).is_none())
        .map(|to| PieceMove {
            from,
            to,
            captured: Vec::new(),
        })
        .collect()
}

/// Returns `true` if any piece of `side` has a capture.
pub fn has_capture(board: &Board, side: Seat) -> bool {
    board.pieces(side).any(|cell| {
        board
            .get(cell)
            .is_some_and(|piece| !single_jumps(board, cell, piece).is_empty())
    })
}

/// Every legal move for `side`: all capture chains if any exist,
/// otherwise all steps.
pub fn all_legal_moves(board: &Board, side: Seat) -> Vec<PieceMove> {
    let captures: Vec<_> = board
        .pieces(side)
        .flat_map(|cell| capture_chains(board, cell))
        .collect();
    if !captures.is_empty() {
        return captures;
    }
    board
        .pieces(side)
        .flat_map(|cell| simple_moves(board, cell))
        .collect()
}

/// Legal moves for the piece on `from` when `side` is to move.
///
/// Empty if the cell does not hold a piece of `side`, or if `side` must
/// capture and this piece has no capture of its own.
pub fn legal_moves(board: &Board, from: Cell, side: Seat) -> Vec<PieceMove> {
    match board.get(from) {
        Some(piece) if piece.owner == side => {}
        _ => return Vec::new(),
    }
    if has_capture(board, side) {
        capture_chains(board, from)
    } else {
        simple_moves(board, from)
    }
}

pub fn has_any_move(board: &Board, side: Seat) -> bool {
    board
        .pieces(side)
        .any(|cell| !capture_chains(board, cell).is_empty() || !simple_moves(board, cell).is_empty())
}

pub fn opponent(seat: Seat) -> Seat {
    if seat == Seat(0) { Seat(1) } else { Seat(0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P1: Seat = Seat(0);
    const P2: Seat = Seat(1);

    fn board_with(size: usize, pieces: &[(usize, usize, Piece)]) -> Board {
        let mut board = Board::empty(size);
        for &(row, col, piece) in pieces {
            board.set(Cell::new(row, col), Some(piece));
        }
        board
    }

    #[test]
    fn test_standard_board_piece_counts() {
        let eight = Board::standard(8);
        assert_eq!(eight.count(P1), 12);
        assert_eq!(eight.count(P2), 12);

        let ten = Board::standard(10);
        assert_eq!(ten.count(P1), 20);
        assert_eq!(ten.count(P2), 20);
    }

    #[test]
    fn test_standard_board_uses_odd_squares() {
        let board = Board::standard(8);
        assert!(board.pieces(P1).chain(board.pieces(P2)).all(|c| (c.row + c.col) % 2 == 1));
        assert_eq!(board.get(Cell::new(5, 0)), Some(Piece::man(P1)));
        assert_eq!(board.get(Cell::new(2, 3)), Some(Piece::man(P2)));
        assert_eq!(board.get(Cell::new(4, 1)), None);
    }

    #[test]
    fn test_simple_moves_men_move_forward_only() {
        let board = board_with(8, &[(4, 3, Piece::man(P1)), (3, 6, Piece::man(P2))]);

        let up: Vec<_> = simple_moves(&board, Cell::new(4, 3)).into_iter().map(|m| m.to).collect();
        assert_eq!(up, vec![Cell::new(3, 2), Cell::new(3, 4)]);

        let down: Vec<_> = simple_moves(&board, Cell::new(3, 6)).into_iter().map(|m| m.to).collect();
        assert_eq!(down, vec![Cell::new(4, 5), Cell::new(4, 7)]);
    }

    #[test]
    fn test_simple_moves_king_moves_all_directions() {
        let board = board_with(8, &[(4, 3, Piece::king(P1))]);
        assert_eq!(simple_moves(&board, Cell::new(4, 3)).len(), 4);
    }

    #[test]
    fn test_legal_moves_capture_is_mandatory_for_every_piece() {
        // P1 at (5,2) can jump (4,3); P1 at (5,6) has only quiet moves.
        let board = board_with(
            8,
            &[
                (5, 2, Piece::man(P1)),
                (5, 6, Piece::man(P1)),
                (4, 3, Piece::man(P2)),
            ],
        );

        assert!(legal_moves(&board, Cell::new(5, 6), P1).is_empty());
        let jumps = legal_moves(&board, Cell::new(5, 2), P1);
        assert_eq!(jumps.len(), 1);
        assert_eq!(jumps[0].to, Cell::new(3, 4));
        assert_eq!(jumps[0].captured, vec![Cell::new(4, 3)]);
    }

    #[test]
    fn test_legal_moves_other_sides_piece_is_empty() {
        let board = Board::standard(8);
        assert!(legal_moves(&board, Cell::new(2, 1), P1).is_empty());
        assert!(legal_moves(&board, Cell::new(4, 1), P1).is_empty());
    }

    #[test]
    fn test_capture_chains_collects_multi_jump() {
        let board = board_with(
            8,
            &[
                (6, 1, Piece::man(P1)),
                (5, 2, Piece::man(P2)),
                (3, 4, Piece::man(P2)),
                (0, 7, Piece::man(P2)),
            ],
        );

        let chains = capture_chains(&board, Cell::new(6, 1));
        assert_eq!(
            chains,
            vec![PieceMove {
                from: Cell::new(6, 1),
                to: Cell::new(2, 5),
                captured: vec![Cell::new(5, 2), Cell::new(3, 4)],
            }]
        );
    }

    #[test]
    fn test_capture_chains_offers_short_and_long_branches() {
        // Left branch stops after one jump, right branch takes two.
        let board = board_with(
            8,
            &[
                (6, 3, Piece::man(P1)),
                (5, 2, Piece::man(P2)),
                (5, 4, Piece::man(P2)),
                (3, 6, Piece::man(P2)),
            ],
        );

        let chains = capture_chains(&board, Cell::new(6, 3));
        assert_eq!(chains.len(), 2);
        assert!(chains.contains(&PieceMove {
            from: Cell::new(6, 3),
            to: Cell::new(4, 1),
            captured: vec![Cell::new(5, 2)],
        }));
        assert!(chains.contains(&PieceMove {
            from: Cell::new(6, 3),
            to: Cell::new(2, 7),
            captured: vec![Cell::new(5, 4), Cell::new(3, 6)],
        }));
    }

    #[test]
    fn test_capture_chains_stop_on_promotion() {
        // Landing on row 0 crowns the man; the king could jump (1,4) next
        // but the chain ends there.
        let board = board_with(
            8,
            &[
                (2, 1, Piece::man(P1)),
                (1, 2, Piece::man(P2)),
                (1, 4, Piece::man(P2)),
            ],
        );

        let chains = capture_chains(&board, Cell::new(2, 1));
        assert_eq!(
            chains,
            vec![PieceMove {
                from: Cell::new(2, 1),
                to: Cell::new(0, 3),
                captured: vec![Cell::new(1, 2)],
            }]
        );
    }

    #[test]
    fn test_capture_chains_king_does_not_rejump_taken_piece() {
        let board = board_with(8, &[(4, 3, Piece::king(P1)), (3, 4, Piece::man(P2))]);
        let chains = capture_chains(&board, Cell::new(4, 3));
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].captured, vec![Cell::new(3, 4)]);
    }

    #[test]
    fn test_apply_removes_captured_and_crowns() {
        let mut board = board_with(8, &[(2, 1, Piece::man(P1)), (1, 2, Piece::man(P2))]);
        let crowned = board.apply(&PieceMove {
            from: Cell::new(2, 1),
            to: Cell::new(0, 3),
            captured: vec![Cell::new(1, 2)],
        });

        assert!(crowned);
        assert_eq!(board.get(Cell::new(0, 3)), Some(Piece::king(P1)));
        assert_eq!(board.get(Cell::new(1, 2)), None);
        assert_eq!(board.get(Cell::new(2, 1)), None);
    }

    #[test]
    fn test_same_result_ignores_capture_order() {
        let a = PieceMove {
            from: Cell::new(6, 1),
            to: Cell::new(2, 5),
            captured: vec![Cell::new(5, 2), Cell::new(3, 4)],
        };
        let mut b = a.clone();
        b.captured.reverse();
        assert!(a.same_result(&b));

        b.captured.pop();
        assert!(!a.same_result(&b));
    }

    #[test]
    fn test_has_any_move_blocked_side() {
        let board = board_with(
            8,
            &[
                (6, 1, Piece::man(P2)),
                (7, 0, Piece::man(P1)),
                (7, 2, Piece::man(P1)),
            ],
        );
        assert!(!has_any_move(&board, P2));
        assert!(has_any_move(&board, P1));
    }
}
