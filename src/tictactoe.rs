//! Tic-tac-toe against a greedy computer opponent, with every human move gated
//! behind a quiz question.
//!
//! The opponent looks one ply ahead only (win, block, centre, random). A perfect
//! player can beat it; that is accepted.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::domain::Question;
use crate::quiz::shuffle_options;
use crate::rng::random_index;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Mark {
  X,
  O,
}

impl Mark {
  pub fn opponent(self) -> Mark {
    match self {
      Mark::X => Mark::O,
      Mark::O => Mark::X,
    }
  }
}

pub const PLAYER: Mark = Mark::X;
pub const COMPUTER: Mark = Mark::O;
pub const CENTER: usize = 4;

pub type Board = [Option<Mark>; 9];

const WINNING_LINES: [[usize; 3]; 8] = [
  [0, 1, 2], [3, 4, 5], [6, 7, 8], // rows
  [0, 3, 6], [1, 4, 7], [2, 5, 8], // columns
  [0, 4, 8], [2, 4, 6],            // diagonals
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "mark", rename_all = "snake_case")]
pub enum GameOutcome {
  Win(Mark),
  Draw,
}

/// Winner, draw, or None while the game is still open.
pub fn check_winner(board: &Board) -> Option<GameOutcome> {
  for [a, b, c] in WINNING_LINES {
    if let Some(m) = board[a] {
      if board[b] == Some(m) && board[c] == Some(m) {
        return Some(GameOutcome::Win(m));
      }
    }
  }
  if board.iter().all(Option::is_some) {
    return Some(GameOutcome::Draw);
  }
  None
}

fn empty_cells(board: &Board) -> Vec<usize> {
  (0..board.len()).filter(|&i| board[i].is_none()).collect()
}

/// First empty cell that would complete a line for `mark`.
fn completing_cell(board: &Board, mark: Mark) -> Option<usize> {
  empty_cells(board).into_iter().find(|&i| {
    let mut probe = *board;
    probe[i] = Some(mark);
    check_winner(&probe) == Some(GameOutcome::Win(mark))
  })
}

/// Pick the computer's cell: take a win, else block, else centre, else random.
/// None when the board is full.
pub fn computer_move<R: Rng + ?Sized>(board: &Board, computer: Mark, rng: &mut R) -> Option<usize> {
  if let Some(i) = completing_cell(board, computer) {
    return Some(i);
  }
  if let Some(i) = completing_cell(board, computer.opponent()) {
    return Some(i);
  }
  if board[CENTER].is_none() {
    return Some(CENTER);
  }
  let free = empty_cells(board);
  random_index(rng, free.len()).map(|i| free[i])
}

/// Cell the player picked and the question that has to be answered to claim it.
#[derive(Clone, Debug, Serialize)]
pub struct PendingMove {
  pub cell: usize,
  pub question: Question,
}

/// Result of answering the gating question.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MoveResult {
  pub correct: bool,
  pub correct_index: usize,
  /// Cell marked for the player; None when the answer was wrong.
  pub placed: Option<usize>,
  pub outcome: Option<GameOutcome>,
}

#[derive(Clone, Debug)]
pub struct TicTacToeGame {
  board: Board,
  player_turn: bool,
  outcome: Option<GameOutcome>,
  pool: Vec<Question>,
  pending: Option<PendingMove>,
}

impl TicTacToeGame {
  pub fn new(pool: Vec<Question>) -> Self {
    Self { board: [None; 9], player_turn: true, outcome: None, pool, pending: None }
  }

  pub fn board(&self) -> &Board { &self.board }
  pub fn is_player_turn(&self) -> bool { self.player_turn }
  pub fn outcome(&self) -> Option<GameOutcome> { self.outcome }
  pub fn pending(&self) -> Option<&PendingMove> { self.pending.as_ref() }
  pub fn has_questions(&self) -> bool { !self.pool.is_empty() }

  /// Clear the board, keep the question pool.
  pub fn reset(&mut self) {
    self.board = [None; 9];
    self.player_turn = true;
    self.outcome = None;
    self.pending = None;
  }

  /// Player picks a cell. Returns the question gating the move, or None when the
  /// cell is taken, it is not the player's turn, the game is over, or the pool is empty.
  #[instrument(level = "debug", skip(self, rng))]
  pub fn select_cell<R: Rng + ?Sized>(&mut self, cell: usize, rng: &mut R) -> Option<&PendingMove> {
    if self.outcome.is_some() || !self.player_turn || self.pending.is_some() {
      debug!(target: "game", cell, "Cell pick ignored (not player's move)");
      return None;
    }
    if cell >= self.board.len() || self.board[cell].is_some() {
      debug!(target: "game", cell, "Cell pick ignored (occupied or off-board)");
      return None;
    }
    let Some(qi) = random_index(rng, self.pool.len()) else {
      warn!(target: "game", "No questions in pool; cannot gate move");
      return None;
    };
    let question = shuffle_options(&self.pool[qi], rng);
    self.pending = Some(PendingMove { cell, question });
    self.pending.as_ref()
  }

  /// Answer the pending question. Correct claims the cell; wrong forfeits the
  /// turn without a mark. Either way the computer moves next unless the game ended.
  #[instrument(level = "debug", skip(self))]
  pub fn submit_answer(&mut self, option: usize) -> Option<MoveResult> {
    let pending = self.pending.take()?;
    let correct = pending.question.is_correct(option);
    let mut placed = None;
    if correct {
      self.board[pending.cell] = Some(PLAYER);
      placed = Some(pending.cell);
      self.outcome = check_winner(&self.board);
    }
    if self.outcome.is_none() {
      self.player_turn = false;
    }
    info!(target: "game", cell = pending.cell, correct, outcome = ?self.outcome, "Player answered");
    Some(MoveResult { correct, correct_index: pending.question.correct_answer_index, placed, outcome: self.outcome })
  }

  /// Computer plays when it is its turn. Returns the cell it marked.
  #[instrument(level = "debug", skip(self, rng))]
  pub fn computer_turn<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<usize> {
    if self.player_turn || self.outcome.is_some() {
      return None;
    }
    let cell = computer_move(&self.board, COMPUTER, rng)?;
    self.board[cell] = Some(COMPUTER);
    self.outcome = check_winner(&self.board);
    if self.outcome.is_none() {
      self.player_turn = true;
    }
    info!(target: "game", cell, outcome = ?self.outcome, "Computer moved");
    Some(cell)
  }
}
