use crate::board::{Color, Move, Piece, Position, PromotionTarget, Square};
use crate::error::{IllegalMoveError, RulesError};
use serde::Serialize;
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position as _, Role};

/// A legal move as reported by the rules collaborator
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LegalMove {
   #[serde(rename = "move")]
   pub mv: Move,
   pub piece: Piece,
   pub captured: Option<Piece>,
   /// SAN, including the check (`+`) or mate (`#`) suffix
   pub notation: String,
}

impl LegalMove {
   pub fn gives_check(&self) -> bool {
      self.notation.ends_with('+') || self.gives_mate()
   }

   pub fn gives_mate(&self) -> bool {
      self.notation.ends_with('#')
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GameStatus {
   Ongoing,
   Checkmate { winner: Color },
   Stalemate,
   InsufficientMaterial,
   ThreefoldRepetition,
}

impl GameStatus {
   pub fn is_over(self) -> bool {
      self != GameStatus::Ongoing
   }
}

/// Everything the decision system needs to know about chess
pub trait Rules: Clone + Send + Sync + 'static {
   fn position(&self) -> Position;

   fn load(&mut self, position: &Position) -> Result<(), RulesError>;

   /// Legal moves of the side to move, in generation order
   fn legal_moves(&self) -> Vec<LegalMove>;

   fn legal_moves_from(&self, square: Square) -> Vec<LegalMove> {
      self.legal_moves().into_iter().filter(|x| x.mv.from == square).collect()
   }

   fn apply(&mut self, a_move: Move) -> Result<LegalMove, IllegalMoveError>;

   fn turn(&self) -> Color;

   fn in_check(&self) -> bool;

   fn status(&self) -> GameStatus;
}

#[derive(Clone, Debug)]
pub struct Game {
   chess: Chess,
   // position keys (FEN without clocks) of every position reached, current one last
   seen: Vec<String>,
}

impl Game {
   pub fn new() -> Game {
      Game::from_chess(Chess::default())
   }

   pub fn from_fen(fen: &str) -> Result<Game, RulesError> {
      let fen: Fen = fen.trim().parse().map_err(|e| RulesError::Fen(format!("{}", e)))?;
      let chess: Chess = fen
         .into_position(CastlingMode::Standard)
         .map_err(|e| RulesError::Position(format!("{}", e)))?;
      Ok(Game::from_chess(chess))
   }

   fn from_chess(chess: Chess) -> Game {
      let mut game = Game { chess, seen: Vec::new() };
      game.seen.push(game.repetition_key());
      game
   }

   fn fen(&self) -> String {
      Fen::from_position(self.chess.clone(), EnPassantMode::Legal).to_string()
   }

   fn repetition_key(&self) -> String {
      self.fen().split_whitespace().take(4).collect::<Vec<_>>().join(" ")
   }

   fn describe(&self, m: &shakmaty::Move) -> Option<LegalMove> {
      let from = m.from()?;
      let from = to_square(from);
      let to = match *m {
         // shakmaty encodes castling as king-takes-rook; the coordinate form wants the king's destination
         shakmaty::Move::Castle { king, rook } => {
            let (king, rook) = (king as u8, rook as u8);
            let dest = if rook > king { king + 2 } else { king - 2 };
            Square::new(dest)?
         }
         _ => to_square(m.to()),
      };
      let mut after = self.chess.clone();
      after.play_unchecked(m);
      let suffix = if after.is_checkmate() {
         "#"
      } else if after.is_check() {
         "+"
      } else {
         ""
      };
      Some(LegalMove {
         mv: Move {
            from,
            to,
            promotion: m.promotion().and_then(to_promotion),
         },
         piece: to_piece(m.role()),
         captured: m.capture().map(to_piece),
         notation: format!("{}{}", San::from_move(&self.chess, m), suffix),
      })
   }
}

impl Default for Game {
   fn default() -> Game {
      Game::new()
   }
}

impl Rules for Game {
   fn position(&self) -> Position {
      Position::new(self.fen())
   }

   fn load(&mut self, position: &Position) -> Result<(), RulesError> {
      *self = Game::from_fen(position.as_str())?;
      Ok(())
   }

   fn legal_moves(&self) -> Vec<LegalMove> {
      self.chess.legal_moves().iter().filter_map(|m| self.describe(m)).collect()
   }

   fn apply(&mut self, a_move: Move) -> Result<LegalMove, IllegalMoveError> {
      let legal = self.chess.legal_moves();
      let found = legal
         .iter()
         .filter_map(|m| self.describe(m).map(|described| (m, described)))
         .find(|(_, described)| described.mv == a_move);
      match found {
         Some((m, described)) => {
            self.chess.play_unchecked(m);
            let key = self.repetition_key();
            self.seen.push(key);
            Ok(described)
         }
         None => Err(IllegalMoveError(a_move)),
      }
   }

   fn turn(&self) -> Color {
      match self.chess.turn() {
         shakmaty::Color::White => Color::White,
         shakmaty::Color::Black => Color::Black,
      }
   }

   fn in_check(&self) -> bool {
      self.chess.is_check()
   }

   fn status(&self) -> GameStatus {
      if self.chess.is_checkmate() {
         return GameStatus::Checkmate { winner: !self.turn() };
      }
      if self.chess.is_stalemate() {
         return GameStatus::Stalemate;
      }
      if self.chess.is_insufficient_material() {
         return GameStatus::InsufficientMaterial;
      }
      if let Some(current) = self.seen.last() {
         if self.seen.iter().filter(|x| *x == current).count() >= 3 {
            return GameStatus::ThreefoldRepetition;
         }
      }
      GameStatus::Ongoing
   }
}

fn to_square(sq: shakmaty::Square) -> Square {
   // both index squares as rank * 8 + file from a1
   Square::new(sq as u8).unwrap_or_else(|| unreachable!())
}

fn to_piece(role: Role) -> Piece {
   match role {
      Role::Pawn => Piece::Pawn,
      Role::Knight => Piece::Knight,
      Role::Bishop => Piece::Bishop,
      Role::Rook => Piece::Rook,
      Role::Queen => Piece::Queen,
      Role::King => Piece::King,
   }
}

fn to_promotion(role: Role) -> Option<PromotionTarget> {
   match role {
      Role::Knight => Some(PromotionTarget::Knight),
      Role::Bishop => Some(PromotionTarget::Bishop),
      Role::Rook => Some(PromotionTarget::Rook),
      Role::Queen => Some(PromotionTarget::Queen),
      _ => None,
   }
}
