use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Color {
   White,
   Black,
}

impl std::ops::Not for Color {
   type Output = Color;
   fn not(self) -> Color {
      match self {
         Color::Black => Color::White,
         Color::White => Color::Black,
      }
   }
}

impl fmt::Display for Color {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      match self {
         Color::White => write!(f, "white"),
         Color::Black => write!(f, "black"),
      }
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Piece {
   Pawn,
   Rook,
   Knight,
   Bishop,
   Queen,
   King,
}

impl Piece {
   /// Material value used by the fallback evaluator
   pub fn value(self) -> i32 {
      match self {
         Piece::Pawn => 1,
         Piece::Knight => 3,
         Piece::Bishop => 3,
         Piece::Rook => 5,
         Piece::Queen => 9,
         Piece::King => 0,
      }
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PromotionTarget {
   Knight,
   Bishop,
   Rook,
   Queen,
}

impl PromotionTarget {
   pub fn piece(self) -> Piece {
      match self {
         PromotionTarget::Knight => Piece::Knight,
         PromotionTarget::Bishop => Piece::Bishop,
         PromotionTarget::Rook => Piece::Rook,
         PromotionTarget::Queen => Piece::Queen,
      }
   }
}

impl fmt::Display for PromotionTarget {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      let display = match self {
         PromotionTarget::Knight => "n",
         PromotionTarget::Bishop => "b",
         PromotionTarget::Rook => "r",
         PromotionTarget::Queen => "q",
      };
      write!(f, "{}", display)
   }
}

impl FromStr for PromotionTarget {
   type Err = String;

   fn from_str(s: &str) -> Result<PromotionTarget, String> {
      match s {
         "n" => Ok(PromotionTarget::Knight),
         "b" => Ok(PromotionTarget::Bishop),
         "r" => Ok(PromotionTarget::Rook),
         "q" => Ok(PromotionTarget::Queen),
         _ => Err(format!("Expected one of ASCII nbrq for promotion target, got {}", s)),
      }
   }
}

/// One of the 64 squares, indexed `rank * 8 + file` starting from a1
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
   pub fn new(index: u8) -> Option<Square> {
      if index < 64 {
         Some(Square(index))
      } else {
         None
      }
   }

   pub fn index(self) -> u8 {
      self.0
   }

   pub fn file(self) -> u8 {
      self.0 % 8
   }

   pub fn rank(self) -> u8 {
      self.0 / 8
   }
}

impl fmt::Display for Square {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      write!(f, "{}{}", (b'a' + self.file()) as char, self.rank() + 1)
   }
}

impl FromStr for Square {
   type Err = String;

   fn from_str(algebraic: &str) -> Result<Square, String> {
      if algebraic.len() != 2 {
         return Err(format!("{} not a valid algebraic location; wrong length", algebraic));
      }
      let file = match algebraic.as_bytes()[0] {
         f @ b'a'..=b'h' => f - b'a',
         file => {
            return Err(format!(
               "{} is not a valid algebraic file, expected a..=h",
               file as char
            ))
         }
      };
      let rank = match algebraic.as_bytes()[1] {
         r @ b'1'..=b'8' => r - b'1',
         rank => {
            return Err(format!(
               "{} is not a valid algebraic rank, expected 1..=8",
               rank as char
            ))
         }
      };
      Ok(Square(rank * 8 + file))
   }
}

impl Serialize for Square {
   fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
      serializer.collect_str(self)
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move {
   pub from: Square,
   pub to: Square,
   pub promotion: Option<PromotionTarget>,
}

impl fmt::Display for Move {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      write!(f, "{}{}", self.from, self.to)?;
      if let Some(promotion) = self.promotion {
         write!(f, "{}", promotion)?;
      }
      Ok(())
   }
}

impl FromStr for Move {
   type Err = String;

   fn from_str(s: &str) -> Result<Move, String> {
      if !s.is_ascii() || s.len() < 4 || s.len() > 5 {
         return Err(format!(
            "A full move has to be 4-5 ASCII bytes long, got a move ({}) that was {} bytes long",
            s,
            s.len()
         ));
      }
      let promotion = match s.get(4..5) {
         Some(target) => Some(target.parse::<PromotionTarget>()?),
         None => None,
      };
      Ok(Move {
         from: s[..2].parse()?,
         to: s[2..4].parse()?,
         promotion,
      })
   }
}

impl Serialize for Move {
   fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
      serializer.collect_str(self)
   }
}

/// Opaque board-state token (a FEN string). Only compared, never interpreted here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
   pub fn new(fen: impl Into<String>) -> Position {
      Position(fen.into())
   }

   pub fn start() -> Position {
      Position(START_FEN.into())
   }

   pub fn as_str(&self) -> &str {
      &self.0
   }
}

impl fmt::Display for Position {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      f.write_str(&self.0)
   }
}
