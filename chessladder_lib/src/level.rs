use serde::Serialize;
use std::fmt;

pub const LEVEL_COUNT: u8 = 15;
/// Deepest search any difficulty asks for
pub const MAX_DEPTH: u8 = 18;
pub const HARD_DEPTH: u8 = MAX_DEPTH;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Strategy {
   Random,
   Heuristic,
   Engine { depth: u8 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DifficultyLevel {
   pub id: u8,
   pub label: String,
   pub strategy: Strategy,
   pub reward: u32,
}

/// Ordered difficulty levels, fixed for the life of the process
#[derive(Clone, Debug)]
pub struct Ladder {
   levels: Vec<DifficultyLevel>,
}

impl Ladder {
   pub fn standard() -> Ladder {
      let levels = (1..=LEVEL_COUNT)
         .map(|id| {
            let strategy = match id {
               1 => Strategy::Random,
               2 => Strategy::Heuristic,
               n => Strategy::Engine {
                  depth: (2 + n).min(MAX_DEPTH),
               },
            };
            DifficultyLevel {
               id,
               label: format!("Level {}", id),
               strategy,
               reward: 10 * u32::from(id),
            }
         })
         .collect();
      Ladder { levels }
   }

   pub fn get(&self, id: u8) -> Option<&DifficultyLevel> {
      self.levels.iter().find(|x| x.id == id)
   }

   pub fn levels(&self) -> &[DifficultyLevel] {
      &self.levels
   }

   pub fn top(&self) -> u8 {
      self.levels.last().map(|x| x.id).unwrap_or(1)
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
   Level(u8),
   /// Fixed deep search, outside the ladder
   Hard,
}

impl Difficulty {
   pub fn strategy(self, ladder: &Ladder) -> Option<Strategy> {
      match self {
         Difficulty::Level(id) => ladder.get(id).map(|x| x.strategy),
         Difficulty::Hard => Some(Strategy::Engine { depth: HARD_DEPTH }),
      }
   }

   pub fn reward(self, ladder: &Ladder) -> u32 {
      match self {
         Difficulty::Level(id) => ladder.get(id).map(|x| x.reward).unwrap_or(0),
         Difficulty::Hard => ladder.get(ladder.top()).map(|x| x.reward).unwrap_or(0),
      }
   }
}

impl fmt::Display for Difficulty {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      match self {
         Difficulty::Level(id) => write!(f, "level {}", id),
         Difficulty::Hard => write!(f, "hard"),
      }
   }
}

/// Ladder progress of the running process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Progress {
   pub unlocked: u8,
   pub score: u32,
}

impl Default for Progress {
   fn default() -> Progress {
      Progress { unlocked: 1, score: 0 }
   }
}

impl Progress {
   pub fn can_select(&self, ladder: &Ladder, id: u8) -> bool {
      ladder.get(id).is_some() && id <= self.unlocked
   }

   /// Records a checkmate win by the human. Returns whether a new level was unlocked.
   pub fn record_win(&mut self, ladder: &Ladder, difficulty: Difficulty) -> bool {
      self.score += difficulty.reward(ladder);
      match difficulty {
         Difficulty::Level(id) if id >= self.unlocked && self.unlocked < ladder.top() => {
            self.unlocked += 1;
            true
         }
         _ => false,
      }
   }
}
