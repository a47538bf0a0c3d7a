//! One human against the computer: turn order, difficulty and the ladder,
//! and the view handed to whatever draws the game.

use crate::board::{Color, Move, Position, Square};
use crate::error::SessionError;
use crate::evaluator;
use crate::hint::{HintCoordinator, LiveView};
use crate::level::{Difficulty, Ladder, Progress, Strategy};
use crate::orchestrator::{Deadlines, Orchestrator};
use crate::process::{Launch, ProcessLauncher};
use crate::rules::{GameStatus, LegalMove, Rules};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Where the move engine and the hint engine come from
pub struct Engines {
   pub moves: Arc<dyn Launch>,
   pub hints: Arc<dyn Launch>,
   pub deadlines: Deadlines,
}

impl Engines {
   /// Two independent processes of the same engine binary
   pub fn process(program: impl Into<PathBuf>, deadlines: Deadlines) -> Engines {
      let launcher = ProcessLauncher::new(program);
      Engines {
         moves: Arc::new(launcher.clone()),
         hints: Arc::new(launcher),
         deadlines,
      }
   }
}

#[derive(Clone, Copy, Debug)]
pub struct Settings {
   pub human: Color,
   pub difficulty: Difficulty,
   pub educative: bool,
   pub progress: Progress,
}

impl Default for Settings {
   fn default() -> Settings {
      Settings {
         human: Color::White,
         difficulty: Difficulty::Level(1),
         educative: false,
         progress: Progress::default(),
      }
   }
}

/// Everything a renderer needs to draw the game
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
   pub position: Position,
   pub turn: Color,
   pub human: Color,
   pub last_ai_move: Option<Move>,
   pub hint: Option<Move>,
   pub thinking: bool,
   pub over: bool,
   pub status: GameStatus,
   pub difficulty: Difficulty,
   pub unlocked: u8,
   pub score: u32,
   pub educative: bool,
}

pub struct Session<R: Rules> {
   game: R,
   initial: Position,
   ladder: Ladder,
   progress: Progress,
   difficulty: Difficulty,
   human: Color,
   educative: bool,
   thinking: bool,
   last_ai_move: Option<Move>,
   // the ladder has been updated for the finished game
   settled: bool,
   orchestrator: Orchestrator,
   hints: HintCoordinator,
   hint_task: Option<JoinHandle<()>>,
   live: watch::Sender<LiveView>,
   rng: StdRng,
}

impl<R: Rules> Session<R> {
   pub fn new(game: R, engines: Engines, settings: Settings) -> Result<Session<R>, SessionError> {
      let ladder = Ladder::standard();
      if let Difficulty::Level(id) = settings.difficulty {
         if ladder.get(id).is_none() {
            return Err(SessionError::NoSuchLevel(id));
         }
         if !settings.progress.can_select(&ladder, id) {
            return Err(SessionError::LevelLocked(id));
         }
      }
      let (live, view) = watch::channel(LiveView {
         position: game.position(),
         human_to_move: false,
         educative: settings.educative,
         thinking: false,
         over: false,
      });
      let mut session = Session {
         initial: game.position(),
         game,
         ladder,
         progress: settings.progress,
         difficulty: settings.difficulty,
         human: settings.human,
         educative: settings.educative,
         thinking: false,
         last_ai_move: None,
         settled: false,
         orchestrator: Orchestrator::new("move", engines.moves, engines.deadlines),
         hints: HintCoordinator::new(Orchestrator::new("hint", engines.hints, engines.deadlines), view),
         hint_task: None,
         live,
         rng: StdRng::from_entropy(),
      };
      session.moved();
      Ok(session)
   }

   pub fn with_rng(mut self, rng: StdRng) -> Session<R> {
      self.rng = rng;
      self
   }

   pub fn game(&self) -> &R {
      &self.game
   }

   pub fn ladder(&self) -> &Ladder {
      &self.ladder
   }

   pub fn progress(&self) -> Progress {
      self.progress
   }

   pub fn difficulty(&self) -> Difficulty {
      self.difficulty
   }

   pub fn status(&self) -> GameStatus {
      self.game.status()
   }

   pub fn ai_to_move(&self) -> bool {
      !self.status().is_over() && self.game.turn() != self.human
   }

   pub fn live(&self) -> watch::Receiver<LiveView> {
      self.live.subscribe()
   }

   pub fn play_human(&mut self, a_move: Move) -> Result<LegalMove, SessionError> {
      if self.status().is_over() {
         return Err(SessionError::GameOver);
      }
      if self.thinking || self.game.turn() != self.human {
         return Err(SessionError::NotYourTurn);
      }
      let played = self.game.apply(a_move)?;
      info!("human played {}", played.notation);
      self.moved();
      Ok(played)
   }

   /// Decides and plays the computer's move. `Ok(None)` means the ply did not advance.
   pub async fn play_ai(&mut self) -> Result<Option<Move>, SessionError> {
      if self.status().is_over() {
         return Err(SessionError::GameOver);
      }
      if self.game.turn() == self.human {
         return Err(SessionError::NotYourTurn);
      }
      let strategy = match (self.difficulty, self.difficulty.strategy(&self.ladder)) {
         (_, Some(strategy)) => strategy,
         (Difficulty::Level(id), None) => return Err(SessionError::NoSuchLevel(id)),
         (Difficulty::Hard, None) => return Err(SessionError::NoSuchLevel(self.ladder.top())),
      };

      self.thinking = true;
      self.publish();
      let chosen = match strategy {
         Strategy::Random => evaluator::pick_random(&self.game.legal_moves(), &mut self.rng),
         Strategy::Heuristic => evaluator::pick_best(&self.game.legal_moves()),
         Strategy::Engine { depth } => self.orchestrator.decide(&self.game, depth).await.map(|x| x.mv),
      };
      self.thinking = false;

      let played = chosen.and_then(|x| self.apply_ai(x));
      if let Some(played) = played {
         self.last_ai_move = Some(played);
      }
      self.moved();
      Ok(played)
   }

   fn apply_ai(&mut self, a_move: Move) -> Option<Move> {
      match self.game.apply(a_move) {
         Ok(played) => {
            info!("{} played {}", self.difficulty, played.notation);
            return Some(a_move);
         }
         Err(e) => warn!("{}; retrying with the heuristic", e),
      }
      let retry = evaluator::pick_best(&self.game.legal_moves())?;
      match self.game.apply(retry) {
         Ok(played) => {
            info!("{} played {}", self.difficulty, played.notation);
            Some(retry)
         }
         Err(e) => {
            error!("{}; the computer's ply does not advance", e);
            None
         }
      }
   }

   pub fn select_level(&mut self, id: u8) -> Result<(), SessionError> {
      if self.ladder.get(id).is_none() {
         return Err(SessionError::NoSuchLevel(id));
      }
      if !self.progress.can_select(&self.ladder, id) {
         return Err(SessionError::LevelLocked(id));
      }
      self.difficulty = Difficulty::Level(id);
      Ok(())
   }

   pub fn select_hard(&mut self) {
      self.difficulty = Difficulty::Hard;
   }

   pub fn set_educative(&mut self, on: bool) {
      self.educative = on;
      self.moved();
   }

   pub fn new_game(&mut self) -> Result<(), SessionError> {
      self.game.load(&self.initial)?;
      self.last_ai_move = None;
      self.thinking = false;
      self.settled = false;
      self.moved();
      Ok(())
   }

   /// Where the piece on `square` may go, if it is the human's to move
   pub fn legal_destinations(&self, square: Square) -> Vec<Square> {
      if self.thinking || self.ai_to_move() || self.status().is_over() {
         return Vec::new();
      }
      let mut destinations: Vec<Square> = self.game.legal_moves_from(square).into_iter().map(|x| x.mv.to).collect();
      destinations.dedup();
      destinations
   }

   pub fn snapshot(&self, hovering: bool) -> Snapshot {
      let status = self.status();
      Snapshot {
         position: self.game.position(),
         turn: self.game.turn(),
         human: self.human,
         last_ai_move: self.last_ai_move,
         hint: self.hints.suggestion(hovering),
         thinking: self.thinking,
         over: status.is_over(),
         status,
         difficulty: self.difficulty,
         unlocked: self.progress.unlocked,
         score: self.progress.score,
         educative: self.educative,
      }
   }

   pub fn hint_pending(&self) -> bool {
      self.hints.is_pending()
   }

   /// Waits for the hint computation started by the last move, if any
   pub async fn await_hint(&mut self) {
      if let Some(task) = self.hint_task.take() {
         if let Err(e) = task.await {
            warn!("hint computation failed: {}", e);
         }
      }
   }

   fn publish(&self) {
      let status = self.status();
      self.live.send_replace(LiveView {
         position: self.game.position(),
         human_to_move: !status.is_over() && self.game.turn() == self.human,
         educative: self.educative,
         thinking: self.thinking,
         over: status.is_over(),
      });
   }

   // after any change to the game: republish, settle a finished game, or ask for a hint
   fn moved(&mut self) {
      self.publish();
      let status = self.status();
      if status.is_over() {
         self.settle(status);
      } else if self.game.turn() == self.human {
         if let Some(task) = self.hints.request(&self.game) {
            self.hint_task = Some(task);
         }
      }
   }

   fn settle(&mut self, status: GameStatus) {
      if self.settled {
         return;
      }
      self.settled = true;
      info!("game over: {:?}", status);
      if status == (GameStatus::Checkmate { winner: self.human }) {
         let unlocked = self.progress.record_win(&self.ladder, self.difficulty);
         if unlocked {
            info!("unlocked level {}", self.progress.unlocked);
         }
      }
   }
}
