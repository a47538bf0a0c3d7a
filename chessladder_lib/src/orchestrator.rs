use crate::board::{Move, Position};
use crate::channel::{EngineChannel, STARTUP_TIMEOUT};
use crate::error::EngineError;
use crate::evaluator;
use crate::process::Launch;
use crate::rules::Rules;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const SOFT_DEADLINE: Duration = Duration::from_millis(9000);
pub const HARD_GRACE: Duration = Duration::from_millis(1000);

/// Time limits for bringing an engine up and for one search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadlines {
   pub startup: Duration,
   /// after this the engine is asked to stop and answer
   pub soft: Duration,
   /// extra time after the soft deadline before the search is abandoned
   pub grace: Duration,
}

impl Default for Deadlines {
   fn default() -> Deadlines {
      Deadlines {
         startup: STARTUP_TIMEOUT,
         soft: SOFT_DEADLINE,
         grace: HARD_GRACE,
      }
   }
}

impl Deadlines {
   pub fn hard(&self) -> Duration {
      self.soft + self.grace
   }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
   Engine,
   Fallback(EngineError),
}

/// A move and the position it was decided for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
   pub position: Position,
   pub mv: Move,
   pub source: Source,
}

/// Bounded, fallback-safe move decisions over one engine channel
pub struct Orchestrator {
   channel: EngineChannel,
   deadlines: Deadlines,
   // held for a whole decision, so searches on the channel never overlap
   turn: Mutex<()>,
}

impl Orchestrator {
   pub fn new(name: &'static str, launcher: Arc<dyn Launch>, deadlines: Deadlines) -> Orchestrator {
      Orchestrator {
         channel: EngineChannel::new(name, launcher, deadlines.startup),
         deadlines,
         turn: Mutex::new(()),
      }
   }

   pub fn channel(&self) -> &EngineChannel {
      &self.channel
   }

   /// Always yields a legal move when one exists. The engine gets one attempt;
   /// anything wrong with it is answered by the heuristic evaluator.
   pub async fn decide<R: Rules>(&self, rules: &R, depth: u8) -> Option<Decision> {
      let _turn = self.turn.lock().await;
      let position = rules.position();
      let legal = rules.legal_moves();
      if legal.is_empty() {
         debug!("{} engine: no legal moves in {}", self.channel.name(), position);
         return None;
      }

      let failure = match self.consult(&position, depth).await {
         Ok(mv) if legal.iter().any(|x| x.mv == mv) => {
            info!("{} engine chose {}", self.channel.name(), mv);
            return Some(Decision {
               position,
               mv,
               source: Source::Engine,
            });
         }
         Ok(mv) => EngineError::IllegalMove(mv),
         Err(e) => e,
      };
      warn!("{} engine: {}; falling back to heuristic", self.channel.name(), failure);
      let mv = evaluator::pick_best(&legal)?;
      Some(Decision {
         position,
         mv,
         source: Source::Fallback(failure),
      })
   }

   async fn consult(&self, position: &Position, depth: u8) -> Result<Move, EngineError> {
      self.channel.start().await?;
      let mut ticket = self.channel.search(position.clone(), depth).await?;
      let token = ticket.token;

      let soft = tokio::time::sleep(self.deadlines.soft);
      let hard = tokio::time::sleep(self.deadlines.hard());
      tokio::pin!(soft);
      tokio::pin!(hard);
      let mut stopped = false;
      let answer = loop {
         tokio::select! {
            answer = ticket.answer() => break answer?,
            _ = &mut soft, if !stopped => {
               debug!("{} engine: soft deadline, asking for an answer", self.channel.name());
               self.channel.stop();
               stopped = true;
            }
            _ = &mut hard => {
               self.channel.abandon(token);
               return Err(EngineError::Timeout);
            }
         }
      };
      answer.parse::<Move>().map_err(|_| EngineError::Protocol(answer))
   }
}

#[cfg(test)]
mod tests {
   use crate::board::Move;
   use crate::channel::ChannelState;
   use crate::error::{EngineError, StartupError};
   use crate::evaluator;
   use crate::orchestrator::*;
   use crate::process::ProcessLauncher;
   use crate::rules::{Game, Rules};
   use crate::testing::{FakeEngine, FakeLauncher};
   use tokio::time::Instant;

   const POSITIONS: [&str; 4] = [
      "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
      "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
      "6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1",
      "4k3/8/8/3q4/4P3/8/8/4K3 w - - 0 1",
   ];

   fn orchestrator(launcher: &Arc<FakeLauncher>) -> Orchestrator {
      Orchestrator::new("test", launcher.clone(), Deadlines::default())
   }

   fn heuristic(game: &Game) -> Move {
      evaluator::pick_best(&game.legal_moves()).unwrap()
   }

   #[tokio::test(start_paused = true)]
   async fn engine_answer_is_used() {
      let launcher = FakeLauncher::new(FakeEngine::default());
      let orchestrator = orchestrator(&launcher);
      let game = Game::new();
      let decision = orchestrator.decide(&game, 10).await.unwrap();
      assert_eq!(decision.source, Source::Engine);
      assert_eq!(decision.position, game.position());
      assert_eq!(Some(decision.mv), game.legal_moves().last().map(|x| x.mv));
   }

   #[tokio::test(start_paused = true)]
   async fn hard_deadline_falls_back_to_heuristic() {
      let launcher = FakeLauncher::new(FakeEngine::hung());
      let orchestrator = orchestrator(&launcher);
      for fen in POSITIONS.iter() {
         let game = Game::from_fen(fen).unwrap();
         let started = Instant::now();
         let decision = orchestrator.decide(&game, 10).await.unwrap();
         assert_eq!(decision.source, Source::Fallback(EngineError::Timeout));
         assert_eq!(decision.mv, heuristic(&game));
         assert!(started.elapsed() >= Deadlines::default().hard());
         assert!(started.elapsed() < Deadlines::default().hard() + HARD_GRACE);
      }
      assert!(launcher.commands().contains(&"stop".to_string()));
      assert_eq!(orchestrator.channel().state(), ChannelState::Ready);
      assert_eq!(launcher.launches(), 1);
   }

   #[tokio::test(start_paused = true)]
   async fn soft_deadline_collects_the_engine_answer() {
      let launcher = FakeLauncher::new(FakeEngine {
         answer_on_stop: true,
         ..FakeEngine::hung()
      });
      let orchestrator = orchestrator(&launcher);
      let game = Game::new();
      let started = Instant::now();
      let decision = orchestrator.decide(&game, 30).await.unwrap();
      assert_eq!(decision.source, Source::Engine);
      assert!(started.elapsed() >= SOFT_DEADLINE);
      assert!(started.elapsed() < Deadlines::default().hard());
   }

   #[tokio::test(start_paused = true)]
   async fn unusable_answers_fall_back() {
      for token in ["(none)", "0000", "", "banana"].iter() {
         let launcher = FakeLauncher::new(FakeEngine::answering(token));
         let orchestrator = orchestrator(&launcher);
         let game = Game::new();
         let decision = orchestrator.decide(&game, 3).await.unwrap();
         assert_eq!(decision.source, Source::Fallback(EngineError::Protocol(token.to_string())));
         assert_eq!(decision.mv, heuristic(&game));
      }
   }

   #[tokio::test(start_paused = true)]
   async fn illegal_answer_falls_back() {
      let launcher = FakeLauncher::new(FakeEngine::answering("e2e5"));
      let orchestrator = orchestrator(&launcher);
      let game = Game::new();
      let decision = orchestrator.decide(&game, 3).await.unwrap();
      assert_eq!(
         decision.source,
         Source::Fallback(EngineError::IllegalMove("e2e5".parse().unwrap()))
      );
      assert_eq!(decision.mv, heuristic(&game));
   }

   #[tokio::test(start_paused = true)]
   async fn never_ready_still_moves() {
      let launcher = FakeLauncher::new(FakeEngine {
         ready: false,
         ..FakeEngine::default()
      });
      let orchestrator = orchestrator(&launcher);
      let game = Game::from_fen(POSITIONS[3]).unwrap();
      let decision = orchestrator.decide(&game, 8).await.unwrap();
      assert_eq!(
         decision.source,
         Source::Fallback(EngineError::Startup(StartupError::Timeout(STARTUP_TIMEOUT)))
      );
      assert_eq!(decision.mv, "e4d5".parse().unwrap());
   }

   #[tokio::test]
   async fn missing_engine_binary_still_moves() {
      let orchestrator = Orchestrator::new(
         "test",
         Arc::new(ProcessLauncher::new("/nonexistent/chessladder-engine")),
         Deadlines::default(),
      );
      let game = Game::new();
      let decision = orchestrator.decide(&game, 8).await.unwrap();
      assert!(matches!(
         decision.source,
         Source::Fallback(EngineError::Startup(StartupError::Spawn(_)))
      ));
      assert_eq!(decision.mv, heuristic(&game));
   }

   #[tokio::test(start_paused = true)]
   async fn no_legal_moves_no_engine() {
      let launcher = FakeLauncher::new(FakeEngine::default());
      let orchestrator = orchestrator(&launcher);
      for fen in ["7k/6Q1/6K1/8/8/8/8/8 b - - 0 1", "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1"].iter() {
         let game = Game::from_fen(fen).unwrap();
         assert_eq!(orchestrator.decide(&game, 8).await, None);
      }
      assert_eq!(launcher.launches(), 0);
   }

   #[tokio::test(start_paused = true)]
   async fn decisions_run_one_after_another() {
      let launcher = FakeLauncher::new(FakeEngine {
         think: std::time::Duration::from_secs(2),
         ..FakeEngine::default()
      });
      let orchestrator = orchestrator(&launcher);
      let a = Game::new();
      let b = Game::from_fen(POSITIONS[1]).unwrap();
      let (first, second) = tokio::join!(orchestrator.decide(&a, 4), orchestrator.decide(&b, 4));
      assert_eq!(first.unwrap().source, Source::Engine);
      assert_eq!(second.unwrap().source, Source::Engine);

      let traffic: Vec<String> = launcher
         .transcript()
         .into_iter()
         .filter(|x| x.starts_with("> go") || x.starts_with("< bestmove"))
         .collect();
      assert_eq!(traffic.len(), 4);
      assert!(traffic[0].starts_with("> go"));
      assert!(traffic[1].starts_with("< bestmove"));
      assert!(traffic[2].starts_with("> go"));
      assert!(traffic[3].starts_with("< bestmove"));
   }

   #[tokio::test(start_paused = true)]
   async fn dead_engine_is_restarted_on_next_decision() {
      let launcher = FakeLauncher::new(FakeEngine {
         exits_on_go: true,
         ..FakeEngine::default()
      });
      let orchestrator = orchestrator(&launcher);
      let game = Game::new();
      let decision = orchestrator.decide(&game, 4).await.unwrap();
      assert_eq!(decision.source, Source::Fallback(EngineError::Disconnected));
      assert_eq!(orchestrator.channel().state(), ChannelState::Faulted);
      orchestrator.decide(&game, 4).await.unwrap();
      assert_eq!(launcher.launches(), 2);
   }
}
