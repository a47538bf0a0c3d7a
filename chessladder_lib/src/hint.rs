use crate::board::{Move, Position};
use crate::orchestrator::Orchestrator;
use crate::rules::Rules;
use log::{debug, info};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const HINT_DEPTH: u8 = 17;

/// What the rest of the program may know about the game being played
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LiveView {
   pub position: Position,
   pub human_to_move: bool,
   pub educative: bool,
   pub thinking: bool,
   pub over: bool,
}

impl LiveView {
   fn wants_hint(&self) -> bool {
      self.educative && self.human_to_move && !self.thinking && !self.over
   }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Hint {
   pub position: Position,
   #[serde(rename = "move")]
   pub mv: Move,
}

#[derive(Default)]
struct HintSlot {
   pending: Option<Position>,
   hint: Option<Hint>,
}

/// Suggests moves to the human on a channel of its own, so hints never hold up play
pub struct HintCoordinator {
   orchestrator: Arc<Orchestrator>,
   live: watch::Receiver<LiveView>,
   slot: Arc<Mutex<HintSlot>>,
}

impl HintCoordinator {
   pub fn new(orchestrator: Orchestrator, live: watch::Receiver<LiveView>) -> HintCoordinator {
      HintCoordinator {
         orchestrator: Arc::new(orchestrator),
         live,
         slot: Arc::new(Mutex::new(HintSlot::default())),
      }
   }

   /// Starts computing a hint for the position in `rules`, unless the live game
   /// doesn't want one or one is already known or underway for that position.
   pub fn request<R: Rules>(&self, rules: &R) -> Option<JoinHandle<()>> {
      let view = self.live.borrow().clone();
      let position = rules.position();
      if !view.wants_hint() || view.position != position {
         return None;
      }
      {
         let mut slot = self.slot.lock();
         if slot.hint.as_ref().map_or(false, |x| x.position == position) {
            return None;
         }
         slot.hint = None;
         if slot.pending.as_ref() == Some(&position) {
            return None;
         }
         slot.pending = Some(position.clone());
      }

      let rules = rules.clone();
      let orchestrator = self.orchestrator.clone();
      let live = self.live.clone();
      let slot = self.slot.clone();
      Some(tokio::spawn(async move {
         let decision = orchestrator.decide(&rules, HINT_DEPTH).await;
         let view = live.borrow().clone();
         let mut slot = slot.lock();
         if slot.pending.as_ref() == Some(&position) {
            slot.pending = None;
         }
         let decision = match decision {
            Some(decision) => decision,
            None => return,
         };
         if view.wants_hint() && view.position == decision.position {
            info!("hint for {}: {}", decision.position, decision.mv);
            slot.hint = Some(Hint {
               position: decision.position,
               mv: decision.mv,
            });
         } else {
            debug!("discarding stale hint {} for {}", decision.mv, decision.position);
         }
      }))
   }

   pub fn is_pending(&self) -> bool {
      let position = self.live.borrow().position.clone();
      self.slot.lock().pending.as_ref() == Some(&position)
   }

   /// The accepted hint, shown only while the user is hovering and only while it still fits the game
   pub fn suggestion(&self, hovering: bool) -> Option<Move> {
      if !hovering {
         return None;
      }
      let view = self.live.borrow().clone();
      if !view.wants_hint() {
         return None;
      }
      let slot = self.slot.lock();
      slot.hint.as_ref().filter(|x| x.position == view.position).map(|x| x.mv)
   }
}
