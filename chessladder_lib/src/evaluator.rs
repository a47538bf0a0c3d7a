//! One-ply move picking that never needs an engine. Used directly by the low
//! ladder levels and as the fallback whenever an engine answer is unusable.

use crate::board::Move;
use crate::rules::LegalMove;
use rand::seq::SliceRandom;
use rand::Rng;

pub const CAPTURE_WEIGHT: i32 = 10;
pub const CHECK_BONUS: i32 = 2;
pub const MATE_BONUS: i32 = 1000;

pub fn score(candidate: &LegalMove) -> i32 {
   let mut score = candidate.captured.map(|x| x.value()).unwrap_or(0) * CAPTURE_WEIGHT;
   if candidate.gives_check() {
      score += CHECK_BONUS;
   }
   if candidate.gives_mate() {
      score += MATE_BONUS;
   }
   score
}

/// Highest scoring move. Ties go to the earliest move in generation order.
pub fn pick_best(moves: &[LegalMove]) -> Option<Move> {
   let mut best: Option<(&LegalMove, i32)> = None;
   for candidate in moves {
      let candidate_score = score(candidate);
      match best {
         Some((_, best_score)) if candidate_score <= best_score => {}
         _ => best = Some((candidate, candidate_score)),
      }
   }
   best.map(|(x, _)| x.mv)
}

pub fn pick_random<R: Rng + ?Sized>(moves: &[LegalMove], rng: &mut R) -> Option<Move> {
   moves.choose(rng).map(|x| x.mv)
}
