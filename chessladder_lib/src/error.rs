use crate::board::Move;
use std::time::Duration;
use thiserror::Error;

/// The engine process could not be brought up. Fatal to the channel until it is started again.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StartupError {
   #[error("failed to launch engine: {0}")]
   Spawn(String),
   #[error("engine was not ready after {0:?}")]
   Timeout(Duration),
   #[error("engine went away during the handshake")]
   Disconnected,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
   #[error(transparent)]
   Startup(#[from] StartupError),
   #[error("engine did not answer before the hard deadline")]
   Timeout,
   #[error("engine answered with an unusable move token {0:?}")]
   Protocol(String),
   #[error("engine proposed {0}, which is not legal here")]
   IllegalMove(Move),
   #[error("a search is already outstanding on this channel")]
   Busy,
   #[error("engine channel is not ready")]
   NotReady,
   #[error("engine connection closed")]
   Disconnected,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0} is not a legal move in this position")]
pub struct IllegalMoveError(pub Move);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RulesError {
   #[error("malformed FEN: {0}")]
   Fen(String),
   #[error("FEN describes an impossible position: {0}")]
   Position(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
   #[error("it is not your turn")]
   NotYourTurn,
   #[error("the game is over")]
   GameOver,
   #[error(transparent)]
   Illegal(#[from] IllegalMoveError),
   #[error("level {0} is still locked")]
   LevelLocked(u8),
   #[error("there is no level {0}")]
   NoSuchLevel(u8),
   #[error(transparent)]
   Rules(#[from] RulesError),
}
