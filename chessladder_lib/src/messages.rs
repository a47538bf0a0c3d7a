use crate::board::Position;
use std::fmt;
use std::str::FromStr;

// Engine protocol (UCI) messages

// Interface to Engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterfaceMessage {
   Identify,
   CheckReady,
   SetPosition(Position),
   GoDepth(u8), // Calculate until depth and respond with the best move
   Stop,
   Quit,
}

impl fmt::Display for InterfaceMessage {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      match self {
         InterfaceMessage::Identify => write!(f, "uci"),
         InterfaceMessage::CheckReady => write!(f, "isready"),
         InterfaceMessage::SetPosition(position) => write!(f, "position fen {}", position),
         InterfaceMessage::GoDepth(depth) => write!(f, "go depth {}", depth),
         InterfaceMessage::Stop => write!(f, "stop"),
         InterfaceMessage::Quit => write!(f, "quit"),
      }
   }
}

// Engine to Interface
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineMessage {
   IdentifyOk,
   ReadyOk,
   BestMove(String), // raw move token; may be a "no move" sentinel
   Other(String),
}

impl FromStr for EngineMessage {
   type Err = std::convert::Infallible;

   fn from_str(line: &str) -> Result<EngineMessage, Self::Err> {
      let mut args = line.split_whitespace();
      Ok(match args.next() {
         Some("uciok") => EngineMessage::IdentifyOk,
         Some("readyok") => EngineMessage::ReadyOk,
         Some("bestmove") => EngineMessage::BestMove(args.next().unwrap_or_default().to_string()),
         _ => EngineMessage::Other(line.to_string()),
      })
   }
}
