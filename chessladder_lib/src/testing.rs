//! In-memory UCI engine for exercising channels without a real binary.

use crate::process::{EngineLink, Launch, LINE_QUEUE};
use crate::rules::{Game, Rules};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub enum Reply {
   /// Last legal move of the searched position, so it differs from the fallback's pick
   LastLegal,
   Token(String),
}

#[derive(Clone, Debug)]
pub struct FakeEngine {
   pub spawn_fails: bool,
   pub ready: bool,
   pub reply: Reply,
   pub think: Duration,
   pub answer_on_stop: bool,
   pub exits_on_go: bool,
}

impl Default for FakeEngine {
   fn default() -> FakeEngine {
      FakeEngine {
         spawn_fails: false,
         ready: true,
         reply: Reply::LastLegal,
         think: Duration::from_millis(50),
         answer_on_stop: false,
         exits_on_go: false,
      }
   }
}

impl FakeEngine {
   pub fn answering(token: &str) -> FakeEngine {
      FakeEngine {
         reply: Reply::Token(token.into()),
         ..FakeEngine::default()
      }
   }

   /// Thinks forever and ignores `stop`
   pub fn hung() -> FakeEngine {
      FakeEngine {
         think: Duration::from_secs(3600),
         ..FakeEngine::default()
      }
   }
}

pub struct FakeLauncher {
   script: FakeEngine,
   launches: AtomicUsize,
   transcript: Arc<Mutex<Vec<String>>>,
}

impl FakeLauncher {
   pub fn new(script: FakeEngine) -> Arc<FakeLauncher> {
      Arc::new(FakeLauncher {
         script,
         launches: AtomicUsize::new(0),
         transcript: Arc::new(Mutex::new(Vec::new())),
      })
   }

   pub fn launches(&self) -> usize {
      self.launches.load(Ordering::SeqCst)
   }

   /// Everything exchanged so far, `> ` for lines the engine received and `< ` for its replies
   pub fn transcript(&self) -> Vec<String> {
      self.transcript.lock().clone()
   }

   pub fn commands(&self) -> Vec<String> {
      self
         .transcript()
         .into_iter()
         .filter_map(|x| x.strip_prefix("> ").map(String::from))
         .collect()
   }
}

impl Launch for FakeLauncher {
   fn launch(&self) -> io::Result<EngineLink> {
      self.launches.fetch_add(1, Ordering::SeqCst);
      if self.script.spawn_fails {
         return Err(io::Error::new(io::ErrorKind::NotFound, "no such engine"));
      }
      let (outbound, commands) = mpsc::channel(LINE_QUEUE);
      let (replies, inbound) = mpsc::channel(LINE_QUEUE);
      tokio::spawn(run(self.script.clone(), self.transcript.clone(), commands, replies));
      Ok(EngineLink {
         outbound,
         inbound,
         process: None,
      })
   }
}

async fn run(
   script: FakeEngine,
   transcript: Arc<Mutex<Vec<String>>>,
   mut commands: mpsc::Receiver<String>,
   replies: mpsc::Sender<String>,
) {
   let say = |line: String| {
      transcript.lock().push(format!("< {}", line));
      replies.try_send(line).is_ok()
   };
   let mut game = Game::new();
   // searches run one after another, each answering at its deadline
   let mut searches: Vec<(Instant, String)> = Vec::new();
   loop {
      let next_deadline = searches.first().map(|x| x.0);
      tokio::select! {
         command = commands.recv() => {
            let command = match command {
               Some(command) => command,
               None => break,
            };
            transcript.lock().push(format!("> {}", command));
            let mut args = command.split_whitespace();
            match args.next() {
               Some("uci") => {
                  say("id name Fake".into());
                  say("uciok".into());
               }
               Some("isready") if script.ready => {
                  say("readyok".into());
               }
               Some("position") => {
                  let fen = command.trim_start_matches("position fen ").to_string();
                  if let Ok(position) = Game::from_fen(&fen) {
                     game = position;
                  }
               }
               Some("go") => {
                  if script.exits_on_go {
                     break;
                  }
                  let answer = match &script.reply {
                     Reply::LastLegal => game
                        .legal_moves()
                        .last()
                        .map(|x| x.mv.to_string())
                        .unwrap_or_else(|| "(none)".into()),
                     Reply::Token(token) => token.clone(),
                  };
                  let start = searches.last().map(|x| x.0).unwrap_or_else(Instant::now).max(Instant::now());
                  searches.push((start + script.think, answer));
                  say("info depth 1 score cp 0".into());
               }
               Some("stop") if script.answer_on_stop && !searches.is_empty() => {
                  let (_, answer) = searches.remove(0);
                  say(format!("bestmove {}", answer));
               }
               Some("quit") => break,
               _ => {}
            }
         }
         _ = tokio::time::sleep_until(next_deadline.unwrap_or_else(Instant::now)), if next_deadline.is_some() => {
            let (_, answer) = searches.remove(0);
            say(format!("bestmove {}", answer));
         }
      }
   }
}
