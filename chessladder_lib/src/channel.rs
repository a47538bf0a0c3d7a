use crate::board::Position;
use crate::error::{EngineError, StartupError};
use crate::messages::{EngineMessage, InterfaceMessage};
use crate::process::{EngineLink, Launch, ProcessGuard};
use futures::future::{BoxFuture, FutureExt, Shared as SharedFuture};
use fxhash::FxHashMap;
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
   Unstarted,
   Handshaking,
   Ready,
   Searching,
   Faulted,
}

type Startup = SharedFuture<BoxFuture<'static, Result<(), StartupError>>>;

enum Phase {
   Unstarted,
   Handshaking(Startup),
   Ready,
   Searching(u64),
   Faulted,
}

struct Link {
   outbound: mpsc::Sender<String>,
   reader: JoinHandle<()>,
   _process: Option<ProcessGuard>,
}

impl Drop for Link {
   fn drop(&mut self) {
      let _ = self.outbound.try_send(InterfaceMessage::Quit.to_string());
      self.reader.abort();
   }
}

struct Shared {
   name: &'static str,
   phase: Phase,
   // bumped on every launch so a dead link's reader can't touch its successor
   generation: u64,
   link: Option<Link>,
   listener: Option<(EngineMessage, oneshot::Sender<()>)>,
   // one entry per `go` whose `bestmove` hasn't arrived; None once abandoned
   owed: VecDeque<Option<u64>>,
   pending: FxHashMap<u64, oneshot::Sender<String>>,
   next_token: u64,
}

impl Shared {
   fn teardown(&mut self) {
      self.link = None;
      self.listener = None;
      self.owed.clear();
      self.pending.clear();
   }

   fn fault(&mut self, generation: u64) {
      if generation != self.generation {
         return;
      }
      warn!("{} engine connection lost", self.name);
      self.teardown();
      self.phase = Phase::Faulted;
   }

   fn dispatch(&mut self, generation: u64, message: EngineMessage) {
      if generation != self.generation {
         return;
      }
      match message {
         EngineMessage::BestMove(token) => match self.owed.pop_front() {
            Some(Some(id)) => {
               if let Some(resolve) = self.pending.remove(&id) {
                  let _ = resolve.send(token);
               }
               if let Phase::Searching(current) = self.phase {
                  if current == id {
                     self.phase = Phase::Ready;
                  }
               }
            }
            Some(None) => debug!("{} engine: dropping late answer {} of an abandoned search", self.name, token),
            None => debug!("{} engine: dropping unsolicited answer {}", self.name, token),
         },
         message => {
            let awaited = matches!(&self.listener, Some((expect, _)) if *expect == message);
            if awaited {
               if let Some((_, notify)) = self.listener.take() {
                  let _ = notify.send(());
               }
            } else {
               trace!("{} engine: ignoring {:?}", self.name, message);
            }
         }
      }
   }
}

/// An outstanding search. Resolves once the engine answers or the channel dies.
pub struct SearchTicket {
   pub token: u64,
   pub position: Position,
   answer: oneshot::Receiver<String>,
}

impl SearchTicket {
   /// Cancel safe; may be polled again after being dropped mid-await
   pub async fn answer(&mut self) -> Result<String, EngineError> {
      (&mut self.answer).await.map_err(|_| EngineError::Disconnected)
   }
}

/// One engine process and its line protocol, with at most one search in flight
pub struct EngineChannel {
   name: &'static str,
   launcher: Arc<dyn Launch>,
   startup_timeout: Duration,
   shared: Arc<Mutex<Shared>>,
}

impl EngineChannel {
   pub fn new(name: &'static str, launcher: Arc<dyn Launch>, startup_timeout: Duration) -> EngineChannel {
      EngineChannel {
         name,
         launcher,
         startup_timeout,
         shared: Arc::new(Mutex::new(Shared {
            name,
            phase: Phase::Unstarted,
            generation: 0,
            link: None,
            listener: None,
            owed: VecDeque::new(),
            pending: FxHashMap::default(),
            next_token: 0,
         })),
      }
   }

   pub fn name(&self) -> &'static str {
      self.name
   }

   pub fn state(&self) -> ChannelState {
      match self.shared.lock().phase {
         Phase::Unstarted => ChannelState::Unstarted,
         Phase::Handshaking(_) => ChannelState::Handshaking,
         Phase::Ready => ChannelState::Ready,
         Phase::Searching(_) => ChannelState::Searching,
         Phase::Faulted => ChannelState::Faulted,
      }
   }

   /// Brings the engine up. Everyone calling before readiness waits on the same handshake.
   /// A failed start is not retried; the next call launches afresh.
   pub async fn start(&self) -> Result<(), StartupError> {
      let startup = {
         let mut shared = self.shared.lock();
         let in_flight = match &shared.phase {
            Phase::Ready | Phase::Searching(_) => return Ok(()),
            Phase::Handshaking(startup) => Some(startup.clone()),
            Phase::Unstarted | Phase::Faulted => None,
         };
         match in_flight {
            Some(startup) => startup,
            None => {
               shared.teardown();
               shared.generation += 1;
               let startup = handshake(
                  self.name,
                  self.launcher.clone(),
                  self.shared.clone(),
                  self.startup_timeout,
                  shared.generation,
               )
               .boxed()
               .shared();
               shared.phase = Phase::Handshaking(startup.clone());
               startup
            }
         }
      };
      startup.await
   }

   /// Sends the position and the depth-limited search. Only valid on a ready channel.
   pub async fn search(&self, position: Position, depth: u8) -> Result<SearchTicket, EngineError> {
      let (token, generation, outbound, answer) = {
         let mut shared = self.shared.lock();
         match shared.phase {
            Phase::Ready => {}
            Phase::Searching(_) => return Err(EngineError::Busy),
            _ => return Err(EngineError::NotReady),
         }
         let outbound = match &shared.link {
            Some(link) => link.outbound.clone(),
            None => return Err(EngineError::NotReady),
         };
         let token = shared.next_token;
         shared.next_token += 1;
         let (resolve, answer) = oneshot::channel();
         shared.pending.insert(token, resolve);
         shared.owed.push_back(Some(token));
         shared.phase = Phase::Searching(token);
         (token, shared.generation, outbound, answer)
      };

      debug!("{} engine: search #{} to depth {}", self.name, token, depth);
      let sent = async {
         outbound
            .send(InterfaceMessage::SetPosition(position.clone()).to_string())
            .await?;
         outbound.send(InterfaceMessage::GoDepth(depth).to_string()).await
      }
      .await;
      if sent.is_err() {
         self.shared.lock().fault(generation);
         return Err(EngineError::Disconnected);
      }

      Ok(SearchTicket {
         token,
         position,
         answer,
      })
   }

   /// Asks the engine to finish the current search early. Best effort.
   pub fn stop(&self) {
      let shared = self.shared.lock();
      if let (Phase::Searching(_), Some(link)) = (&shared.phase, &shared.link) {
         if link.outbound.try_send(InterfaceMessage::Stop.to_string()).is_err() {
            warn!("{} engine: could not deliver stop", self.name);
         }
      }
   }

   /// Detaches a search: the channel is ready again and the search's answer will be dropped
   pub fn abandon(&self, token: u64) {
      let mut shared = self.shared.lock();
      shared.pending.remove(&token);
      for owed in shared.owed.iter_mut() {
         if *owed == Some(token) {
            *owed = None;
         }
      }
      if let Phase::Searching(current) = shared.phase {
         if current == token {
            shared.phase = Phase::Ready;
         }
      }
   }
}

impl Drop for EngineChannel {
   fn drop(&mut self) {
      let mut shared = self.shared.lock();
      shared.teardown();
      // also releases a pending handshake, which holds a reference back to us
      shared.phase = Phase::Unstarted;
   }
}

async fn handshake(
   name: &'static str,
   launcher: Arc<dyn Launch>,
   shared: Arc<Mutex<Shared>>,
   limit: Duration,
   generation: u64,
) -> Result<(), StartupError> {
   let result = match tokio::time::timeout(limit, connect(&*launcher, &shared, generation)).await {
      Ok(result) => result,
      Err(_) => Err(StartupError::Timeout(limit)),
   };
   let mut guard = shared.lock();
   if guard.generation == generation {
      match &result {
         Ok(()) => {
            info!("{} engine ready", name);
            guard.phase = Phase::Ready;
         }
         Err(e) => {
            warn!("{} engine failed to start: {}", name, e);
            guard.teardown();
            guard.phase = Phase::Faulted;
         }
      }
   }
   result
}

async fn connect(launcher: &dyn Launch, shared: &Arc<Mutex<Shared>>, generation: u64) -> Result<(), StartupError> {
   let EngineLink {
      outbound,
      inbound,
      process,
   } = launcher.launch().map_err(|e| StartupError::Spawn(e.to_string()))?;
   let reader = tokio::spawn(read_lines(shared.clone(), inbound, generation));
   shared.lock().link = Some(Link {
      outbound: outbound.clone(),
      reader,
      _process: process,
   });

   exchange(shared, &outbound, InterfaceMessage::Identify, EngineMessage::IdentifyOk).await?;
   exchange(shared, &outbound, InterfaceMessage::CheckReady, EngineMessage::ReadyOk).await
}

async fn exchange(
   shared: &Mutex<Shared>,
   outbound: &mpsc::Sender<String>,
   request: InterfaceMessage,
   expect: EngineMessage,
) -> Result<(), StartupError> {
   let (notify, notified) = oneshot::channel();
   shared.lock().listener = Some((expect, notify));
   outbound
      .send(request.to_string())
      .await
      .map_err(|_| StartupError::Disconnected)?;
   notified.await.map_err(|_| StartupError::Disconnected)
}

async fn read_lines(shared: Arc<Mutex<Shared>>, mut inbound: mpsc::Receiver<String>, generation: u64) {
   while let Some(line) = inbound.recv().await {
      let message = match line.parse::<EngineMessage>() {
         Ok(message) => message,
         Err(never) => match never {},
      };
      shared.lock().dispatch(generation, message);
   }
   shared.lock().fault(generation);
}
