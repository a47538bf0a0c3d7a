use futures::StreamExt;
use log::{debug, trace, warn};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec};

/// How many protocol lines may queue in either direction
pub const LINE_QUEUE: usize = 256;

/// Something that can bring an engine to life and hand back its line queues
pub trait Launch: Send + Sync {
   fn launch(&self) -> io::Result<EngineLink>;
}

/// Both directions of one engine's text protocol. Dropping it tears the engine down.
pub struct EngineLink {
   pub outbound: mpsc::Sender<String>,
   pub inbound: mpsc::Receiver<String>,
   pub process: Option<ProcessGuard>,
}

/// Keeps the child process and its pipe pumps alive for as long as the link is in use
pub struct ProcessGuard {
   child: Child,
   pumps: Vec<JoinHandle<()>>,
}

impl Drop for ProcessGuard {
   fn drop(&mut self) {
      for pump in self.pumps.iter() {
         pump.abort();
      }
      if let Err(e) = self.child.start_kill() {
         trace!("engine process already gone: {}", e);
      }
   }
}

#[derive(Clone, Debug)]
pub struct ProcessLauncher {
   pub program: PathBuf,
   pub args: Vec<String>,
}

impl ProcessLauncher {
   pub fn new(program: impl Into<PathBuf>) -> ProcessLauncher {
      ProcessLauncher {
         program: program.into(),
         args: Vec::new(),
      }
   }
}

impl Launch for ProcessLauncher {
   fn launch(&self) -> io::Result<EngineLink> {
      let mut child = Command::new(&self.program)
         .args(&self.args)
         .stdin(Stdio::piped())
         .stdout(Stdio::piped())
         .stderr(Stdio::null())
         .kill_on_drop(true)
         .spawn()?;
      let mut stdin = child
         .stdin
         .take()
         .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdin unavailable"))?;
      let stdout = child
         .stdout
         .take()
         .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdout unavailable"))?;
      debug!("launched engine {}", self.program.display());

      let (outbound, mut to_engine) = mpsc::channel::<String>(LINE_QUEUE);
      let (from_engine, inbound) = mpsc::channel::<String>(LINE_QUEUE);

      let writer = tokio::spawn(async move {
         while let Some(line) = to_engine.recv().await {
            trace!("-> {}", line);
            let res = async {
               stdin.write_all(line.as_bytes()).await?;
               stdin.write_all(b"\n").await?;
               stdin.flush().await
            }
            .await;
            if let Err(e) = res {
               warn!("failed writing to engine: {}", e);
               break;
            }
         }
      });

      let reader = tokio::spawn(async move {
         let mut lines = FramedRead::new(stdout, LinesCodec::new());
         while let Some(line) = lines.next().await {
            match line {
               Ok(line) => {
                  trace!("<- {}", line);
                  if from_engine.send(line).await.is_err() {
                     break;
                  }
               }
               Err(e) => {
                  warn!("failed reading from engine: {}", e);
                  break;
               }
            }
         }
      });

      Ok(EngineLink {
         outbound,
         inbound,
         process: Some(ProcessGuard {
            child,
            pumps: vec![writer, reader],
         }),
      })
   }
}
