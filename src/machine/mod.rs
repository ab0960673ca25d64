pub mod command;
pub mod config;
pub mod dispatcher;

use command::Command;
use config::ManagerConfig;
use dispatcher::{Machine, MachineSnapshot};

use anyhow::Result;
use tokio::sync::{
    mpsc::{self, error::TryRecvError},
    oneshot,
};
use tracing::{debug, info};

use crate::protocol::response::Report;

pub struct MachineManager {
    cmd_sender: mpsc::Sender<Command>,
}

impl MachineManager {
    // Must be called from within a tokio runtime.
    pub fn new(machine: Machine, config: ManagerConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Command>(config.channel_capacity.max(1));

        tokio::task::spawn_blocking(move || Self::command_loop(machine, rx));

        MachineManager { cmd_sender: tx }
    }

    pub async fn send_command(&self, cmd: Command) -> Result<()> {
        self.cmd_sender.send(cmd).await?;
        Ok(())
    }

    pub async fn submit(&self, frame: Report) -> Result<Option<Report>> {
        let (tx, rx) = oneshot::channel();
        self.send_command(Command::Request { frame, resp: tx }).await?;
        Ok(rx.await?)
    }

    pub async fn snapshot(&self) -> Result<MachineSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send_command(Command::Snapshot { resp: tx }).await?;
        Ok(rx.await?)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send_command(Command::Shutdown).await
    }

    fn command_loop(mut machine: Machine, mut rx: mpsc::Receiver<Command>) {
        info!("Command loop started");
        loop {
            let cmd = if machine.any_test_mode() {
                match rx.try_recv() {
                    Ok(cmd) => cmd,
                    Err(TryRecvError::Empty) => {
                        machine.test_exec();
                        continue;
                    }
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match rx.blocking_recv() {
                    Some(cmd) => cmd,
                    None => break,
                }
            };

            match cmd {
                Command::Request { frame, resp } => {
                    let reply = machine.handle(frame.as_bytes());
                    debug!("Handled {:?}, reply: {:?}", frame, reply);
                    let _ = resp.send(reply);
                }
                Command::Snapshot { resp } => {
                    let _ = resp.send(machine.snapshot());
                }
                Command::Shutdown => break,
            }
        }
        info!("Command loop stopped");
    }
}
