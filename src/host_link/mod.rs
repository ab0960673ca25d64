pub mod codec;
pub mod config;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::{io::ErrorKind, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::UnixListener,
    sync::{broadcast, Semaphore},
};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use crate::{
    machine::MachineManager,
    protocol::{response::Report, REPORT_SIZE},
};
use codec::ReportCodec;
use config::SocketServerConfig;

#[async_trait::async_trait]
pub trait HostLink: Send {
    // Returns 0 once the host has gone away.
    async fn receive(&mut self, buf: &mut Report) -> Result<usize>;
    async fn send(&mut self, report: &Report) -> Result<()>;
}

#[async_trait::async_trait]
impl<T> HostLink for Framed<T, ReportCodec>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn receive(&mut self, buf: &mut Report) -> Result<usize> {
        match self.next().await {
            Some(Ok(report)) => {
                *buf = report;
                Ok(REPORT_SIZE)
            }
            Some(Err(e)) => Err(e.into()),
            None => Ok(0),
        }
    }

    async fn send(&mut self, report: &Report) -> Result<()> {
        SinkExt::send(self, *report).await?;
        Ok(())
    }
}

pub async fn serve_link<L: HostLink>(
    link: &mut L,
    manager: &MachineManager,
    send_timeout: Duration,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Result<()> {
    let mut frame = Report::new();

    loop {
        tokio::select! {
            received = link.receive(&mut frame) => {
                if received? == 0 {
                    debug!("Host link closed");
                    break;
                }

                let Some(reply) = manager.submit(frame).await? else {
                    continue;
                };
                match tokio::time::timeout(send_timeout, link.send(&reply)).await {
                    Ok(sent) => sent?,
                    Err(_) => warn!("Reply not sent within {:?}, dropped", send_timeout),
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("Shutdown signal received, closing host link");
                break;
            }
        }
    }

    Ok(())
}

pub struct SocketServer {
    config: SocketServerConfig,
    manager: Arc<MachineManager>,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl SocketServer {
    pub fn new(config: SocketServerConfig, manager: Arc<MachineManager>) -> Self {
        Self {
            config,
            manager,
            shutdown_tx: None,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        remove_socket(&self.config.socket_path).await?;
        let listener = UnixListener::bind(&self.config.socket_path)?;
        info!("Host link listening on: {}", self.config.socket_path);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        tokio::spawn(accept_hosts(
            listener,
            self.manager.clone(),
            Arc::new(Semaphore::new(self.config.max_connections)),
            Duration::from_millis(self.config.send_timeout_ms),
            shutdown_rx,
        ));
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(());
        }
        remove_socket(&self.config.socket_path).await?;
        info!("Host link shutdown complete");
        Ok(())
    }
}

async fn remove_socket(path: &str) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

async fn accept_hosts(
    listener: UnixListener,
    manager: Arc<MachineManager>,
    slots: Arc<Semaphore>,
    send_timeout: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    error!("Failed to accept host: {}", e);
                    continue;
                }
            },
            _ = shutdown_rx.recv() => break,
        };

        let Ok(permit) = slots.clone().try_acquire_owned() else {
            warn!("All host links in use, rejecting host");
            continue;
        };
        debug!("Host connected, {} link slots left", slots.available_permits());

        let manager = manager.clone();
        let mut link_shutdown = shutdown_rx.resubscribe();
        tokio::spawn(async move {
            let mut link = Framed::new(stream, ReportCodec);
            if let Err(e) = serve_link(&mut link, &manager, send_timeout, &mut link_shutdown).await {
                error!("Host link error: {}", e);
            }
            drop(permit);
            debug!("Host disconnected");
        });
    }
    info!("Host link server stopped");
}
