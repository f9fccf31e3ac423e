// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! `ServerContext` is the process entry point: it owns every actor's
//! channel handle and drives the signal-triggered lifecycle.

use std::fs::File;
use std::io::Write as _;

use tokio::runtime::Runtime;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc::Sender;
#[cfg(feature = "persistence")]
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::commands::{DiscoveryCmd, PublicationManagerCmd, RouterCmd, SubscriptionManagerCmd};
use crate::config::Config;
use crate::error::{Error, ErrorKind};
#[cfg(feature = "persistence")]
use crate::persistence;

mod init;
pub mod run;

pub const CHANNEL_CAPACITY: usize = 64;

/// How long graceful shutdown waits for in-flight scheduler work to drain
/// before aborting every actor task outright.
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(2);

/// The messaging core's command senders, owned by [`ServerContext`] and
/// cloned out to whatever process-local provider/proxy code this crate is
/// embedded by; that code is outside this crate's scope, but the
/// integration points are not.
pub struct ServerContext {
    config: Config,
    router_sender: Sender<RouterCmd>,
    publication_sender: Sender<PublicationManagerCmd>,
    subscription_sender: Sender<SubscriptionManagerCmd>,
    discovery_sender: Sender<DiscoveryCmd>,
    handles: Vec<JoinHandle<()>>,
}

impl ServerContext {
    /// Command sender a local provider hands published attribute/broadcast
    /// values to.
    #[must_use]
    pub fn publication_sender(&self) -> Sender<PublicationManagerCmd> {
        self.publication_sender.clone()
    }

    /// Command sender a local proxy registers/unregisters subscriptions
    /// through.
    #[must_use]
    pub fn subscription_sender(&self) -> Sender<SubscriptionManagerCmd> {
        self.subscription_sender.clone()
    }

    /// Command sender a local proxy issues discovery lookups through.
    #[must_use]
    pub fn discovery_sender(&self) -> Sender<DiscoveryCmd> {
        self.discovery_sender.clone()
    }

    /// Command sender a local participant routes outbound envelopes
    /// through directly.
    #[must_use]
    pub fn router_sender(&self) -> Sender<RouterCmd> {
        self.router_sender.clone()
    }

    /// Build every actor, wire their channels together, write the pid
    /// file and run until a termination signal arrives.
    ///
    /// # Errors
    ///
    /// Returns error if config fails validation, the pid file can't be
    /// written, or a signal stream can't be installed.
    pub fn run_loop(config: Config, runtime: &Runtime) -> Result<(), Error> {
        config.validate()?;

        runtime.block_on(async {
            let mut server = Self::init_modules(config, runtime).await?;
            server.write_pid()?;
            server.run_inner_loop().await
        })
    }

    fn write_pid(&self) -> Result<(), Error> {
        let pid_file = self.config.general().pid_file();
        if pid_file.as_os_str().is_empty() {
            return Ok(());
        }
        let pid = std::process::id();
        let mut fd = File::create(pid_file).map_err(|err| {
            Error::from_string(
                ErrorKind::IoError,
                format!("Failed to write pid to file {pid_file:?}: {err}"),
            )
        })?;
        write!(fd, "{pid}")?;
        Ok(())
    }

    async fn run_inner_loop(&mut self) -> Result<(), Error> {
        log::info!("cluster-controller entering signal loop");
        let mut sigterm_stream = signal(SignalKind::terminate())?;
        let mut sigquit_stream = signal(SignalKind::quit())?;
        let mut sigint_stream = signal(SignalKind::interrupt())?;
        let mut sigusr1_stream = signal(SignalKind::user_defined1())?;
        let mut sigusr2_stream = signal(SignalKind::user_defined2())?;
        let mut cleanup_timer =
            tokio::time::interval(std::time::Duration::from_secs(
                self.config.general().routing_table_cleanup_interval_s(),
            ));

        loop {
            tokio::select! {
                Some(()) = sigterm_stream.recv() => {
                    log::info!("Shutting down on SIGTERM");
                    break;
                }
                Some(()) = sigquit_stream.recv() => {
                    log::info!("Shutting down on SIGQUIT");
                    break;
                }
                Some(()) = sigint_stream.recv() => {
                    log::info!("Shutting down on SIGINT");
                    break;
                }
                Some(()) = sigusr1_stream.recv() => {
                    log::info!("Resuming external transport on SIGUSR1");
                    let _ = self.router_sender.send(RouterCmd::ResumeExternalTransport).await;
                }
                Some(()) = sigusr2_stream.recv() => {
                    log::info!("Suspending external transport on SIGUSR2");
                    let _ = self.router_sender.send(RouterCmd::SuspendExternalTransport).await;
                }
                _ = cleanup_timer.tick() => {
                    let _ = self.router_sender.send(RouterCmd::EvictStale).await;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&mut self) {
        tokio::time::sleep(SHUTDOWN_GRACE).await;

        #[cfg(feature = "persistence")]
        if self.config.storage().persistence() {
            if let Err(err) = self.save_snapshot().await {
                log::error!("Failed to persist snapshot at shutdown: {err}");
            }
        }

        for handle in &self.handles {
            handle.abort();
        }
        log::info!("cluster-controller shut down");
    }

    #[cfg(feature = "persistence")]
    async fn save_snapshot(&self) -> Result<(), Error> {
        let (reply, receive) = oneshot::channel();
        self.router_sender
            .send(RouterCmd::SnapshotRoutes { reply })
            .await?;
        let entries = receive
            .await
            .map_err(|err| Error::from_string(ErrorKind::ChannelError, format!("{err}")))?;
        let routes: Vec<_> = entries
            .into_iter()
            .map(|(participant_id, entry)| {
                persistence::PersistedRoute::from_entry(participant_id, &entry)
            })
            .collect();
        persistence::save(self.config.storage().snapshot_path(), &routes)
    }
}
