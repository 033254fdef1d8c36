use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use resonate_receiver_models::ServerTarget;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::{
    Result,
    adapter::{ClientEvent, Connection, Connector, EventStream, SessionConfig, StreamingClient},
    error::Error,
    identity::IdentityStore,
};

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Messages from background tasks back to the manager. Every message carries
/// the generation of the session that produced it; stale generations are
/// dropped by the manager.
pub(crate) enum SessionMessage {
    Established {
        generation: u64,
        connection: Connection,
    },
    Failed {
        generation: u64,
        error: Error,
    },
    Event {
        generation: u64,
        event: ClientEvent,
    },
    Closed {
        generation: u64,
    },
}

#[derive(Debug)]
pub(crate) enum AdapterCommand {
    SetVolume(f32),
    SetMute(bool),
    Disconnect,
}

pub(crate) struct Session {
    pub(crate) generation: u64,
    pub(crate) target: ServerTarget,
    pub(crate) cancel: CancellationToken,
    pub(crate) commands: Option<UnboundedSender<AdapterCommand>>,
}

impl Session {
    pub(crate) fn send(&self, command: AdapterCommand) {
        let Some(commands) = &self.commands else {
            debug!(?command, "session not established, keeping change local");
            return;
        };

        if commands.send(command).is_err() {
            warn!("adapter worker has stopped");
        }
    }

    pub(crate) fn close(self) {
        self.cancel.cancel();
        self.send(AdapterCommand::Disconnect);
    }
}

pub(crate) struct Dial {
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) identity: Arc<IdentityStore>,
    pub(crate) client_name: String,
    pub(crate) url: Url,
    pub(crate) timeout: Duration,
}

impl Dial {
    async fn open(self) -> Result<Connection> {
        let client_id = self
            .identity
            .current_client_id()
            .await
            .map_err(|error| Error::Identity {
                message: error.to_string(),
            })?;

        let session = SessionConfig::new(client_id, self.client_name);
        debug!(url = %self.url, client_id = %session.client_id, "opening session");

        tokio::time::timeout(self.timeout, self.connector.connect(self.url, session)).await?
    }

    pub(crate) fn spawn(
        self,
        generation: u64,
        cancel: CancellationToken,
        tx: UnboundedSender<SessionMessage>,
    ) {
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(generation, "dial cancelled");
                    return;
                }
                result = self.open() => result,
            };

            let message = match result {
                Ok(connection) => SessionMessage::Established {
                    generation,
                    connection,
                },
                Err(error) => SessionMessage::Failed { generation, error },
            };

            _ = tx.send(message);
        });
    }
}

pub(crate) fn spawn_event_pump(
    generation: u64,
    mut events: EventStream,
    cancel: CancellationToken,
    tx: UnboundedSender<SessionMessage>,
) {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(generation, "event consumption cancelled");
                    return;
                }
                event = events.next() => event,
            };

            let message = match event {
                Some(event) => SessionMessage::Event { generation, event },
                None => {
                    _ = tx.send(SessionMessage::Closed { generation });
                    return;
                }
            };

            if tx.send(message).is_err() {
                return;
            }
        }
    });
}

/// Forwards control calls to the adapter in order. Failures are logged only.
pub(crate) fn spawn_adapter_worker(
    client: Arc<dyn StreamingClient>,
) -> UnboundedSender<AdapterCommand> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                AdapterCommand::SetVolume(volume) => {
                    if let Err(error) = client.set_volume(volume).await {
                        warn!(%error, volume, "unable to set volume");
                    }
                }
                AdapterCommand::SetMute(muted) => {
                    if let Err(error) = client.set_mute(muted).await {
                        warn!(%error, muted, "unable to set mute");
                    }
                }
                AdapterCommand::Disconnect => {
                    if let Err(error) = client.disconnect().await {
                        warn!(%error, "unable to close connection cleanly");
                    }
                    break;
                }
            }
        }
    });

    tx
}
