use std::{sync::Arc, time::Duration};

use resonate_receiver_models::{ConnectionState, ServerTarget, TrackMetadata};
use tokio::{
    select,
    sync::{mpsc, watch},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    Result, StateReceiver,
    adapter::{ClientEvent, Connector, connection_url},
    controls::{ControlCommand, Controls},
    error::Error,
    identity::IdentityStore,
    notification::NotificationQueue,
    now_playing::NowPlayingSink,
    playerstate::{PlayerState, STATUS_DISCONNECTED},
    session::{
        AdapterCommand, CONNECT_TIMEOUT, Dial, Session, SessionMessage, spawn_adapter_worker,
        spawn_event_pump,
    },
};

pub const STATUS_CONNECTION_LOST: &str = "Connection lost";
pub const DEFAULT_CLIENT_NAME: &str = "Resonate Receiver";

/// Owns the connection lifecycle and the playback state. All state is
/// written from the task running [`Manager::run`]; background work reports
/// back through a single queue.
pub struct Manager {
    connector: Arc<dyn Connector>,
    identity: Arc<IdentityStore>,
    now_playing: Arc<dyn NowPlayingSink>,
    notifications: NotificationQueue,
    client_name: String,
    connect_timeout: Duration,
    state_tx: watch::Sender<PlayerState>,
    controls: Controls,
    command_rx: mpsc::UnboundedReceiver<ControlCommand>,
    session_tx: mpsc::UnboundedSender<SessionMessage>,
    session_rx: mpsc::UnboundedReceiver<SessionMessage>,
    session: Option<Session>,
    generation: u64,
}

impl Manager {
    pub fn new(
        connector: Arc<dyn Connector>,
        identity: Arc<IdentityStore>,
        now_playing: Arc<dyn NowPlayingSink>,
        notifications: NotificationQueue,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlayerState::default());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();

        Self {
            connector,
            identity,
            now_playing,
            notifications,
            client_name: DEFAULT_CLIENT_NAME.into(),
            connect_timeout: CONNECT_TIMEOUT,
            state_tx,
            controls: Controls::new(command_tx),
            command_rx,
            session_tx,
            session_rx,
            session: None,
            generation: 0,
        }
    }

    pub fn with_client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn controls(&self) -> Controls {
        self.controls.clone()
    }

    pub fn state(&self) -> StateReceiver {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> PlayerState {
        self.state_tx.borrow().clone()
    }

    #[instrument(skip_all, fields(target = %target.address()))]
    pub fn connect(&mut self, target: ServerTarget) -> Result<()> {
        if self.state_tx.borrow().connection.is_active() {
            warn!("connect requested while a session is active");
            return Err(Error::AlreadyActive);
        }

        let url = match connection_url(&target) {
            Ok(url) => url,
            Err(error) => {
                self.fail(&error);
                return Err(error);
            }
        };

        self.publish(|state| {
            state.connection = ConnectionState::Connecting;
            state.status = format!("Connecting to {}...", target.address());
        });

        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();

        Dial {
            connector: self.connector.clone(),
            identity: self.identity.clone(),
            client_name: self.client_name.clone(),
            url,
            timeout: self.connect_timeout,
        }
        .spawn(generation, cancel.clone(), self.session_tx.clone());

        self.session = Some(Session {
            generation,
            target,
            cancel,
            commands: None,
        });

        Ok(())
    }

    #[instrument(skip(self))]
    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            info!(target = %session.target.address(), "closing session");
            session.close();
        }

        self.now_playing.clear();
        self.publish(|state| {
            state.connection = ConnectionState::Disconnected;
            state.status = STATUS_DISCONNECTED.into();
            state.current_metadata = None;
        });
    }

    pub fn set_volume(&mut self, volume: f32) {
        let mut playback = self.state_tx.borrow().playback;
        let was_muted = playback.muted;
        playback.set_volume(volume);

        self.publish(|state| state.playback = playback);

        if let Some(session) = &self.session {
            session.send(AdapterCommand::SetVolume(playback.volume));
            if was_muted {
                session.send(AdapterCommand::SetMute(false));
            }
        }
    }

    pub fn toggle_mute(&mut self) {
        let mut playback = self.state_tx.borrow().playback;
        playback.toggle_mute();

        self.publish(|state| state.playback = playback);

        if let Some(session) = &self.session {
            session.send(AdapterCommand::SetMute(playback.muted));
        }
    }

    fn handle_command(&mut self, command: ControlCommand) -> bool {
        match command {
            ControlCommand::Connect { target } => {
                if let Err(error) = self.connect(target) {
                    debug!(%error, "connect rejected");
                }
                false
            }
            ControlCommand::Disconnect => {
                self.disconnect();
                false
            }
            ControlCommand::SetVolume { volume } => {
                self.set_volume(volume);
                false
            }
            ControlCommand::ToggleMute => {
                self.toggle_mute();
                false
            }
            ControlCommand::Quit => true,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.generation == generation)
    }

    fn handle_session_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Established {
                generation,
                connection,
            } => {
                if !self.is_current(generation) {
                    debug!(generation, "dropping connection from a cancelled session");
                    spawn_adapter_worker(connection.client)
                        .send(AdapterCommand::Disconnect)
                        .ok();
                    return;
                }

                let Some(session) = self.session.as_mut() else {
                    return;
                };

                let commands = spawn_adapter_worker(connection.client);
                // Changes made while dialing were kept local until now.
                let playback = self.state_tx.borrow().playback;
                for command in [
                    AdapterCommand::SetVolume(playback.volume),
                    AdapterCommand::SetMute(playback.muted),
                ] {
                    _ = commands.send(command);
                }
                session.commands = Some(commands);

                spawn_event_pump(
                    generation,
                    connection.events,
                    session.cancel.clone(),
                    self.session_tx.clone(),
                );

                let name = session.target.display_name();
                info!(%name, "connected");
                self.publish(|state| {
                    state.connection = ConnectionState::Connected;
                    state.status = format!("Connected to {name}");
                });
            }
            SessionMessage::Failed { generation, error } => {
                if !self.is_current(generation) {
                    return;
                }
                self.session = None;
                self.fail(&error);
            }
            SessionMessage::Event { generation, event } => {
                if !self.is_current(generation) {
                    trace!(generation, "discarding event from a closed session");
                    return;
                }
                self.handle_event(event);
            }
            SessionMessage::Closed { generation } => {
                if !self.is_current(generation) {
                    return;
                }
                self.connection_lost();
            }
        }
    }

    fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::ServerConnected(server) => {
                info!(name = %server.name, version = %server.version, "server connected");
                self.publish(|state| {
                    state.connection = ConnectionState::Connected;
                    state.status = format!("Connected to {}", server.name);
                });
            }
            ClientEvent::StreamStarted(format) => {
                info!(
                    codec = ?format.codec,
                    channels = format.channels,
                    sample_rate = format.sample_rate,
                    bit_depth = format.bit_depth,
                    "stream started"
                );
            }
            ClientEvent::StreamEnded => info!("stream ended"),
            ClientEvent::GroupUpdated(group) => {
                debug!(group_id = %group.group_id, name = ?group.name, "group updated");
            }
            ClientEvent::MetadataReceived(metadata) => {
                let metadata = TrackMetadata::from(metadata);
                debug!(title = %metadata.display_title(), "metadata received");

                self.publish(|state| state.current_metadata = Some(metadata.clone()));
                self.now_playing.update(&metadata, None);
                self.notifications.notify(metadata);
            }
            ClientEvent::ArtworkReceived { channel, data } => {
                debug!(channel, bytes = data.len(), "artwork received");
            }
            ClientEvent::VisualizerData(data) => {
                trace!(bytes = data.len(), "visualizer data received");
            }
            ClientEvent::Error(message) => {
                warn!(%message, "server reported an error");
                self.publish(|state| state.status = format!("Error: {message}"));
            }
        }
    }

    fn connection_lost(&mut self) {
        warn!("event stream closed by server");

        if let Some(session) = self.session.take() {
            session.close();
        }

        self.now_playing.clear();
        self.publish(|state| {
            state.connection = ConnectionState::Failed("connection lost".into());
            state.status = STATUS_CONNECTION_LOST.into();
            state.current_metadata = None;
        });
    }

    fn fail(&mut self, error: &Error) {
        warn!(%error, "connection failed");
        self.publish(|state| {
            state.connection = ConnectionState::Failed(error.to_string());
            state.status = format!("Connection failed: {error}");
        });
    }

    fn publish(&self, modify: impl FnOnce(&mut PlayerState)) {
        self.state_tx.send_modify(modify);
    }

    pub async fn run(&mut self) -> Result<()> {
        loop {
            select! {
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    if self.handle_command(command) {
                        break;
                    }
                }
                Some(message) = self.session_rx.recv() => {
                    self.handle_session_message(message);
                }
            }
        }

        self.disconnect();
        Ok(())
    }
}
