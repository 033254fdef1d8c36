use std::sync::Arc;

use resonate_receiver_controls::{
    StateReceiver,
    adapter::Connector,
    controls::Controls,
    identity::IdentityStore,
    manager::{DEFAULT_CLIENT_NAME, Manager},
    notification::{DEFAULT_ARTWORK_TIMEOUT, HttpArtworkFetcher, Notifier},
    now_playing::NowPlayingSink,
};
use resonate_receiver_database::Database;
use resonate_receiver_mpris::MprisNowPlaying;
use resonate_receiver_notify::DesktopNotifications;
use tracing::{info, warn};

use crate::cli::Error;

/// The assembled receiver: manager, sinks and settings.
pub struct Receiver {
    manager: Manager,
    database: Arc<Database>,
}

impl Receiver {
    pub fn new(
        connector: Arc<dyn Connector>,
        database: Arc<Database>,
        now_playing: Arc<dyn NowPlayingSink>,
        notifier: Notifier,
    ) -> Self {
        let identity = Arc::new(IdentityStore::new(database.clone()));
        let manager = Manager::new(connector, identity, now_playing, notifier.spawn());

        Self { manager, database }
    }

    pub fn controls(&self) -> Controls {
        self.manager.controls()
    }

    pub fn state(&self) -> StateReceiver {
        self.manager.state()
    }

    /// Connects to the saved server, if there is one, and runs until quit.
    pub async fn run(mut self) -> Result<(), Error> {
        match self.database.get_server_target().await? {
            Some(target) => {
                info!(server = %target.display_name(), "connecting to saved server");
                if let Err(error) = self.manager.connect(target) {
                    warn!(%error, "unable to connect to saved server");
                }
            }
            None => info!("no saved server, waiting for a connect request"),
        }

        self.manager.run().await?;
        Ok(())
    }
}

/// Runs the receiver with the desktop notification and MPRIS sinks until
/// quit is requested or the process is interrupted.
pub async fn run_receiver(
    connector: Arc<dyn Connector>,
    database: Arc<Database>,
    enable_mpris: bool,
) -> Result<(), Error> {
    let notifier = Notifier::new(
        Arc::new(DesktopNotifications::new(DEFAULT_CLIENT_NAME)),
        Arc::new(HttpArtworkFetcher::new(DEFAULT_ARTWORK_TIMEOUT)?),
    );
    let now_playing = Arc::new(MprisNowPlaying::new());

    let receiver = Receiver::new(connector, database, now_playing.clone(), notifier);

    if enable_mpris {
        let now_playing_receiver = now_playing.subscribe();
        let state_receiver = receiver.state();
        let controls = receiver.controls();
        tokio::spawn(async move {
            if let Err(error) =
                resonate_receiver_mpris::init(now_playing_receiver, state_receiver, controls).await
            {
                warn!(%error, "mpris disabled");
            }
        });
    }

    let controls = receiver.controls();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            controls.quit();
        }
    });

    receiver.run().await
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use async_trait::async_trait;
    use futures::channel::mpsc;
    use resonate_receiver_controls::{
        Result,
        adapter::{ClientEvent, Connection, SessionConfig, StreamMetadata, StreamingClient},
        error::Error as ControlsError,
        notification::{Artwork, ArtworkFetcher, NotificationContent, NotificationSink},
    };
    use resonate_receiver_models::{ConnectionState, ServerTarget};
    use url::Url;

    use super::*;

    struct NoopClient;

    #[async_trait]
    impl StreamingClient for NoopClient {
        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }

        async fn set_volume(&self, _volume: f32) -> Result<()> {
            Ok(())
        }

        async fn set_mute(&self, _muted: bool) -> Result<()> {
            Ok(())
        }
    }

    struct FakeConnector {
        urls: Mutex<Vec<Url>>,
        events: Mutex<Option<mpsc::UnboundedReceiver<ClientEvent>>>,
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self, url: Url, _session: SessionConfig) -> Result<Connection> {
            self.urls.lock().unwrap().push(url);

            let Some(events) = self.events.lock().unwrap().take() else {
                return Err(ControlsError::Connection {
                    message: "already used".into(),
                });
            };

            Ok(Connection {
                client: Arc::new(NoopClient),
                events: Box::pin(events),
            })
        }
    }

    struct Denied;

    #[async_trait]
    impl NotificationSink for Denied {
        async fn request_permission(&self) -> bool {
            false
        }

        async fn deliver(&self, _id: &str, _content: &NotificationContent) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl ArtworkFetcher for Denied {
        async fn fetch(&self, _url: &str) -> Result<Artwork> {
            Err(ControlsError::Artwork {
                message: "offline".into(),
            })
        }
    }

    fn connector() -> (Arc<FakeConnector>, mpsc::UnboundedSender<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded();
        let connector = FakeConnector {
            urls: Mutex::new(Vec::new()),
            events: Mutex::new(Some(rx)),
        };
        (Arc::new(connector), tx)
    }

    async fn database(dir: &tempfile::TempDir) -> Arc<Database> {
        Arc::new(Database::open(&dir.path().join("data.db")).await.unwrap())
    }

    #[tokio::test]
    async fn connects_to_saved_server_and_feeds_now_playing() {
        let dir = tempfile::tempdir().unwrap();
        let database = database(&dir).await;
        database
            .set_server_target(&ServerTarget::new(
                "10.0.0.5",
                8080,
                Some("Living Room".into()),
            ))
            .await
            .unwrap();

        let (connector, events) = connector();
        let now_playing = Arc::new(MprisNowPlaying::new());
        let mut now_playing_receiver = now_playing.subscribe();
        let notifier = Notifier::new(Arc::new(Denied), Arc::new(Denied));

        let receiver = Receiver::new(connector.clone(), database, now_playing, notifier);
        let controls = receiver.controls();
        let mut state = receiver.state();
        let handle = tokio::spawn(receiver.run());

        tokio::time::timeout(
            Duration::from_secs(2),
            state.wait_for(|s| s.status == "Connected to Living Room"),
        )
        .await
        .unwrap()
        .unwrap();

        events
            .unbounded_send(ClientEvent::MetadataReceived(StreamMetadata {
                title: Some("Track".into()),
                ..Default::default()
            }))
            .unwrap();

        tokio::time::timeout(
            Duration::from_secs(2),
            now_playing_receiver.wait_for(|track| track.is_some()),
        )
        .await
        .unwrap()
        .unwrap();

        controls.quit();
        handle.await.unwrap().unwrap();

        assert_eq!(
            connector.urls.lock().unwrap()[0].as_str(),
            "ws://10.0.0.5:8080/resonate"
        );
        assert_eq!(*now_playing_receiver.borrow(), None);
    }

    #[tokio::test]
    async fn waits_without_saved_server() {
        let dir = tempfile::tempdir().unwrap();
        let database = database(&dir).await;

        let (connector, _events) = connector();
        let notifier = Notifier::new(Arc::new(Denied), Arc::new(Denied));
        let receiver = Receiver::new(
            connector.clone(),
            database,
            Arc::new(MprisNowPlaying::new()),
            notifier,
        );
        let controls = receiver.controls();
        let state = receiver.state();
        let handle = tokio::spawn(receiver.run());

        controls.quit();
        handle.await.unwrap().unwrap();

        assert_eq!(state.borrow().connection, ConnectionState::Disconnected);
        assert!(connector.urls.lock().unwrap().is_empty());
    }
}
