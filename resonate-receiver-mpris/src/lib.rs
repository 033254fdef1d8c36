use mpris_server::{
    LoopStatus, Metadata, PlaybackRate, PlaybackStatus, PlayerInterface, Property, RootInterface,
    Server, Time, TrackId, Volume,
    zbus::{self, fdo},
};
use resonate_receiver_controls::{
    StateReceiver, controls::Controls, now_playing::NowPlayingSink, playerstate::PlayerState,
};
use resonate_receiver_models::TrackMetadata;
use snafu::prelude::*;
use tokio::sync::watch;
use tracing::debug;

const BUS_NAME: &str = "resonate_receiver";

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("Unable to init mpris. Is address already taken?"))]
    MprisInitError,
    #[snafu(display("Unable to set mpris property: {property}"))]
    MprisPropertyError { property: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type NowPlayingReceiver = watch::Receiver<Option<TrackMetadata>>;

/// Now-playing sink that publishes to the MPRIS server started by [`init`].
pub struct MprisNowPlaying {
    tx: watch::Sender<Option<TrackMetadata>>,
}

impl MprisNowPlaying {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn subscribe(&self) -> NowPlayingReceiver {
        self.tx.subscribe()
    }
}

impl Default for MprisNowPlaying {
    fn default() -> Self {
        Self::new()
    }
}

impl NowPlayingSink for MprisNowPlaying {
    fn update(&self, metadata: &TrackMetadata, _artwork: Option<&[u8]>) {
        self.tx.send_replace(Some(metadata.clone()));
    }

    fn clear(&self) {
        self.tx.send_replace(None);
    }
}

struct MprisPlayer {
    controls: Controls,
    now_playing_receiver: NowPlayingReceiver,
    state_receiver: StateReceiver,
}

impl RootInterface for MprisPlayer {
    async fn identity(&self) -> fdo::Result<String> {
        Ok("Resonate Receiver".into())
    }
    async fn raise(&self) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("Not supported".into()))
    }
    async fn quit(&self) -> fdo::Result<()> {
        self.controls.quit();
        Ok(())
    }
    async fn can_quit(&self) -> fdo::Result<bool> {
        Ok(true)
    }
    async fn fullscreen(&self) -> fdo::Result<bool> {
        Err(fdo::Error::NotSupported("Not supported".into()))
    }
    async fn set_fullscreen(&self, _fullscreen: bool) -> zbus::Result<()> {
        Err(zbus::Error::Unsupported)
    }
    async fn can_set_fullscreen(&self) -> fdo::Result<bool> {
        Ok(false)
    }
    async fn can_raise(&self) -> fdo::Result<bool> {
        Ok(false)
    }
    async fn has_track_list(&self) -> fdo::Result<bool> {
        Ok(false)
    }
    async fn desktop_entry(&self) -> fdo::Result<String> {
        Ok("resonate-receiver".into())
    }
    async fn supported_uri_schemes(&self) -> fdo::Result<Vec<String>> {
        Ok(vec![])
    }
    async fn supported_mime_types(&self) -> fdo::Result<Vec<String>> {
        Ok(vec![])
    }
}

// Playback follows the server's group; only volume is controlled locally.
impl PlayerInterface for MprisPlayer {
    async fn next(&self) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("Not supported".into()))
    }

    async fn previous(&self) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("Not supported".into()))
    }

    async fn pause(&self) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("Not supported".into()))
    }

    async fn play_pause(&self) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("Not supported".into()))
    }

    async fn stop(&self) -> fdo::Result<()> {
        self.controls.disconnect();
        Ok(())
    }

    async fn play(&self) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("Not supported".into()))
    }

    async fn seek(&self, _offset: Time) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("Not supported".into()))
    }

    async fn set_position(&self, _track_id: TrackId, _position: Time) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("Not supported".into()))
    }

    async fn open_uri(&self, _uri: String) -> fdo::Result<()> {
        Err(fdo::Error::NotSupported("Not supported".into()))
    }

    async fn playback_status(&self) -> fdo::Result<PlaybackStatus> {
        Ok(playback_status(
            &self.state_receiver.borrow(),
            self.now_playing_receiver.borrow().is_some(),
        ))
    }

    async fn loop_status(&self) -> fdo::Result<LoopStatus> {
        Err(fdo::Error::NotSupported("Not supported".into()))
    }

    async fn set_loop_status(&self, _loop_status: LoopStatus) -> zbus::Result<()> {
        Err(zbus::Error::Unsupported)
    }

    async fn rate(&self) -> fdo::Result<PlaybackRate> {
        Ok(1.0)
    }

    async fn set_rate(&self, _rate: PlaybackRate) -> zbus::Result<()> {
        Err(zbus::Error::Unsupported)
    }

    async fn shuffle(&self) -> fdo::Result<bool> {
        Ok(false)
    }

    async fn set_shuffle(&self, _shuffle: bool) -> zbus::Result<()> {
        Err(zbus::Error::Unsupported)
    }

    async fn metadata(&self) -> fdo::Result<Metadata> {
        let now_playing = self.now_playing_receiver.borrow();

        Ok(now_playing
            .as_ref()
            .map(track_to_metadata)
            .unwrap_or_else(Metadata::new))
    }

    async fn volume(&self) -> fdo::Result<Volume> {
        Ok(effective_volume(&self.state_receiver.borrow()))
    }

    async fn set_volume(&self, volume: Volume) -> zbus::Result<()> {
        self.controls.set_volume(volume as f32);
        Ok(())
    }

    async fn position(&self) -> fdo::Result<Time> {
        Ok(Time::from_millis(0))
    }

    async fn minimum_rate(&self) -> fdo::Result<PlaybackRate> {
        Ok(1.0)
    }

    async fn maximum_rate(&self) -> fdo::Result<PlaybackRate> {
        Ok(1.0)
    }

    async fn can_go_next(&self) -> fdo::Result<bool> {
        Ok(false)
    }

    async fn can_go_previous(&self) -> fdo::Result<bool> {
        Ok(false)
    }

    async fn can_play(&self) -> fdo::Result<bool> {
        Ok(false)
    }

    async fn can_pause(&self) -> fdo::Result<bool> {
        Ok(false)
    }

    async fn can_seek(&self) -> fdo::Result<bool> {
        Ok(false)
    }

    async fn can_control(&self) -> fdo::Result<bool> {
        Ok(true)
    }
}

pub async fn init(
    mut now_playing_receiver: NowPlayingReceiver,
    mut state_receiver: StateReceiver,
    controls: Controls,
) -> Result<()> {
    let Ok(server) = Server::new(
        BUS_NAME,
        MprisPlayer {
            controls,
            now_playing_receiver: now_playing_receiver.clone(),
            state_receiver: state_receiver.clone(),
        },
    )
    .await
    else {
        return Err(Error::MprisInitError);
    };

    while let Some(change) = next_change(&mut now_playing_receiver, &mut state_receiver).await {
        let (properties, names) = match change {
            Change::NowPlaying { track, status } => {
                debug!(title = ?track.as_ref().map(|t| t.display_title().to_string()), "publishing now playing");
                let metadata = track.as_ref().map(track_to_metadata).unwrap_or_else(Metadata::new);
                (
                    [Property::Metadata(metadata), Property::PlaybackStatus(status)],
                    "Metadata, PlaybackStatus",
                )
            }
            Change::Playback { volume, status } => (
                [Property::Volume(volume), Property::PlaybackStatus(status)],
                "Volume, PlaybackStatus",
            ),
        };

        let Ok(_) = server.properties_changed(properties).await else {
            return Err(Error::MprisPropertyError {
                property: names.into(),
            });
        };
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Change {
    NowPlaying {
        track: Option<TrackMetadata>,
        status: PlaybackStatus,
    },
    Playback {
        volume: Volume,
        status: PlaybackStatus,
    },
}

/// Waits for the next change worth publishing. `None` once both senders are gone.
async fn next_change(
    now_playing_receiver: &mut NowPlayingReceiver,
    state_receiver: &mut StateReceiver,
) -> Option<Change> {
    tokio::select! {
        Ok(_) = now_playing_receiver.changed() => {
            let track = now_playing_receiver.borrow_and_update().clone();
            let status = playback_status(&state_receiver.borrow(), track.is_some());
            Some(Change::NowPlaying { track, status })
        },
        Ok(_) = state_receiver.changed() => {
            let state = state_receiver.borrow_and_update().clone();
            let status = playback_status(&state, now_playing_receiver.borrow().is_some());
            Some(Change::Playback { volume: effective_volume(&state), status })
        },
        else => None,
    }
}

fn playback_status(state: &PlayerState, has_track: bool) -> PlaybackStatus {
    if state.is_connected() && has_track {
        PlaybackStatus::Playing
    } else {
        PlaybackStatus::Stopped
    }
}

fn effective_volume(state: &PlayerState) -> Volume {
    if state.is_muted() {
        0.0
    } else {
        state.volume() as f64
    }
}

fn track_to_metadata(track: &TrackMetadata) -> Metadata {
    let mut metadata = Metadata::new();

    metadata.set_title(Some(track.display_title()));
    metadata.set_artist(track.artist.as_ref().map(|artist| vec![artist]));
    metadata.set_album(track.album.clone());
    metadata.set_length(
        track
            .duration
            .map(|duration| Time::from_millis(duration.as_millis() as i64)),
    );
    metadata.set_art_url(track.artwork_url.clone());

    metadata
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use resonate_receiver_models::ConnectionState;

    use super::*;

    fn track() -> TrackMetadata {
        TrackMetadata {
            title: Some("A".into()),
            artist: Some("B".into()),
            album: None,
            duration: Some(Duration::from_secs(180)),
            artwork_url: Some("http://example.com/a.jpg".into()),
        }
    }

    #[test]
    fn metadata_only_carries_known_fields() {
        let metadata = track_to_metadata(&track());

        assert_eq!(metadata.title(), Some("A"));
        assert_eq!(metadata.album(), None);
        assert_eq!(metadata.length(), Some(Time::from_secs(180)));
        assert_eq!(metadata.art_url(), Some("http://example.com/a.jpg".to_string()));
    }

    #[test]
    fn sink_publishes_and_clears() {
        let sink = MprisNowPlaying::new();
        let mut receiver = sink.subscribe();

        sink.update(&track(), None);
        assert!(receiver.has_changed().unwrap());
        assert_eq!(receiver.borrow_and_update().clone(), Some(track()));

        sink.clear();
        assert_eq!(receiver.borrow_and_update().clone(), None);
    }

    #[test]
    fn status_requires_connection_and_track() {
        let mut state = PlayerState::default();
        assert_eq!(playback_status(&state, true), PlaybackStatus::Stopped);

        state.connection = ConnectionState::Connected;
        assert_eq!(playback_status(&state, false), PlaybackStatus::Stopped);
        assert_eq!(playback_status(&state, true), PlaybackStatus::Playing);
    }

    #[test]
    fn muted_volume_reports_zero() {
        let mut state = PlayerState::default();
        state.playback.set_volume(0.5);
        assert_eq!(effective_volume(&state), 0.5);

        state.playback.toggle_mute();
        assert_eq!(effective_volume(&state), 0.0);
    }

    fn connected() -> PlayerState {
        PlayerState {
            connection: ConnectionState::Connected,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn now_playing_updates_publish_metadata_and_status() {
        let sink = MprisNowPlaying::new();
        let (_state_tx, mut state_receiver) = watch::channel(connected());
        let mut now_playing_receiver = sink.subscribe();

        sink.update(&track(), None);
        assert_eq!(
            next_change(&mut now_playing_receiver, &mut state_receiver).await,
            Some(Change::NowPlaying {
                track: Some(track()),
                status: PlaybackStatus::Playing,
            })
        );

        sink.clear();
        assert_eq!(
            next_change(&mut now_playing_receiver, &mut state_receiver).await,
            Some(Change::NowPlaying {
                track: None,
                status: PlaybackStatus::Stopped,
            })
        );
    }

    #[tokio::test]
    async fn state_updates_publish_volume() {
        let sink = MprisNowPlaying::new();
        let (state_tx, mut state_receiver) = watch::channel(connected());
        let mut now_playing_receiver = sink.subscribe();

        state_tx.send_modify(|state| state.playback.set_volume(0.25));
        assert_eq!(
            next_change(&mut now_playing_receiver, &mut state_receiver).await,
            Some(Change::Playback {
                volume: 0.25,
                status: PlaybackStatus::Stopped,
            })
        );

        state_tx.send_modify(|state| state.playback.toggle_mute());
        assert_eq!(
            next_change(&mut now_playing_receiver, &mut state_receiver).await,
            Some(Change::Playback {
                volume: 0.0,
                status: PlaybackStatus::Stopped,
            })
        );
    }

    #[tokio::test]
    async fn publishing_stops_when_sources_close() {
        let sink = MprisNowPlaying::new();
        let (state_tx, mut state_receiver) = watch::channel(PlayerState::default());
        let mut now_playing_receiver = sink.subscribe();

        drop(sink);
        drop(state_tx);

        assert_eq!(
            next_change(&mut now_playing_receiver, &mut state_receiver).await,
            None
        );
    }
}
