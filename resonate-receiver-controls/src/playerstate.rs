use resonate_receiver_models::{ConnectionState, PlaybackControlState, TrackMetadata};

pub const STATUS_DISCONNECTED: &str = "Disconnected";

/// Snapshot published to the UI after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub status: String,
    pub connection: ConnectionState,
    pub current_metadata: Option<TrackMetadata>,
    pub playback: PlaybackControlState,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            status: STATUS_DISCONNECTED.into(),
            connection: Default::default(),
            current_metadata: None,
            playback: Default::default(),
        }
    }
}

impl PlayerState {
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn volume(&self) -> f32 {
        self.playback.volume
    }

    pub fn is_muted(&self) -> bool {
        self.playback.muted
    }
}
