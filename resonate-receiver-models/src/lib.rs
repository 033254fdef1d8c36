use std::{fmt, time::Duration};

pub const UNKNOWN_TRACK: &str = "Unknown Track";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// A session exists or is being established.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }

    pub fn can_connect(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Failed(_)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Option<Duration>,
    pub artwork_url: Option<String>,
}

impl TrackMetadata {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNKNOWN_TRACK)
    }

    pub fn display_artist(&self) -> &str {
        self.artist.as_deref().unwrap_or(UNKNOWN_ARTIST)
    }

    pub fn display_album(&self) -> &str {
        self.album.as_deref().unwrap_or(UNKNOWN_ALBUM)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ServerTarget {
    pub hostname: String,
    pub port: u16,
    pub name: Option<String>,
}

impl ServerTarget {
    pub fn new(hostname: impl Into<String>, port: u16, name: Option<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            name,
        }
    }

    pub fn is_valid_port(port: i64) -> bool {
        (1..=65535).contains(&port)
    }

    pub fn is_valid(&self) -> bool {
        Self::is_valid_port(self.port.into()) && !self.hostname.trim().is_empty()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    /// Name shown to the user, falling back to `host:port`.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => self.address(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackControlState {
    pub volume: f32,
    pub muted: bool,
}

impl Default for PlaybackControlState {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
        }
    }
}

impl PlaybackControlState {
    pub fn clamp_volume(value: f32) -> f32 {
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(0.0, 1.0)
    }

    /// Adjusting the volume always unmutes.
    pub fn set_volume(&mut self, value: f32) {
        self.volume = Self::clamp_volume(value);
        self.muted = false;
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_metadata() -> TrackMetadata {
        TrackMetadata {
            title: Some("Song Title".into()),
            artist: Some("Artist Name".into()),
            album: Some("Album Name".into()),
            duration: Some(Duration::from_secs(180)),
            artwork_url: Some("http://example.com/art.jpg".into()),
        }
    }

    #[test]
    fn display_properties_fall_back_when_absent() {
        let metadata = TrackMetadata::default();

        assert_eq!(metadata.display_title(), "Unknown Track");
        assert_eq!(metadata.display_artist(), "Unknown Artist");
        assert_eq!(metadata.display_album(), "Unknown Album");
    }

    #[test]
    fn display_properties_return_actual_values() {
        let metadata = full_metadata();

        assert_eq!(metadata.display_title(), "Song Title");
        assert_eq!(metadata.display_artist(), "Artist Name");
        assert_eq!(metadata.display_album(), "Album Name");
    }

    #[test]
    fn metadata_equality_covers_every_field() {
        assert_eq!(full_metadata(), full_metadata());

        let variants = [
            TrackMetadata {
                title: Some("Different Song".into()),
                ..full_metadata()
            },
            TrackMetadata {
                artist: None,
                ..full_metadata()
            },
            TrackMetadata {
                album: Some("Other".into()),
                ..full_metadata()
            },
            TrackMetadata {
                duration: Some(Duration::from_secs(181)),
                ..full_metadata()
            },
            TrackMetadata {
                artwork_url: None,
                ..full_metadata()
            },
        ];

        for variant in variants {
            assert_ne!(variant, full_metadata());
        }
    }

    #[test]
    fn port_validation() {
        assert!(ServerTarget::is_valid_port(8080));
        assert!(ServerTarget::is_valid_port(1));
        assert!(ServerTarget::is_valid_port(65535));
        assert!(!ServerTarget::is_valid_port(0));
        assert!(!ServerTarget::is_valid_port(65536));
        assert!(!ServerTarget::is_valid_port(-1));

        assert!(!ServerTarget::new("host", 0, None).is_valid());
        assert!(!ServerTarget::new(" ", 8080, None).is_valid());
        assert!(ServerTarget::new("host", 8080, None).is_valid());
    }

    #[test]
    fn server_target_json() {
        let target = ServerTarget::new("192.168.1.100", 8080, Some("Living Room".into()));

        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(
            json,
            r#"{"hostname":"192.168.1.100","port":8080,"name":"Living Room"}"#
        );

        let decoded: ServerTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, target);
    }

    #[test]
    fn display_name_falls_back_to_address() {
        let target = ServerTarget::new("10.0.0.5", 8080, None);
        assert_eq!(target.display_name(), "10.0.0.5:8080");

        let target = ServerTarget::new("10.0.0.5", 8080, Some("Studio".into()));
        assert_eq!(target.display_name(), "Studio");
    }

    #[test]
    fn volume_is_clamped_and_unmutes() {
        let mut state = PlaybackControlState {
            volume: 0.5,
            muted: true,
        };

        state.set_volume(1.7);
        assert_eq!(state.volume, 1.0);
        assert!(!state.muted);

        state.set_volume(1.7);
        assert_eq!(state.volume, 1.0);

        state.set_volume(-3.0);
        assert_eq!(state.volume, 0.0);

        state.set_volume(f32::NAN);
        assert_eq!(state.volume, 0.0);

        state.set_volume(0.25);
        assert_eq!(state.volume, 0.25);
    }

    #[test]
    fn toggle_mute_keeps_volume() {
        let mut state = PlaybackControlState::default();
        state.set_volume(0.3);

        state.toggle_mute();
        assert!(state.muted);
        assert_eq!(state.volume, 0.3);

        state.toggle_mute();
        assert!(!state.muted);
        assert_eq!(state.volume, 0.3);
    }

    #[test]
    fn connection_state_transitions() {
        assert!(ConnectionState::Disconnected.can_connect());
        assert!(ConnectionState::Failed("x".into()).can_connect());
        assert!(!ConnectionState::Connecting.can_connect());
        assert!(!ConnectionState::Connected.can_connect());
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
    }
}
