use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::stream::BoxStream;
use resonate_receiver_models::{ServerTarget, TrackMetadata};
use url::Url;

use crate::{Result, error::Error};

pub const CONNECTION_PATH: &str = "/resonate";
pub const DEFAULT_BUFFER_CAPACITY: usize = 1_048_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    Metadata,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Metadata => "metadata",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Opus,
    Flac,
    Pcm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub codec: Codec,
    pub channels: u8,
    pub sample_rate: u32,
    pub bit_depth: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSupport {
    pub buffer_capacity: usize,
    pub supported_formats: Vec<AudioFormat>,
}

impl Default for PlayerSupport {
    fn default() -> Self {
        let format = |codec, sample_rate, bit_depth| AudioFormat {
            codec,
            channels: 2,
            sample_rate,
            bit_depth,
        };

        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            supported_formats: vec![
                format(Codec::Opus, 48_000, 16),
                format(Codec::Flac, 48_000, 24),
                format(Codec::Flac, 44_100, 16),
                format(Codec::Pcm, 48_000, 16),
                format(Codec::Pcm, 44_100, 16),
            ],
        }
    }
}

/// Everything the streaming library needs to open a session for this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub client_id: String,
    pub name: String,
    pub roles: Vec<Role>,
    pub player_support: PlayerSupport,
}

impl SessionConfig {
    pub fn new(client_id: String, name: String) -> Self {
        Self {
            client_id,
            name,
            roles: vec![Role::Player, Role::Metadata],
            player_support: Default::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub group_id: String,
    pub name: Option<String>,
}

/// Metadata as pushed by the server, before normalization.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StreamMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_seconds: Option<f64>,
    pub artwork_url: Option<String>,
}

impl From<StreamMetadata> for TrackMetadata {
    fn from(value: StreamMetadata) -> Self {
        Self {
            title: non_empty(value.title),
            artist: non_empty(value.artist),
            album: non_empty(value.album),
            duration: value
                .duration_seconds
                .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok()),
            artwork_url: non_empty(value.artwork_url),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ServerConnected(ServerInfo),
    StreamStarted(AudioFormat),
    StreamEnded,
    GroupUpdated(GroupInfo),
    MetadataReceived(StreamMetadata),
    ArtworkReceived { channel: u8, data: Vec<u8> },
    VisualizerData(Vec<u8>),
    Error(String),
}

pub type EventStream = BoxStream<'static, ClientEvent>;

#[async_trait]
pub trait StreamingClient: Send + Sync {
    async fn disconnect(&self) -> Result<()>;
    async fn set_volume(&self, volume: f32) -> Result<()>;
    async fn set_mute(&self, muted: bool) -> Result<()>;
}

pub struct Connection {
    pub client: Arc<dyn StreamingClient>,
    pub events: EventStream,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: Url, session: SessionConfig) -> Result<Connection>;
}

pub fn connection_url(target: &ServerTarget) -> Result<Url> {
    if !target.is_valid() {
        return Err(Error::Configuration {
            message: format!(
                "{} is not a valid server address (port must be within 1-65535)",
                target.address()
            ),
        });
    }

    let host = target.hostname.trim();
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };

    let url = Url::parse(&format!("ws://{host}:{}{CONNECTION_PATH}", target.port))?;
    Ok(url)
}
