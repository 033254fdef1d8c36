use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use resonate_receiver_models::TrackMetadata;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{Result, error::Error};

pub const DEFAULT_ARTWORK_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ARTWORK_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSound {
    Default,
    Silent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub sound: NotificationSound,
    pub attachment: Option<PathBuf>,
}

impl NotificationContent {
    pub fn for_track(metadata: &TrackMetadata) -> Self {
        let body = match (&metadata.artist, &metadata.album) {
            (Some(artist), Some(album)) => format!("{artist} • {album}"),
            (Some(artist), None) => artist.clone(),
            (None, Some(album)) => album.clone(),
            (None, None) => String::new(),
        };

        Self {
            title: metadata.display_title().to_string(),
            body,
            sound: NotificationSound::Default,
            attachment: None,
        }
    }
}

/// The OS notification center.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn request_permission(&self) -> bool;
    async fn deliver(&self, id: &str, content: &NotificationContent) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ArtworkFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Artwork>;
}

pub struct HttpArtworkFetcher {
    client: reqwest::Client,
}

impl HttpArtworkFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ArtworkFetcher for HttpArtworkFetcher {
    async fn fetch(&self, url: &str) -> Result<Artwork> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(length) = response.content_length()
            && length > MAX_ARTWORK_BYTES as u64
        {
            return Err(Error::Artwork {
                message: format!("artwork too large: {length} bytes"),
            });
        }

        let bytes = response.bytes().await?;

        if bytes.is_empty() {
            return Err(Error::Artwork {
                message: "empty response".into(),
            });
        }

        if bytes.len() > MAX_ARTWORK_BYTES {
            return Err(Error::Artwork {
                message: format!("artwork too large: {} bytes", bytes.len()),
            });
        }

        Ok(Artwork {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    fetcher: Arc<dyn ArtworkFetcher>,
    artwork_timeout: Duration,
    permission: Option<bool>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, fetcher: Arc<dyn ArtworkFetcher>) -> Self {
        Self {
            sink,
            fetcher,
            artwork_timeout: DEFAULT_ARTWORK_TIMEOUT,
            permission: None,
        }
    }

    pub fn with_artwork_timeout(mut self, timeout: Duration) -> Self {
        self.artwork_timeout = timeout;
        self
    }

    /// Posts a notification for the track. Never fails: every error degrades to
    /// an artwork-less notification or to silence.
    pub async fn notify(&mut self, metadata: &TrackMetadata) {
        if !self.permission_granted().await {
            debug!("notification permission denied, skipping");
            return;
        }

        let mut content = NotificationContent::for_track(metadata);
        let id = Uuid::new_v4().to_string();

        if let Some(url) = metadata.artwork_url.as_deref() {
            match self.download_artwork(url).await {
                Ok(file) => {
                    content.attachment = Some(file.path().to_path_buf());
                    self.deliver(&id, &content).await;
                    // The temporary file is removed when `file` drops.
                    return;
                }
                Err(error) => {
                    warn!(%url, %error, "artwork unavailable, notifying without it");
                }
            }
        }

        self.deliver(&id, &content).await;
    }

    /// Spawns a worker that posts notifications one at a time, in the order
    /// they were queued.
    pub fn spawn(mut self) -> NotificationQueue {
        let (tx, mut rx) = mpsc::unbounded_channel::<TrackMetadata>();

        tokio::spawn(async move {
            while let Some(metadata) = rx.recv().await {
                self.notify(&metadata).await;
            }
            debug!("notification worker stopped");
        });

        NotificationQueue { tx }
    }

    async fn permission_granted(&mut self) -> bool {
        match self.permission {
            Some(granted) => granted,
            None => {
                let granted = self.sink.request_permission().await;
                info!(granted, "notification permission requested");
                self.permission = Some(granted);
                granted
            }
        }
    }

    async fn download_artwork(&self, url: &str) -> Result<NamedTempFile> {
        let artwork = tokio::time::timeout(self.artwork_timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| Error::Artwork {
                message: format!("timed out after {:?}", self.artwork_timeout),
            })??;

        let suffix = artwork_suffix(artwork.content_type.as_deref(), url);

        tokio::task::spawn_blocking(move || -> Result<NamedTempFile> {
            let mut file = tempfile::Builder::new()
                .prefix("resonate-artwork-")
                .suffix(suffix)
                .tempfile()?;
            file.write_all(&artwork.bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|error| Error::Artwork {
            message: error.to_string(),
        })?
    }

    async fn deliver(&self, id: &str, content: &NotificationContent) {
        match self.sink.deliver(id, content).await {
            Ok(()) => debug!(%id, title = %content.title, "notification delivered"),
            Err(error) => warn!(%id, %error, "notification delivery failed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<TrackMetadata>,
}

impl NotificationQueue {
    pub fn notify(&self, metadata: TrackMetadata) {
        if self.tx.send(metadata).is_err() {
            warn!("notification worker is not running");
        }
    }
}

fn artwork_suffix(content_type: Option<&str>, url: &str) -> &'static str {
    let from_content_type = content_type.and_then(|content_type| {
        let mime = content_type.split(';').next().unwrap_or_default().trim();
        match mime {
            "image/png" => Some(".png"),
            "image/jpeg" | "image/jpg" => Some(".jpg"),
            "image/gif" => Some(".gif"),
            "image/webp" => Some(".webp"),
            _ => None,
        }
    });

    if let Some(suffix) = from_content_type {
        return suffix;
    }

    let path = url.split(['?', '#']).next().unwrap_or_default();
    let extension = Path::new(path)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => ".png",
        Some("jpg") | Some("jpeg") => ".jpg",
        Some("gif") => ".gif",
        Some("webp") => ".webp",
        _ => ".img",
    }
}
