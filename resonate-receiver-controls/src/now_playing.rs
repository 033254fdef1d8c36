use resonate_receiver_models::TrackMetadata;

/// The OS "now playing" surface. Exactly one instance is handed to the manager.
pub trait NowPlayingSink: Send + Sync {
    fn update(&self, metadata: &TrackMetadata, artwork: Option<&[u8]>);
    fn clear(&self);
}
