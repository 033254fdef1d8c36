use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

use crate::Result;

/// Persistence for the client identifier.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn load_client_id(&self) -> Result<Option<String>>;
    async fn store_client_id(&self, client_id: &str) -> Result<()>;
}

pub struct IdentityStore {
    backend: Arc<dyn IdentityBackend>,
    client_id: OnceCell<String>,
}

impl IdentityStore {
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        Self {
            backend,
            client_id: OnceCell::new(),
        }
    }

    /// Loads the persisted identifier, creating and storing one on first use.
    pub async fn current_client_id(&self) -> Result<String> {
        self.client_id
            .get_or_try_init(|| self.load_or_create())
            .await
            .cloned()
    }

    async fn load_or_create(&self) -> Result<String> {
        if let Some(client_id) = self.backend.load_client_id().await?
            && !client_id.trim().is_empty()
        {
            return Ok(client_id);
        }

        let client_id = Uuid::new_v4().to_string();
        self.backend.store_client_id(&client_id).await?;
        info!(%client_id, "generated new client identity");

        Ok(client_id)
    }
}
