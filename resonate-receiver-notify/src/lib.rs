use std::collections::HashMap;

use async_trait::async_trait;
use resonate_receiver_controls::{
    Result,
    error::Error,
    notification::{NotificationContent, NotificationSink, NotificationSound},
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use zbus::{Connection, proxy, zvariant::Value};

const DEFAULT_SOUND: &str = "message-new-instant";
const DEFAULT_EXPIRE_TIMEOUT: i32 = -1;

#[proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn get_server_information(&self) -> zbus::Result<(String, String, String, String)>;
}

/// Desktop notifications over the freedesktop D-Bus interface.
pub struct DesktopNotifications {
    app_name: String,
    proxy: OnceCell<NotificationsProxy<'static>>,
}

impl DesktopNotifications {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            proxy: OnceCell::new(),
        }
    }

    async fn proxy(&self) -> zbus::Result<&NotificationsProxy<'static>> {
        self.proxy
            .get_or_try_init(|| async {
                let connection = Connection::session().await?;
                NotificationsProxy::new(&connection).await
            })
            .await
    }
}

#[async_trait]
impl NotificationSink for DesktopNotifications {
    async fn request_permission(&self) -> bool {
        let proxy = match self.proxy().await {
            Ok(proxy) => proxy,
            Err(error) => {
                warn!(%error, "session bus unavailable");
                return false;
            }
        };

        match proxy.get_server_information().await {
            Ok((name, vendor, version, _)) => {
                info!(%name, %vendor, %version, "notification server found");
                true
            }
            Err(error) => {
                warn!(%error, "no notification server");
                false
            }
        }
    }

    async fn deliver(&self, id: &str, content: &NotificationContent) -> Result<()> {
        let proxy = self.proxy().await.map_err(notification_error)?;

        let server_id = proxy
            .notify(
                &self.app_name,
                0,
                "",
                &content.title,
                &content.body,
                &[],
                hints(content),
                DEFAULT_EXPIRE_TIMEOUT,
            )
            .await
            .map_err(notification_error)?;

        debug!(%id, server_id, "notification posted");
        Ok(())
    }
}

fn notification_error(error: zbus::Error) -> Error {
    Error::Notification {
        message: error.to_string(),
    }
}

fn hints(content: &NotificationContent) -> HashMap<&'static str, Value<'static>> {
    let mut hints = HashMap::new();

    match content.sound {
        NotificationSound::Default => {
            hints.insert("sound-name", Value::from(DEFAULT_SOUND));
        }
        NotificationSound::Silent => {
            hints.insert("suppress-sound", Value::from(true));
        }
    }

    if let Some(path) = &content.attachment {
        hints.insert(
            "image-path",
            Value::from(format!("file://{}", path.display())),
        );
    }

    hints
}
