use error::Error;
use playerstate::PlayerState;
use tokio::sync::watch;

pub mod adapter;
pub mod controls;
pub mod error;
pub mod identity;
pub mod manager;
pub mod notification;
pub mod now_playing;
pub mod playerstate;
mod session;

pub use manager::Manager;

pub type Result<T, E = Error> = std::result::Result<T, E>;
pub type StateReceiver = watch::Receiver<PlayerState>;
