use resonate_receiver_models::ServerTarget;
use tracing::warn;

#[derive(Debug)]
pub enum ControlCommand {
    Connect { target: ServerTarget },
    Disconnect,
    SetVolume { volume: f32 },
    ToggleMute,
    Quit,
}

#[derive(Debug, Clone)]
pub struct Controls {
    tx: tokio::sync::mpsc::UnboundedSender<ControlCommand>,
}

impl Controls {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<ControlCommand>) -> Self {
        Self { tx }
    }

    pub fn connect(&self, target: ServerTarget) {
        self.send(ControlCommand::Connect { target });
    }

    pub fn disconnect(&self) {
        self.send(ControlCommand::Disconnect);
    }

    pub fn set_volume(&self, volume: f32) {
        self.send(ControlCommand::SetVolume { volume });
    }

    pub fn toggle_mute(&self) {
        self.send(ControlCommand::ToggleMute);
    }

    pub fn quit(&self) {
        self.send(ControlCommand::Quit);
    }

    fn send(&self, command: ControlCommand) {
        if let Err(error) = self.tx.send(command) {
            warn!(command = ?error.0, "manager is no longer running");
        }
    }
}
