use snafu::prelude::*;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("Invalid server configuration: {message}"))]
    Configuration { message: String },
    #[snafu(display("{message}"))]
    Connection { message: String },
    #[snafu(display("Already connected or connecting"))]
    AlreadyActive,
    #[snafu(display("{message}"))]
    Stream { message: String },
    #[snafu(display("Unable to resolve client identity: {message}"))]
    Identity { message: String },
    #[snafu(display("Notification failed: {message}"))]
    Notification { message: String },
    #[snafu(display("Artwork download failed: {message}"))]
    Artwork { message: String },
    #[snafu(display("IO error: {source}"))]
    Io {
        #[snafu(source)]
        source: std::io::Error,
    },
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Self {
        Self::Configuration {
            message: value.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::Artwork {
            message: value.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Connection {
            message: "timed out".into(),
        }
    }
}
