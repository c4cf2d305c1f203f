use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RCON authentication rejected by server")]
    AuthFailed,

    #[error("RCON connection closed")]
    ConnectionClosed,

    #[error("malformed RCON packet: {0}")]
    MalformedPacket(String),

    #[error("failed to parse server response: {0}")]
    BadResponse(String),

    #[error("failed to fetch map layers: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse map layers document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("map layers catalog has no layers of gamemode {0}")]
    NoSuchGamemode(String),

    #[error("current map {0} not found in rotation")]
    MapNotInRotation(String),
}
