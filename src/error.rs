use thiserror::Error;

/// Failures of the asset/rate lookup behind the mirror balance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeError {
    #[error("no mirror asset configured (set a target asset or the baseAssetId setting)")]
    NoMirrorAsset,

    #[error("unknown asset '{0}'")]
    UnknownAsset(String),

    #[error("no rate from {from} to {to}")]
    RateUnavailable { from: String, to: String },

    #[error("rate lookup failed: {0}")]
    Lookup(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid window pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Failures querying Hyprland for the active window.
#[derive(Debug, Error)]
pub enum HyprError {
    #[error("failed to run hyprctl: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected hyprctl output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error returned from the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid listen address: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
}
