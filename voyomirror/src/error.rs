use thiserror::Error;
use voyoextract::ProviderError;

/// Échec d'une promotion vers le miroir local
///
/// Toujours journalisé, jamais renvoyé au client.
#[derive(Error, Debug)]
pub enum PromotionFailure {
    #[error("Download failed: {0}")]
    Download(#[from] ProviderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Incomplete download: expected {expected} bytes, got {received}")]
    Incomplete { expected: u64, received: u64 },

    #[error("Empty download")]
    Empty,

    #[error("Download exceeded {0:?}")]
    Timeout(std::time::Duration),
}
