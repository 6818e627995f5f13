//! Erreurs de résolution

use thiserror::Error;
use tokio::task::JoinError;

/// Échec d'un palier de la chaîne d'extraction
///
/// Ces erreurs restent internes : le pipeline les journalise puis passe au
/// palier suivant.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Le palier ne connaît pas ce contenu
    #[error("Not found")]
    NotFound,

    /// Délai dépassé
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Statut HTTP inattendu
    #[error("HTTP status {0}")]
    Status(u16),

    /// Erreur de transport
    #[error("HTTP error: {0}")]
    Http(String),

    /// Réponse illisible ou incomplète
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Aucun candidat ne correspond à la nature demandée
    #[error("No usable candidate")]
    NoCandidate,

    /// Le contenu n'est pas lisible (restriction, suppression...)
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Échec du sous-processus d'extraction
    #[error("Extractor failed: {0}")]
    Process(String),

    /// Palier désactivé ou non configuré
    #[error("Provider disabled")]
    Disabled,
}

impl ProviderError {
    /// Crée une erreur depuis un code de statut HTTP
    pub fn from_status_code(code: u16) -> Self {
        match code {
            404 | 410 => Self::NotFound,
            _ => Self::Status(code),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Http("request timed out".to_string())
        } else if let Some(status) = e.status() {
            Self::from_status_code(status.as_u16())
        } else {
            Self::Http(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Échec de la résolution complète
///
/// `Clone` : un même résultat est rendu à tous les appelants fusionnés.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Tous les paliers ont échoué
    #[error("All providers exhausted")]
    Exhausted,

    /// La tâche de résolution s'est interrompue
    #[error("Resolution task failed: {0}")]
    Internal(String),
}

impl From<JoinError> for ResolutionError {
    fn from(e: JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}
