//! Stockage durable des copies locales
//!
//! Un fichier par couple (identifiant, palier) :
//! `{dir}/{sourceId}.{palier}.{ext}`. L'écriture passe par un fichier
//! `.part` renommé une fois complet : un fichier final est toujours entier.

use crate::error::PromotionFailure;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use voyoextract::{ProviderError, QualityTier};
use voyoid::SourceId;

/// Extensions reconnues, dans l'ordre de recherche
pub const MIRROR_EXTENSIONS: [&str; 5] = ["webm", "m4a", "mp3", "mp4", "opus"];

const PART_SUFFIX: &str = "part";

/// Fichier présent dans le miroir
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredFile {
    pub path: PathBuf,
    pub size: u64,
    pub extension: &'static str,
}

/// Extension de stockage pour un type MIME amont
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => "m4a",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" | "audio/opus" => "opus",
        "video/mp4" => "mp4",
        _ => "webm",
    }
}

#[derive(Debug, Clone)]
pub struct MirrorStore {
    dir: PathBuf,
}

impl MirrorStore {
    /// Ouvre (et crée si besoin) le répertoire du miroir
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, source: &SourceId, quality: QualityTier, extension: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}.{}", source, quality.as_str(), extension))
    }

    /// Fichier temporaire d'une écriture en cours
    pub fn part_path(&self, source: &SourceId, quality: QualityTier, extension: &str) -> PathBuf {
        self.file_path(source, quality, extension)
            .with_extension(format!("{}.{}", extension, PART_SUFFIX))
    }

    /// Supprime le `.part` d'une écriture abandonnée
    pub async fn discard_part(&self, source: &SourceId, quality: QualityTier, extension: &str) {
        let path = self.part_path(source, quality, extension);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Discarded part file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Cannot remove part file: {}", e),
        }
    }

    /// Copie complète et non vide, si elle existe
    pub async fn lookup(&self, source: &SourceId, quality: QualityTier) -> Option<MirroredFile> {
        for extension in MIRROR_EXTENSIONS {
            let path = self.file_path(source, quality, extension);
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                if meta.is_file() && meta.len() > 0 {
                    return Some(MirroredFile {
                        path,
                        size: meta.len(),
                        extension,
                    });
                }
            }
        }
        None
    }

    pub async fn contains(&self, source: &SourceId, quality: QualityTier) -> bool {
        self.lookup(source, quality).await.is_some()
    }

    /// Écrit un flux dans le miroir
    ///
    /// Retourne `Ok(false)` sans rien écrire si une copie existe déjà.
    /// `expected_len` permet de rejeter un téléchargement tronqué.
    pub async fn write_stream(
        &self,
        source: &SourceId,
        quality: QualityTier,
        extension: &str,
        expected_len: Option<u64>,
        mut body: BoxStream<'static, Result<Bytes, ProviderError>>,
    ) -> Result<bool, PromotionFailure> {
        if self.contains(source, quality).await {
            return Ok(false);
        }

        let final_path = self.file_path(source, quality, extension);
        let part_path = self.part_path(source, quality, extension);

        let written = async {
            let mut file = tokio::fs::File::create(&part_path).await?;
            let mut received = 0u64;
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                received += chunk.len() as u64;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, PromotionFailure>(received)
        }
        .await;

        let received = match written {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(e);
            }
        };

        let check = match expected_len {
            _ if received == 0 => Err(PromotionFailure::Empty),
            Some(expected) if expected != received => {
                Err(PromotionFailure::Incomplete { expected, received })
            }
            _ => Ok(()),
        };
        if let Err(e) = check {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e);
        }

        // une autre promotion a pu terminer entre-temps
        if self.contains(source, quality).await {
            tokio::fs::remove_file(&part_path).await?;
            return Ok(false);
        }

        tokio::fs::rename(&part_path, &final_path).await?;
        debug!(path = %final_path.display(), bytes = received, "Mirror file written");
        Ok(true)
    }

    /// Supprime les `.part` laissés par une promotion interrompue
    ///
    /// Retourne le nombre de fichiers supprimés.
    pub async fn consolidate(&self) -> std::io::Result<usize> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_part = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == PART_SUFFIX);
            if is_part && entry.file_type().await?.is_file() {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %path.display(), "Cannot remove stale part file: {}", e),
                }
            }
        }

        if removed > 0 {
            info!(removed, "Removed stale mirror part files");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("audio/webm; codecs=\"opus\""), "webm");
        assert_eq!(extension_for_mime("audio/mp4"), "m4a");
        assert_eq!(extension_for_mime("audio/mpeg"), "mp3");
        assert_eq!(extension_for_mime("audio/ogg"), "opus");
        assert_eq!(extension_for_mime("video/mp4"), "mp4");
        assert_eq!(extension_for_mime("application/octet-stream"), "webm");
    }

    #[test]
    fn test_file_naming() {
        let dir = tempfile::tempdir().unwrap();
        let store = MirrorStore::new(dir.path()).unwrap();
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(
            store.file_path(&source, QualityTier::High, "webm"),
            dir.path().join("dQw4w9WgXcQ.high.webm")
        );
        assert_eq!(
            store.part_path(&source, QualityTier::High, "webm"),
            dir.path().join("dQw4w9WgXcQ.high.webm.part")
        );
    }
}
