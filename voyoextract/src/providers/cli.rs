//! Dernier palier : outil d'extraction en ligne de commande (`yt-dlp`)
//!
//! Le nombre d'invocations simultanées est plafonné pour tout le processus
//! et chaque invocation est tuée si elle dépasse son échéance.

use crate::error::ProviderError;
use crate::model::{MediaKind, QualityTier, StreamDescriptor, is_http_url};
use crate::provider::Provider;
use crate::providers::watch_url;
use async_trait::async_trait;
use chrono::Utc;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use voyoid::SourceId;

/// Sélecteur de format déterministe pour une nature et un palier
///
/// La vidéo ne demande que des formats muxés : le proxy ne diffuse qu'une URL.
pub fn format_selector(kind: MediaKind, quality: QualityTier) -> &'static str {
    match (kind, quality) {
        (MediaKind::Audio, QualityTier::Low) => "bestaudio[abr<=64]/worstaudio",
        (MediaKind::Audio, QualityTier::Standard) => "bestaudio[abr<=128]/bestaudio",
        (MediaKind::Audio, QualityTier::High) => "bestaudio",
        (MediaKind::Video, QualityTier::Low) => "best[height<=360]/worst",
        (MediaKind::Video, QualityTier::Standard) => "best[height<=720]/best",
        (MediaKind::Video, QualityTier::High) => "best[height<=1080]/best",
    }
}

/// Analyse la sortie de `-g` : une URL, ou deux si audio et vidéo sont séparés
///
/// Retourne `(url principale, url audio éventuelle)`.
pub fn parse_cli_output(stdout: &str) -> Result<(String, Option<String>), ProviderError> {
    let urls: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if urls.iter().any(|u| !is_http_url(u)) {
        return Err(ProviderError::Malformed("unexpected extractor output".to_string()));
    }

    match urls.as_slice() {
        [single] => Ok((single.to_string(), None)),
        [video, audio] => Ok((video.to_string(), Some(audio.to_string()))),
        [] => Err(ProviderError::Malformed("empty extractor output".to_string())),
        _ => Err(ProviderError::Malformed(format!(
            "expected one or two URLs, got {}",
            urls.len()
        ))),
    }
}

/// Type MIME annoncé dans l'URL (`mime=audio%2Fwebm`), sinon déduit de la nature
fn mime_from_url(url: &str, kind: MediaKind) -> String {
    url.split(['?', '&'])
        .find_map(|part| part.strip_prefix("mime="))
        .map(|m| m.replace("%2F", "/").replace("%2f", "/"))
        .filter(|m| kind.matches_mime(m))
        .unwrap_or_else(|| match kind {
            MediaKind::Audio => "audio/webm".to_string(),
            MediaKind::Video => "video/mp4".to_string(),
        })
}

pub struct CliProvider {
    program: String,
    permits: Arc<Semaphore>,
    deadline: Duration,
}

impl CliProvider {
    /// # Arguments
    ///
    /// * `program` - Exécutable à lancer (`yt-dlp`)
    /// * `max_concurrent` - Nombre maximal de sous-processus simultanés
    /// * `deadline` - Échéance d'une invocation, attente du créneau comprise
    pub fn new(program: impl Into<String>, max_concurrent: usize, deadline: Duration) -> Self {
        Self {
            program: program.into(),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            deadline,
        }
    }

    /// Créneaux libres
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn run(&self, source: &SourceId, selector: &str) -> Result<String, ProviderError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ProviderError::Disabled)?;

        // `source` est validé : un seul argument, sans métacaractère
        let mut command = Command::new(&self.program);
        command
            .arg("-f")
            .arg(selector)
            .arg("-g")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--")
            .arg(watch_url(source))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| ProviderError::Process(format!("spawn failed: {}", e)))?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ProviderError::Process(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                status = ?output.status.code(),
                "Extractor exited with failure: {}",
                stderr.lines().last().unwrap_or_default()
            );
            return Err(ProviderError::Process(format!("exit status {:?}", output.status.code())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Provider for CliProvider {
    fn name(&self) -> &str {
        "cli"
    }

    async fn resolve(
        &self,
        source: &SourceId,
        kind: MediaKind,
        quality: QualityTier,
    ) -> Result<StreamDescriptor, ProviderError> {
        let selector = format_selector(kind, quality);
        debug!(selector, "Invoking extractor");

        // l'abandon du future tue le sous-processus (kill_on_drop)
        let stdout = tokio::time::timeout(self.deadline, self.run(source, selector))
            .await
            .map_err(|_| ProviderError::Timeout(self.deadline))??;

        let (playable_url, audio_url) = parse_cli_output(&stdout)?;
        let mime_type = mime_from_url(&playable_url, kind);

        Ok(StreamDescriptor {
            playable_url,
            audio_url,
            mime_type,
            // `-g` ne donne pas le débit
            bitrate: 0,
            kind,
            quality,
            resolved_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_are_deterministic() {
        assert_eq!(format_selector(MediaKind::Audio, QualityTier::Low), "bestaudio[abr<=64]/worstaudio");
        assert_eq!(format_selector(MediaKind::Audio, QualityTier::High), "bestaudio");
        assert_eq!(format_selector(MediaKind::Video, QualityTier::High), "best[height<=1080]/best");
    }

    #[test]
    fn test_video_selectors_are_muxed() {
        for quality in [QualityTier::Low, QualityTier::Standard, QualityTier::High] {
            let selector = format_selector(MediaKind::Video, quality);
            assert!(!selector.contains('+'), "{} requests separate streams", selector);
        }
    }

    #[test]
    fn test_parse_output() {
        let (url, audio) = parse_cli_output("https://a.example/x\n").unwrap();
        assert_eq!(url, "https://a.example/x");
        assert!(audio.is_none());

        let (video, audio) = parse_cli_output("https://v.example/1\r\nhttps://a.example/2\n\n").unwrap();
        assert_eq!(video, "https://v.example/1");
        assert_eq!(audio.as_deref(), Some("https://a.example/2"));

        assert!(parse_cli_output("").is_err());
        assert!(parse_cli_output("ERROR: unavailable").is_err());
        assert!(parse_cli_output("https://1.example\nhttps://2.example\nhttps://3.example").is_err());
    }

    #[test]
    fn test_mime_from_url() {
        assert_eq!(
            mime_from_url("https://r1.example/videoplayback?itag=251&mime=audio%2Fwebm&x=1", MediaKind::Audio),
            "audio/webm"
        );
        assert_eq!(
            mime_from_url("https://r1.example/videoplayback?mime=audio%2Fmp4", MediaKind::Audio),
            "audio/mp4"
        );
        assert_eq!(mime_from_url("https://r1.example/v", MediaKind::Video), "video/mp4");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let provider = CliProvider::new("/nonexistent/yt-dlp", 1, Duration::from_secs(2));
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        let err = provider
            .resolve(&source, MediaKind::Audio, QualityTier::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Process(_)));
        assert_eq!(provider.available_permits(), 1);
    }

    // Un seul test lance des scripts : évite qu'un fork concurrent hérite
    // d'un descripteur encore ouvert en écriture.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_output_and_deadline() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let write_script = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        };

        let ok = write_script("ok.sh", r#"echo "https://cdn.example/a?mime=audio%2Fmp4""#);
        let slow = write_script("slow.sh", "sleep 5");
        let failing = write_script("fail.sh", "echo 'ERROR: gone' >&2; exit 1");
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();

        let provider = CliProvider::new(ok, 2, Duration::from_secs(5));
        let d = provider
            .resolve(&source, MediaKind::Audio, QualityTier::Standard)
            .await
            .unwrap();
        assert_eq!(d.playable_url, "https://cdn.example/a?mime=audio%2Fmp4");
        assert_eq!(d.mime_type, "audio/mp4");
        assert_eq!(d.bitrate, 0);
        assert_eq!(provider.available_permits(), 2);

        let provider = CliProvider::new(slow, 1, Duration::from_millis(300));
        let err = provider
            .resolve(&source, MediaKind::Audio, QualityTier::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert_eq!(provider.available_permits(), 1);

        let provider = CliProvider::new(failing, 1, Duration::from_secs(5));
        let err = provider
            .resolve(&source, MediaKind::Audio, QualityTier::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Process(_)));
    }
}
