//! Types du domaine de résolution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use voyoid::SourceId;

/// Nature du flux demandé
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    /// Vrai si le type MIME correspond à cette nature
    pub fn matches_mime(&self, mime: &str) -> bool {
        mime.trim().to_ascii_lowercase().starts_with(match self {
            MediaKind::Audio => "audio/",
            MediaKind::Video => "video/",
        })
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("unknown media kind '{}'", other)),
        }
    }
}

/// Palier de qualité
///
/// `Low` et `Standard` plafonnent le débit audio à 64 et 128 kbps ; `High`
/// (palier par défaut) prend le meilleur candidat disponible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Standard,
    #[default]
    High,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Standard => "standard",
            QualityTier::High => "high",
        }
    }

    /// Plafond de débit en bits/s, `None` pour `High`
    pub fn max_bitrate(&self) -> Option<u64> {
        match self {
            QualityTier::Low => Some(64_000),
            QualityTier::Standard => Some(128_000),
            QualityTier::High => None,
        }
    }

    /// Répertoire du palier dans le stockage objet
    pub fn storage_dir(&self) -> &'static str {
        match self {
            QualityTier::Low => "64",
            QualityTier::Standard | QualityTier::High => "128",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "64" => Ok(QualityTier::Low),
            "standard" | "128" => Ok(QualityTier::Standard),
            "high" => Ok(QualityTier::High),
            other => Err(format!("unknown quality tier '{}'", other)),
        }
    }
}

/// Flux proposé par un palier, avant sélection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCandidate {
    pub url: String,
    pub mime_type: String,
    /// Débit en bits/s (0 si inconnu)
    pub bitrate: u64,
}

/// Flux résolu et jouable
///
/// Produit une seule fois par résolution puis jamais modifié ; une nouvelle
/// résolution produit un nouveau descripteur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamDescriptor {
    /// URL émise par le palier, à durée de vie limitée
    pub playable_url: String,
    /// Piste audio séparée quand audio et vidéo ne sont pas multiplexés
    pub audio_url: Option<String>,
    pub mime_type: String,
    /// Débit en bits/s, `0` si le palier ne le connaît pas
    pub bitrate: u64,
    pub kind: MediaKind,
    pub quality: QualityTier,
    pub resolved_at: DateTime<Utc>,
}

impl StreamDescriptor {
    pub fn from_candidate(candidate: StreamCandidate, kind: MediaKind, quality: QualityTier) -> Self {
        Self {
            playable_url: candidate.url,
            audio_url: None,
            mime_type: candidate.mime_type,
            bitrate: candidate.bitrate,
            kind,
            quality,
            resolved_at: Utc::now(),
        }
    }

    /// Un résultat exploitable : URL http(s) non vide
    pub fn is_well_formed(&self) -> bool {
        is_http_url(&self.playable_url) && self.audio_url.as_deref().is_none_or(is_http_url)
    }
}

pub(crate) fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    (url.starts_with("https://") || url.starts_with("http://")) && url.len() > "https://".len()
}

/// Clé du cache de résolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    pub source: SourceId,
    pub kind: MediaKind,
    pub quality: QualityTier,
}

impl ResolutionKey {
    pub fn new(source: SourceId, kind: MediaKind, quality: QualityTier) -> Self {
        Self {
            source,
            kind,
            quality,
        }
    }
}

/// Sélectionne le meilleur candidat pour une nature et un palier
///
/// Filtre par nature, trie par débit décroissant et, à débit égal, préfère
/// `audio/webm` pour l'audio et `video/mp4` pour la vidéo. Pour `Low` et
/// `Standard`, le meilleur candidat sous le plafond est retenu, ou à défaut le
/// moins gourmand.
pub fn select_best_candidate(
    candidates: &[StreamCandidate],
    kind: MediaKind,
    quality: QualityTier,
) -> Option<StreamCandidate> {
    let preferred = match kind {
        MediaKind::Audio => "audio/webm",
        MediaKind::Video => "video/mp4",
    };

    let mut matching: Vec<&StreamCandidate> = candidates
        .iter()
        .filter(|c| kind.matches_mime(&c.mime_type) && is_http_url(&c.url))
        .collect();

    matching.sort_by(|a, b| {
        b.bitrate.cmp(&a.bitrate).then_with(|| {
            let a_pref = a.mime_type.starts_with(preferred);
            let b_pref = b.mime_type.starts_with(preferred);
            b_pref.cmp(&a_pref)
        })
    });

    let chosen = match quality.max_bitrate() {
        None => matching.first().copied(),
        Some(cap) => matching
            .iter()
            .find(|c| c.bitrate <= cap)
            .or(matching.last())
            .copied(),
    };

    chosen.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(mime: &str, kbps: u64) -> StreamCandidate {
        StreamCandidate {
            url: format!("https://cdn.example/{}/{}", mime.replace('/', "_"), kbps),
            mime_type: mime.to_string(),
            bitrate: kbps * 1000,
        }
    }

    #[test]
    fn test_high_takes_highest_bitrate() {
        let candidates = vec![
            candidate("audio/mp4; codecs=\"mp4a.40.2\"", 128),
            candidate("audio/webm; codecs=\"opus\"", 320),
            candidate("video/mp4", 2000),
        ];
        let best = select_best_candidate(&candidates, MediaKind::Audio, QualityTier::High).unwrap();
        assert_eq!(best.bitrate, 320_000);
    }

    #[test]
    fn test_tie_prefers_container() {
        let candidates = vec![
            candidate("audio/mp4", 160),
            candidate("audio/webm", 160),
        ];
        let best = select_best_candidate(&candidates, MediaKind::Audio, QualityTier::High).unwrap();
        assert!(best.mime_type.starts_with("audio/webm"));

        let candidates = vec![candidate("video/webm", 900), candidate("video/mp4", 900)];
        let best = select_best_candidate(&candidates, MediaKind::Video, QualityTier::High).unwrap();
        assert_eq!(best.mime_type, "video/mp4");
    }

    #[test]
    fn test_default_tier_is_uncapped() {
        let candidates = vec![
            candidate("audio/mp4; codecs=\"mp4a.40.2\"", 128),
            candidate("audio/webm; codecs=\"opus\"", 320),
        ];
        assert_eq!(QualityTier::default(), QualityTier::High);
        let best = select_best_candidate(&candidates, MediaKind::default(), QualityTier::default()).unwrap();
        assert_eq!(best.bitrate, 320_000);
    }

    #[test]
    fn test_capped_tiers() {
        let candidates = vec![
            candidate("audio/webm", 48),
            candidate("audio/webm", 64),
            candidate("audio/mp4", 128),
            candidate("audio/webm", 160),
        ];
        let low = select_best_candidate(&candidates, MediaKind::Audio, QualityTier::Low).unwrap();
        assert_eq!(low.bitrate, 64_000);
        let std = select_best_candidate(&candidates, MediaKind::Audio, QualityTier::Standard).unwrap();
        assert_eq!(std.bitrate, 128_000);
    }

    #[test]
    fn test_cap_falls_back_to_lowest() {
        let candidates = vec![candidate("audio/webm", 256), candidate("audio/mp4", 192)];
        let low = select_best_candidate(&candidates, MediaKind::Audio, QualityTier::Low).unwrap();
        assert_eq!(low.bitrate, 192_000);
    }

    #[test]
    fn test_kind_filter_and_bad_urls() {
        let mut bad = candidate("audio/webm", 320);
        bad.url = "ftp://nope".to_string();
        let candidates = vec![bad, candidate("video/mp4", 1000)];
        assert!(select_best_candidate(&candidates, MediaKind::Audio, QualityTier::High).is_none());
    }

    #[test]
    fn test_parse_kind_and_quality() {
        assert_eq!("AUDIO".parse::<MediaKind>().unwrap(), MediaKind::Audio);
        assert!("podcast".parse::<MediaKind>().is_err());
        assert_eq!("64".parse::<QualityTier>().unwrap(), QualityTier::Low);
        assert_eq!(QualityTier::High.storage_dir(), "128");
    }

    #[test]
    fn test_well_formed_descriptor() {
        let mut d = StreamDescriptor::from_candidate(
            candidate("audio/webm", 128),
            MediaKind::Audio,
            QualityTier::Standard,
        );
        assert!(d.is_well_formed());
        d.audio_url = Some(String::new());
        assert!(!d.is_well_formed());
        d.audio_url = None;
        d.playable_url = "   ".to_string();
        assert!(!d.is_well_formed());
    }
}
