//! # voyoid - Codec d'identifiants
//!
//! Traduction réversible entre l'identifiant opaque exposé aux clients
//! ([`MediaId`]) et l'identifiant natif de la plateforme ([`SourceId`]).
//!
//! Un `MediaId` est le préfixe de marque `vyo_` suivi de l'encodage base64
//! (alphabet URL, sans padding) du `SourceId`. Le décodage revalide toujours
//! le `SourceId` obtenu : un `MediaId` forgé qui décode vers une valeur hors
//! format est rejeté.
//!
//! ```
//! use voyoid::{SourceId, decode, encode};
//!
//! let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
//! let media = encode(&source);
//! assert_eq!(decode(media.as_str()).unwrap(), source);
//! ```

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Préfixe de marque des identifiants clients
pub const MEDIA_ID_PREFIX: &str = "vyo_";

/// Longueur fixe d'un identifiant natif
pub const SOURCE_ID_LEN: usize = 11;

/// Erreur de validation ou de décodage d'un identifiant
///
/// Le message est volontairement générique : il peut être renvoyé au client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("Invalid identifier")]
    MissingPrefix,
    #[error("Invalid identifier")]
    BadEncoding,
    #[error("Invalid identifier")]
    BadFormat,
}

/// Identifiant natif validé : 11 caractères dans `[A-Za-z0-9_-]`
///
/// Un `SourceId` ne peut être construit que par [`SourceId::parse`] ou
/// [`decode`] ; il peut donc être interpolé sans risque comme argument unique
/// d'un sous-processus ou dans une URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        if is_valid_source_id(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(IdError::BadFormat)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SourceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SourceId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Identifiant opaque côté client
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode un `SourceId` en `MediaId` (déterministe)
pub fn encode(source: &SourceId) -> MediaId {
    MediaId(format!(
        "{}{}",
        MEDIA_ID_PREFIX,
        URL_SAFE_NO_PAD.encode(source.as_str().as_bytes())
    ))
}

/// Décode un `MediaId` et revalide le `SourceId` obtenu
pub fn decode(media_id: &str) -> Result<SourceId, IdError> {
    let body = media_id
        .strip_prefix(MEDIA_ID_PREFIX)
        .ok_or(IdError::MissingPrefix)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|_| IdError::BadEncoding)?;
    let raw = String::from_utf8(bytes).map_err(|_| IdError::BadEncoding)?;
    SourceId::parse(&raw)
}

/// Vrai si `raw` a exactement le format natif
pub fn is_valid_source_id(raw: &str) -> bool {
    raw.len() == SOURCE_ID_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Vrai si `raw` est un `MediaId` décodable vers un `SourceId` valide
pub fn is_valid_media_id(raw: &str) -> bool {
    decode(raw).is_ok()
}

/// Résout un identifiant client sous l'une des deux formes acceptées
///
/// Un `MediaId` est décodé ; un identifiant natif brut est encore accepté
/// pendant la transition. Toute autre forme est rejetée.
pub fn resolve_client_id(raw: &str) -> Result<SourceId, IdError> {
    if raw.starts_with(MEDIA_ID_PREFIX) {
        decode(raw)
    } else {
        SourceId::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "dQw4w9WgXcQ",
        "___________",
        "-----------",
        "AAAAAAAAAAA",
        "zzzzzzzzzzz",
        "0123456789_",
        "a-b_c-D_E-f",
        "9bZkp7q19f0",
    ];

    #[test]
    fn test_round_trip() {
        for s in SAMPLES {
            let source = SourceId::parse(s).unwrap();
            let media = encode(&source);
            assert!(media.as_str().starts_with(MEDIA_ID_PREFIX));
            assert!(is_valid_media_id(media.as_str()));
            assert_eq!(decode(media.as_str()).unwrap(), source);
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(encode(&source), encode(&source));
    }

    #[test]
    fn test_rejects_injection_and_bad_lengths() {
        for bad in [
            "",
            "short",
            "dQw4w9WgXcQQ",
            "abc;rm -rf/",
            "abc/def/ghi",
            "abc def ghi",
            "abc\tdefghi",
            "abc$(id)xyz",
            "abc`id`wxyz",
            "abc|catxyzw",
            "éééééé",
            "dQw4w9WgXc\n",
        ] {
            assert!(!is_valid_source_id(bad), "accepted {:?}", bad);
            assert_eq!(SourceId::parse(bad), Err(IdError::BadFormat));
        }
    }

    #[test]
    fn test_crafted_media_id_is_rejected() {
        // structurellement valide mais le contenu décodé n'est pas un id natif
        let crafted = format!("{}{}", MEDIA_ID_PREFIX, URL_SAFE_NO_PAD.encode("abc;rm -rf/"));
        assert_eq!(decode(&crafted), Err(IdError::BadFormat));
        assert!(!is_valid_media_id(&crafted));
    }

    #[test]
    fn test_decode_failures() {
        assert_eq!(decode("dQw4w9WgXcQ"), Err(IdError::MissingPrefix));
        assert_eq!(decode("vyo_***"), Err(IdError::BadEncoding));
        assert_eq!(decode("vyo_ZFF3NHc5V2dYY1E="), Err(IdError::BadEncoding));
        assert_eq!(decode("vyo_"), Err(IdError::BadFormat));
    }

    #[test]
    fn test_resolve_client_id_accepts_both_forms() {
        let source = SourceId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(resolve_client_id("dQw4w9WgXcQ").unwrap(), source);
        assert_eq!(resolve_client_id(encode(&source).as_str()).unwrap(), source);
        assert!(resolve_client_id("not an id!").is_err());
    }

    #[test]
    fn test_errors_are_generic() {
        for e in [IdError::MissingPrefix, IdError::BadEncoding, IdError::BadFormat] {
            assert_eq!(e.to_string(), "Invalid identifier");
        }
    }

    #[test]
    fn test_serde() {
        let parsed: SourceId = serde_json::from_str("\"dQw4w9WgXcQ\"").unwrap();
        assert_eq!(parsed.as_str(), "dQw4w9WgXcQ");
        assert!(serde_json::from_str::<SourceId>("\"a;b\"").is_err());
    }
}
