//! Normalisation des types de contenu
//!
//! Le type annoncé par une source amont n'est jamais renvoyé tel quel : il est
//! ramené à l'un des quatre types servis par le proxy.

pub const AUDIO_MPEG: &str = "audio/mpeg";
pub const AUDIO_MP4: &str = "audio/mp4";
pub const AUDIO_WEBM: &str = "audio/webm";
pub const VIDEO_MP4: &str = "video/mp4";

/// Ramène un type MIME amont à `audio/mpeg`, `audio/mp4`, `audio/webm` ou `video/mp4`
///
/// Les paramètres (`; codecs=...`) sont ignorés. `video_hint` sert de repli
/// quand le type déclaré est absent ou inconnu.
pub fn normalize_content_type(declared: Option<&str>, video_hint: bool) -> &'static str {
    let essence = declared
        .and_then(|d| d.split(';').next())
        .map(|d| d.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if essence.starts_with("video/") {
        return VIDEO_MP4;
    }

    match essence.as_str() {
        "audio/webm" | "audio/opus" | "audio/ogg" => AUDIO_WEBM,
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => AUDIO_MP4,
        "audio/mpeg" | "audio/mp3" => AUDIO_MPEG,
        _ if video_hint => VIDEO_MP4,
        _ => AUDIO_MPEG,
    }
}

/// Type servi pour un fichier du miroir local, d'après son extension
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "webm" | "opus" => AUDIO_WEBM,
        "m4a" => AUDIO_MP4,
        "mp4" => VIDEO_MP4,
        _ => AUDIO_MPEG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_types_are_never_passed_through() {
        assert_eq!(normalize_content_type(Some("audio/webm; codecs=\"opus\""), false), AUDIO_WEBM);
        assert_eq!(normalize_content_type(Some("AUDIO/MP4"), false), AUDIO_MP4);
        assert_eq!(normalize_content_type(Some("video/webm"), false), VIDEO_MP4);
        assert_eq!(normalize_content_type(Some("text/html"), false), AUDIO_MPEG);
        assert_eq!(normalize_content_type(Some("application/octet-stream"), true), VIDEO_MP4);
        assert_eq!(normalize_content_type(None, false), AUDIO_MPEG);
    }

    #[test]
    fn test_extensions() {
        assert_eq!(content_type_for_extension("opus"), AUDIO_WEBM);
        assert_eq!(content_type_for_extension("m4a"), AUDIO_MP4);
        assert_eq!(content_type_for_extension("mp3"), AUDIO_MPEG);
        assert_eq!(content_type_for_extension("mp4"), VIDEO_MP4);
    }
}
