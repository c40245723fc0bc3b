//! Codec negotiation
//!
//! The platform is asked, in descending preference order, whether it can
//! encode each MIME type. The first supported entry wins. When nothing is
//! supported the last, least specific entry is used as-is.

use std::fmt;

/// Codec preference order used when no configuration overrides it
pub const DEFAULT_CODEC_PREFERENCES: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/ogg;codecs=opus",
    "audio/webm",
    "audio/ogg",
    "audio/wav",
];

/// Container used when the preference list is empty
const FALLBACK_MIME_TYPE: &str = "audio/webm";

/// Capability query supplied by the platform
pub trait CodecSupport {
    /// Whether the platform can encode `mime_type`
    fn is_type_supported(&self, mime_type: &str) -> bool;
}

/// A negotiated encoder MIME type, e.g. `audio/webm;codecs=opus`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Codec(String);

impl Codec {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self(mime_type.into().trim().to_string())
    }

    /// Full MIME type including parameters
    pub fn mime_type(&self) -> &str {
        &self.0
    }

    /// MIME type without parameters (`audio/webm;codecs=opus` -> `audio/webm`)
    pub fn essence(&self) -> &str {
        self.0.split(';').next().unwrap_or_default().trim()
    }

    /// Value of the `codecs` parameter, if present
    /// (`audio/ogg; codecs="opus"` -> `opus`)
    pub fn codecs(&self) -> Option<&str> {
        self.0.split(';').skip(1).find_map(|param| {
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("codecs")
                .then(|| value.trim().trim_matches('"'))
        })
    }

    /// File extension matching the container
    pub fn extension(&self) -> &'static str {
        extension_for(self.essence())
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File extension for a MIME essence; unknown types map to `bin`
pub fn extension_for(essence: &str) -> &'static str {
    match essence.to_ascii_lowercase().as_str() {
        "audio/webm" | "video/webm" => "webm",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/wav" | "audio/wave" | "audio/x-wav" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/aac" => "m4a",
        "audio/flac" | "audio/x-flac" => "flac",
        _ => "bin",
    }
}

/// MIME type for a file extension, if known
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "webm" => Some("audio/webm"),
        "ogg" | "oga" | "opus" => Some("audio/ogg"),
        "wav" => Some("audio/wav"),
        "mp3" => Some("audio/mpeg"),
        "m4a" | "mp4" => Some("audio/mp4"),
        "flac" => Some("audio/flac"),
        _ => None,
    }
}

/// Pick the first supported codec from `preferences`.
pub fn negotiate_codec<S, P>(preferences: &[P], support: &S) -> Codec
where
    S: CodecSupport + ?Sized,
    P: AsRef<str>,
{
    let candidates: Vec<&str> = preferences.iter().map(|p| p.as_ref()).collect();

    candidates
        .iter()
        .find(|mime| support.is_type_supported(mime))
        .or_else(|| candidates.last())
        .map(|mime| Codec::new(*mime))
        .unwrap_or_else(|| Codec::new(FALLBACK_MIME_TYPE))
}
