//! Audio payload value object

use std::sync::Arc;

use base64::Engine;

use crate::domain::error::VoiceError;

/// Encoded audio handed to the player: bytes plus MIME type.
///
/// Bytes are reference counted so the payload can be handed to a platform
/// resource store without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    data: Arc<[u8]>,
    content_type: String,
}

impl AudioPayload {
    pub fn new(data: impl Into<Arc<[u8]>>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    /// Decode a base64 string, as returned by text-to-speech backends.
    ///
    /// ASCII whitespace is ignored and a `data:<type>;base64,` prefix is
    /// accepted. Malformed input is rejected as [`VoiceError::InvalidAudioData`].
    pub fn from_base64(encoded: &str, content_type: impl Into<String>) -> Result<Self, VoiceError> {
        let body = strip_data_url(encoded.trim());
        let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();

        let data = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| VoiceError::InvalidAudioData(e.to_string()))?;

        Ok(Self::new(data, content_type))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the bytes
    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn strip_data_url(input: &str) -> &str {
    if input.starts_with("data:") {
        if let Some(idx) = input.find(";base64,") {
            return &input[idx + ";base64,".len()..];
        }
    }
    input
}
