//! Encoded clip value object

use base64::Engine;

use super::codec::extension_for;

/// The finished product of a capture session: encoded bytes plus the
/// encoder's negotiated content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedClip {
    data: Vec<u8>,
    content_type: String,
}

impl EncodedClip {
    /// Create a clip from raw bytes
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }

    /// Concatenate encoder chunks in emission order
    pub fn from_chunks<I>(chunks: I, content_type: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut data = Vec::new();
        for chunk in chunks {
            data.extend_from_slice(&chunk);
        }
        Self::new(data, content_type)
    }

    /// Get the encoded bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume and return the encoded bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// MIME type, possibly with codec parameters
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Get the size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File extension matching the container
    pub fn extension(&self) -> &'static str {
        let essence = self.content_type.split(';').next().unwrap_or_default();
        extension_for(essence.trim())
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }

    /// Encode the clip as base64 for JSON transports
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}
