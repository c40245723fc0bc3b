//! Recording domain: state machine, level metering, codec negotiation,
//! and the encoded clip value object.

pub mod clip;
pub mod codec;
pub mod level;
pub mod state;

pub use clip::EncodedClip;
pub use codec::{negotiate_codec, Codec, CodecSupport, DEFAULT_CODEC_PREFERENCES};
pub use level::{level_from_spectrum, DEFAULT_LEVEL_REFERENCE};
pub use state::{RecorderEvent, RecorderState};
