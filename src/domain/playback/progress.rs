//! Playback progress

use std::time::Duration;

/// Current position over total duration, clamped to `[0, 1]`.
///
/// Returns `None` while the duration is unknown or zero.
pub fn playback_progress(position: Duration, duration: Option<Duration>) -> Option<f32> {
    let total = duration?.as_secs_f64();
    if total <= 0.0 {
        return None;
    }
    Some((position.as_secs_f64() / total).clamp(0.0, 1.0) as f32)
}
