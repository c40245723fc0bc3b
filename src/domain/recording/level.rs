//! Input level computation

/// Reference energy that maps to a full-scale level
pub const DEFAULT_LEVEL_REFERENCE: f32 = 128.0;

/// Average a frame of byte frequency bins into a level in `[0, 1]`.
///
/// Bins are the 0..=255 magnitudes an analyser reports for one transform
/// window. The mean is divided by `reference` and clamped.
pub fn level_from_spectrum(bins: &[u8], reference: f32) -> f32 {
    if bins.is_empty() || reference <= 0.0 {
        return 0.0;
    }

    let sum: u32 = bins.iter().map(|&b| u32::from(b)).sum();
    let average = sum as f32 / bins.len() as f32;
    (average / reference).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_zero() {
        assert_eq!(level_from_spectrum(&[0; 128], DEFAULT_LEVEL_REFERENCE), 0.0);
    }

    #[test]
    fn empty_frame_is_zero() {
        assert_eq!(level_from_spectrum(&[], DEFAULT_LEVEL_REFERENCE), 0.0);
    }

    #[test]
    fn half_reference() {
        let level = level_from_spectrum(&[64; 128], DEFAULT_LEVEL_REFERENCE);
        assert!((level - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn loud_input_is_clamped() {
        assert_eq!(level_from_spectrum(&[255; 128], DEFAULT_LEVEL_REFERENCE), 1.0);
    }

    #[test]
    fn mixed_bins_average() {
        // mean = (0 + 128) / 2 = 64
        let level = level_from_spectrum(&[0, 128], DEFAULT_LEVEL_REFERENCE);
        assert!((level - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn non_positive_reference_is_zero() {
        assert_eq!(level_from_spectrum(&[200; 4], 0.0), 0.0);
    }
}
