//! Frame loudness in dB.
//!
//! Both detectors decide "silence or not" from these numbers, so every value
//! is clamped into the same `[-100, 0]` dB scale.
//!
//! ```rust
//! use vowel_detect::audio::level::{amplitude_to_db, rms_db};
//!
//! assert_eq!(amplitude_to_db(0.0), -100.0);
//! assert!((amplitude_to_db(0.1) - -20.0).abs() < 1e-4);
//! assert!((rms_db(&[0.5, -0.5, 0.5, -0.5]) - -6.0206).abs() < 1e-3);
//! ```

/// Floor used for zero amplitude and the lower clamp.
pub const DB_FLOOR: f32 = -100.0;
/// Upper clamp (digital full scale).
pub const DB_CEIL: f32 = 0.0;

/// Clamp a dB value into `[DB_FLOOR, DB_CEIL]`.  NaN maps to the floor.
pub fn clamp_db(db: f32) -> f32 {
    if db.is_nan() {
        return DB_FLOOR;
    }
    db.clamp(DB_FLOOR, DB_CEIL)
}

/// `20·log10(amplitude)`, or [`DB_FLOOR`] when the amplitude is not positive.
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude > 0.0 {
        20.0 * amplitude.log10()
    } else {
        DB_FLOOR
    }
}

/// RMS level of a time-domain frame in dB (unclamped).  Empty frames are
/// silent.
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return DB_FLOOR;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    amplitude_to_db((sum / samples.len() as f32).sqrt())
}

/// Loudest bin of a dB spectrum between `low_hz` and `high_hz` (inclusive
/// bin range).  Returns [`DB_FLOOR`] when the band holds no bins.
pub fn peak_band_db(
    spectrum_db: &[f32],
    sample_rate: u32,
    fft_size: usize,
    low_hz: f32,
    high_hz: f32,
) -> f32 {
    let start = crate::detect::formant::frequency_to_bin(low_hz, sample_rate, fft_size);
    let end = crate::detect::formant::frequency_to_bin(high_hz, sample_rate, fft_size);
    spectrum_db
        .iter()
        .take(end.saturating_add(1))
        .skip(start)
        .copied()
        .fold(None, |acc: Option<f32>, db| Some(acc.map_or(db, |m| m.max(db))))
        .unwrap_or(DB_FLOOR)
}

/// Spectral-path frame level: the louder of the RMS level and the peak
/// within the 100–4000 Hz voice band, clamped.
pub fn frame_volume_db(time: &[f32], spectrum_db: &[f32], sample_rate: u32, fft_size: usize) -> f32 {
    let rms = rms_db(time);
    let peak = peak_band_db(spectrum_db, sample_rate, fft_size, 100.0, 4000.0);
    clamp_db(rms.max(peak))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_floor() {
        assert_eq!(rms_db(&[0.0; 64]), DB_FLOOR);
        assert_eq!(rms_db(&[]), DB_FLOOR);
    }

    #[test]
    fn full_scale_is_zero_db() {
        assert!(rms_db(&[1.0, -1.0, 1.0, -1.0]).abs() < 1e-5);
    }

    #[test]
    fn clamp_limits_both_ends() {
        assert_eq!(clamp_db(6.0), 0.0);
        assert_eq!(clamp_db(-140.0), -100.0);
        assert_eq!(clamp_db(f32::NEG_INFINITY), -100.0);
        assert_eq!(clamp_db(f32::NAN), -100.0);
        assert_eq!(clamp_db(-35.5), -35.5);
    }

    #[test]
    fn peak_band_ignores_out_of_band_bins() {
        // 1024-point FFT at 1024 Hz → 1 Hz per bin.
        let mut spectrum = vec![-90.0_f32; 512];
        spectrum[50] = -3.0; // below 100 Hz
        spectrum[300] = -20.0; // in band
        assert_eq!(peak_band_db(&spectrum, 1_024, 1_024, 100.0, 4000.0), -20.0);
    }

    #[test]
    fn peak_band_empty_band_is_floor() {
        let spectrum = vec![-10.0_f32; 8];
        // Band starts past the end of the spectrum.
        assert_eq!(peak_band_db(&spectrum, 1_024, 1_024, 100.0, 200.0), DB_FLOOR);
    }

    #[test]
    fn frame_volume_takes_louder_source() {
        let time = vec![0.01_f32; 256]; // -40 dB RMS
        let mut spectrum = vec![-90.0_f32; 512];
        spectrum[200] = -25.0;
        let v = frame_volume_db(&time, &spectrum, 1_024, 1_024);
        assert!((v - -25.0).abs() < 1e-4);
    }
}
