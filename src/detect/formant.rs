//! Formant peak picking on a dB spectrum.

use crate::detect::types::Formants;

/// Search band for the first formant, Hz.
pub const F1_SEARCH_HZ: (f32, f32) = (200.0, 1200.0);
/// Search band for the second formant, Hz.
pub const F2_SEARCH_HZ: (f32, f32) = (800.0, 3500.0);
/// Half-width of the band around F1 excluded from the F2 search, Hz.
pub const F1_GUARD_HZ: f32 = 200.0;

/// `round(f · N / sr)`, saturating at zero.
pub fn frequency_to_bin(frequency: f32, sample_rate: u32, fft_size: usize) -> usize {
    if sample_rate == 0 {
        return 0;
    }
    let bin = (frequency as f64 * fft_size as f64 / sample_rate as f64).round();
    if bin > 0.0 {
        bin as usize
    } else {
        0
    }
}

/// `bin · sr / N`.
pub fn bin_to_frequency(bin: usize, sample_rate: u32, fft_size: usize) -> f32 {
    if fft_size == 0 {
        return 0.0;
    }
    (bin as f64 * sample_rate as f64 / fft_size as f64) as f32
}

/// Index of the loudest bin in `start..=end` that `keep` accepts; the first
/// maximum wins.  Falls back to `start` when nothing qualifies.
fn peak_bin(spectrum_db: &[f32], start: usize, end: usize, keep: impl Fn(usize) -> bool) -> usize {
    let mut best = start;
    let mut best_db = f32::NEG_INFINITY;
    for (i, &db) in spectrum_db
        .iter()
        .enumerate()
        .take(end.saturating_add(1))
        .skip(start)
    {
        if keep(i) && db > best_db {
            best_db = db;
            best = i;
        }
    }
    best
}

/// Estimate F1 and F2 from a dB magnitude spectrum of `fft_size / 2` bins.
///
/// F1 is the loudest bin in 200–1200 Hz.  F2 is the loudest bin in
/// 800–3500 Hz that lies at least `floor(200 · N / sr)` bins away from F1,
/// so the first formant's skirt is not picked twice.
///
/// ```rust
/// use vowel_detect::detect::formant::{extract_formants, frequency_to_bin};
///
/// let (sr, n) = (44_100, 2_048);
/// let mut spectrum = vec![-90.0_f32; n / 2];
/// spectrum[frequency_to_bin(500.0, sr, n)] = -20.0;
/// spectrum[frequency_to_bin(1_000.0, sr, n)] = -25.0;
///
/// let f = extract_formants(&spectrum, sr, n);
/// assert!((f.f1 - 500.0).abs() < 15.0);
/// assert!((f.f2 - 1_000.0).abs() < 15.0);
/// ```
pub fn extract_formants(spectrum_db: &[f32], sample_rate: u32, fft_size: usize) -> Formants {
    let f1_start = frequency_to_bin(F1_SEARCH_HZ.0, sample_rate, fft_size);
    let f1_end = frequency_to_bin(F1_SEARCH_HZ.1, sample_rate, fft_size);
    let f2_start = frequency_to_bin(F2_SEARCH_HZ.0, sample_rate, fft_size);
    let f2_end = frequency_to_bin(F2_SEARCH_HZ.1, sample_rate, fft_size);

    let f1_bin = peak_bin(spectrum_db, f1_start, f1_end, |_| true);

    let guard = if sample_rate == 0 {
        0
    } else {
        (F1_GUARD_HZ as f64 * fft_size as f64 / sample_rate as f64).floor() as usize
    };
    let f2_bin = peak_bin(spectrum_db, f2_start, f2_end, |i| i.abs_diff(f1_bin) >= guard);

    Formants {
        f1: bin_to_frequency(f1_bin, sample_rate, fft_size),
        f2: bin_to_frequency(f2_bin, sample_rate, fft_size),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44_100;
    const N: usize = 2_048;

    #[test]
    fn bin_conversion_rounds() {
        // 21.53 Hz per bin
        assert_eq!(frequency_to_bin(500.0, SR, N), 23);
        assert_eq!(frequency_to_bin(1_000.0, SR, N), 46);
        assert_eq!(frequency_to_bin(0.0, SR, N), 0);
        assert_eq!(frequency_to_bin(-50.0, SR, N), 0);
        assert!((bin_to_frequency(46, SR, N) - 990.53).abs() < 0.01);
    }

    #[test]
    fn zero_rates_do_not_divide_by_zero() {
        assert_eq!(frequency_to_bin(500.0, 0, N), 0);
        assert_eq!(bin_to_frequency(10, SR, 0), 0.0);
    }

    #[test]
    fn f2_skips_bins_near_f1() {
        // guard = floor(200 * 2048 / 44100) = 9 bins.
        let mut spectrum = vec![-90.0_f32; N / 2];
        spectrum[40] = -10.0; // F1 (861 Hz), also inside the F2 band
        spectrum[45] = -15.0; // 5 bins away: excluded
        spectrum[49] = -30.0; // exactly 9 bins away: allowed
        spectrum[60] = -40.0;

        let f = extract_formants(&spectrum, SR, N);
        assert_eq!(frequency_to_bin(f.f1, SR, N), 40);
        assert_eq!(frequency_to_bin(f.f2, SR, N), 49);
    }

    #[test]
    fn flat_spectrum_falls_back_to_band_starts() {
        let spectrum = vec![-100.0_f32; N / 2];
        let f = extract_formants(&spectrum, SR, N);
        assert_eq!(frequency_to_bin(f.f1, SR, N), frequency_to_bin(200.0, SR, N));
        assert_eq!(frequency_to_bin(f.f2, SR, N), frequency_to_bin(800.0, SR, N));
    }

    #[test]
    fn short_spectrum_is_searched_up_to_its_end() {
        // Only 50 bins available: the F2 band is truncated, not out of bounds.
        let mut spectrum = vec![-90.0_f32; 50];
        spectrum[20] = -5.0;
        spectrum[48] = -12.0;
        let f = extract_formants(&spectrum, SR, N);
        assert_eq!(frequency_to_bin(f.f1, SR, N), 20);
        assert_eq!(frequency_to_bin(f.f2, SR, N), 48);
    }
}
