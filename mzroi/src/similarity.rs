//! Weighted spectral entropy similarity between MS2 spectra.
//!
//! Spectra are cleaned (noise removed, close peaks merged, intensities normalized to
//! sum to one), low-entropy spectra are re-weighted, and the similarity is computed from
//! the entropy gained by mixing matched peaks.
use std::cmp::Ordering;

use mzpeaks::CentroidPeak;

use crate::scan::ProductScan;

/// Peaks at or below this fraction of the base peak are discarded before comparison
pub const NOISE_FRACTION: f32 = 0.01;

const ENTROPY_WEIGHT_CUTOFF: f64 = 3.0;

/// A single normalized `(m/z, intensity)` pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumPoint {
    pub mz: f64,
    pub intensity: f64,
}

/// Pool the product ions of several spectra into a single list
pub fn merge_spectra<'a, I: IntoIterator<Item = &'a ProductScan>>(scans: I) -> Vec<CentroidPeak> {
    scans
        .into_iter()
        .flat_map(|s| s.as_slice().iter().cloned())
        .collect()
}

/// Centroid peaks closer than `min_spacing`, most intense first, then normalize.
pub fn clean_spectrum(peaks: &[CentroidPeak], min_spacing: f64) -> Vec<SpectrumPoint> {
    let base = peaks.iter().map(|p| p.intensity).fold(0.0f32, f32::max);
    if base <= 0.0 {
        return Vec::new();
    }
    let threshold = base * NOISE_FRACTION;
    let mut points: Vec<SpectrumPoint> = peaks
        .iter()
        .filter(|p| p.intensity > threshold && p.mz.is_finite())
        .map(|p| SpectrumPoint {
            mz: p.mz,
            intensity: p.intensity as f64,
        })
        .collect();
    points.sort_by(|a, b| a.mz.total_cmp(&b.mz));

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|a, b| {
        points[*b]
            .intensity
            .partial_cmp(&points[*a].intensity)
            .unwrap_or(Ordering::Equal)
    });

    let mut consumed = vec![false; points.len()];
    let mut merged = Vec::with_capacity(points.len());
    for i in order {
        if consumed[i] {
            continue;
        }
        let center = points[i].mz;
        let mut lo = i;
        while lo > 0 && center - points[lo - 1].mz < min_spacing {
            lo -= 1;
        }
        let mut hi = i;
        while hi + 1 < points.len() && points[hi + 1].mz - center < min_spacing {
            hi += 1;
        }
        let mut total = 0.0;
        let mut weighted_mz = 0.0;
        for j in lo..=hi {
            if consumed[j] {
                continue;
            }
            consumed[j] = true;
            total += points[j].intensity;
            weighted_mz += points[j].mz * points[j].intensity;
        }
        merged.push(SpectrumPoint {
            mz: weighted_mz / total,
            intensity: total,
        });
    }
    merged.sort_by(|a, b| a.mz.total_cmp(&b.mz));
    normalize(&mut merged);
    merged
}

fn normalize(points: &mut [SpectrumPoint]) {
    let total: f64 = points.iter().map(|p| p.intensity).sum();
    if total > 0.0 {
        points.iter_mut().for_each(|p| p.intensity /= total);
    }
}

/// The Shannon entropy of a normalized spectrum
pub fn spectral_entropy(points: &[SpectrumPoint]) -> f64 {
    -points
        .iter()
        .filter(|p| p.intensity > 0.0)
        .map(|p| p.intensity * p.intensity.ln())
        .sum::<f64>()
}

/// Flatten low-entropy spectra so a handful of dominant peaks do not decide the score
pub fn apply_entropy_weight(points: &mut [SpectrumPoint]) {
    let entropy = spectral_entropy(points);
    if entropy < ENTROPY_WEIGHT_CUTOFF {
        let weight = 0.25 + 0.25 * entropy;
        points
            .iter_mut()
            .for_each(|p| p.intensity = p.intensity.powf(weight));
        normalize(points);
    }
}

fn mixing_gain(a: f64, b: f64) -> f64 {
    let ab = a + b;
    let mut gain = ab * ab.ln();
    if a > 0.0 {
        gain -= a * a.ln();
    }
    if b > 0.0 {
        gain -= b * b.ln();
    }
    gain
}

/// The entropy similarity of two cleaned, normalized spectra, matching peaks within `tolerance`
pub fn entropy_similarity(a: &[SpectrumPoint], b: &[SpectrumPoint], tolerance: f64) -> f64 {
    let mut i = 0;
    let mut j = 0;
    let mut gain = 0.0;
    while i < a.len() && j < b.len() {
        let delta = b[j].mz - a[i].mz;
        if delta < -tolerance {
            j += 1;
        } else if delta > tolerance {
            i += 1;
        } else {
            gain += mixing_gain(a[i].intensity, b[j].intensity);
            i += 1;
            j += 1;
        }
    }
    (gain / 4.0f64.ln()).clamp(0.0, 1.0)
}

/// Clean, weight and compare two raw peak lists, returning a similarity between 0 and 1.
///
/// Close peaks within each spectrum are merged at twice the matching tolerance.
pub fn calculate_entropy_similarity(a: &[CentroidPeak], b: &[CentroidPeak], tolerance: f64) -> f64 {
    let mut a = clean_spectrum(a, 2.0 * tolerance);
    let mut b = clean_spectrum(b, 2.0 * tolerance);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    apply_entropy_weight(&mut a);
    apply_entropy_weight(&mut b);
    entropy_similarity(&a, &b, tolerance)
}

#[cfg(test)]
mod test {
    use super::*;

    fn peaks(pairs: &[(f64, f32)]) -> Vec<CentroidPeak> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (mz, inten))| CentroidPeak::new(*mz, *inten, i as u32))
            .collect()
    }

    #[test]
    fn test_identical() {
        let a = peaks(&[(50.0, 100.0), (75.0, 50.0), (90.0, 10.0)]);
        let sim = calculate_entropy_similarity(&a, &a, 0.015);
        assert!((sim - 1.0).abs() < 1e-9, "{sim}");
    }

    #[test]
    fn test_disjoint() {
        let a = peaks(&[(50.0, 100.0), (75.0, 50.0)]);
        let b = peaks(&[(60.0, 100.0), (85.0, 50.0)]);
        let sim = calculate_entropy_similarity(&a, &b, 0.015);
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_partial() {
        let a = peaks(&[(50.0, 100.0), (75.0, 100.0)]);
        let b = peaks(&[(50.005, 100.0), (85.0, 100.0)]);
        let sim = calculate_entropy_similarity(&a, &b, 0.015);
        assert!(sim > 0.3 && sim < 0.7, "{sim}");
    }

    #[test]
    fn test_clean_spectrum() {
        let a = peaks(&[(50.0, 100.0), (50.01, 100.0), (75.0, 0.5), (90.0, 0.0)]);
        let cleaned = clean_spectrum(&a, 0.03);
        assert_eq!(cleaned.len(), 1);
        assert!((cleaned[0].mz - 50.005).abs() < 1e-9);
        assert!((cleaned[0].intensity - 1.0).abs() < 1e-12);
        assert!(clean_spectrum(&[], 0.03).is_empty());
    }
}
