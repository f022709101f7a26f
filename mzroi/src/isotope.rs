//! Link regions of interest belonging to the same compound's isotope cluster.
//!
//! Regions are visited in ascending m/z order. Each region not already claimed as an
//! isotope becomes an anchor: the survey scan at its apex is searched for ions spaced at
//! multiples of half the <sup>13</sup>C spacing above it, which also decides its charge
//! state. Each such ion is matched to a nearby region eluting at the same time, and
//! accepted when the two traces are correlated.
use tracing::{debug, warn};

use crate::error::RoiError;
use crate::params::IsotopeSearchParams;
use crate::roi::{IsotopeAnnotation, IsotopeElement, Roi};
use crate::scan::{ScanTable, SurveyScan};

/// Counts of the clusters built by [`annotate_isotopes`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IsotopeGrouping {
    /// The number of anchors that gained at least one isotope
    pub clusters: usize,
    /// The number of regions marked as isotopes
    pub isotopes: usize,
}

/// Search `scan` for ions above `mz` whose offset is a multiple of half the isotope spacing.
///
/// Returns the candidate m/z values and the inferred charge state, which is 2 when any
/// offset is an odd multiple and 1 otherwise.
pub fn find_isotopes_in_scan(
    scan: &SurveyScan,
    mz: f64,
    params: &IsotopeSearchParams,
) -> (Vec<f64>, i32) {
    let half_spacing = params.isotope_spacing / 2.0;
    let mut isotopes = Vec::new();
    let mut charge = 1;
    for peak in scan.as_slice() {
        let delta = peak.mz - mz;
        if delta < params.min_delta {
            continue;
        }
        if delta > params.max_delta {
            break;
        }
        let steps = delta / half_spacing;
        let nearest = steps.round();
        if (steps - nearest).abs() < params.spacing_tolerance {
            isotopes.push(peak.mz);
            if (nearest as i64) % 2 == 1 {
                charge = 2;
            }
        }
    }
    (isotopes, charge)
}

/// The Pearson correlation of two traces over the scans they share.
///
/// Traces sharing fewer than two scans are treated as perfectly correlated. A trace that
/// is constant over the shared scans is treated as uncorrelated.
pub fn peak_peak_correlation(a: &Roi, b: &Roi) -> f64 {
    let mut x = Vec::new();
    let mut y = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (si, sj) = (a.scan_indices[i], b.scan_indices[j]);
        if si < sj {
            i += 1;
        } else if sj < si {
            j += 1;
        } else {
            x.push(a.intensities[i] as f64);
            y.push(b.intensities[j] as f64);
            i += 1;
            j += 1;
        }
    }
    if x.len() < 2 {
        return 1.0;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    if r.is_finite() {
        r
    } else {
        0.0
    }
}

/// The element whose isotopic mass difference best explains a charge-scaled m/z offset
pub fn explain_isotope_offset(offset: f64, tolerance: f64) -> Option<IsotopeElement> {
    let mut best: Option<(IsotopeElement, f64)> = None;
    for element in IsotopeElement::ALL {
        let diff = element.mass_difference();
        let steps = (offset / diff).round();
        if !(1.0..5.0).contains(&steps) {
            continue;
        }
        let err = (diff * steps - offset).abs();
        match best {
            Some((_, best_err)) if best_err <= err => {}
            _ => best = Some((element, err)),
        }
    }
    best.filter(|(_, err)| *err < tolerance).map(|(e, _)| e)
}

struct Acceptance {
    child: usize,
    generation: usize,
    element: Option<IsotopeElement>,
}

/// Find the region matching `target`, the one closest in apex scan to `apex` on ties
fn match_candidate(
    rois: &[Roi],
    consumed: &[bool],
    anchor: usize,
    target: f64,
    apex: usize,
    params: &IsotopeSearchParams,
) -> Option<usize> {
    let lo = rois.partition_point(|r| r.mz() < target - params.mz_tolerance);
    let mut best: Option<(usize, usize)> = None;
    for (offset, roi) in rois[lo..].iter().enumerate() {
        let k = lo + offset;
        if roi.mz() >= target + params.mz_tolerance {
            break;
        }
        if k == anchor || consumed[k] || (roi.mz() - target).abs() >= params.mz_tolerance {
            continue;
        }
        let Some(scan) = roi.apex_scan_index() else {
            continue;
        };
        let distance = scan.abs_diff(apex);
        if distance > params.scan_window {
            continue;
        }
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((k, distance)),
        }
    }
    best.map(|(k, _)| k)
}

/// Group the regions of interest into isotope clusters, recording each anchor's charge state.
///
/// The collection is sorted by m/z in place. Any prior isotope annotations are replaced, so
/// repeated calls on an unchanged collection produce the same result. Every region must have
/// been summarized.
pub fn annotate_isotopes(
    rois: &mut [Roi],
    scans: &ScanTable,
    params: &IsotopeSearchParams,
) -> Result<IsotopeGrouping, RoiError> {
    if let Some((i, roi)) = rois.iter().enumerate().find(|(_, r)| r.summary.is_none()) {
        return Err(RoiError::Unsummarized(roi.id.unwrap_or(i)));
    }
    rois.sort_by(|a, b| a.mz().total_cmp(&b.mz()));
    for roi in rois.iter_mut() {
        roi.isotope = IsotopeAnnotation::default();
        roi.charge = 1;
        roi.isotope_mzs.clear();
        roi.isotope_intensities.clear();
    }

    let mut consumed = vec![false; rois.len()];
    let mut grouping = IsotopeGrouping::default();

    for idx in 0..rois.len() {
        if consumed[idx] {
            continue;
        }
        let anchor = &rois[idx];
        let anchor_mz = anchor.mz();
        let Some(apex) = anchor.apex_scan_index() else {
            continue;
        };

        let (candidates, charge) = match scans.survey_scan(apex) {
            Some(scan) => find_isotopes_in_scan(scan, anchor_mz, params),
            None => {
                warn!("Apex scan {apex} of region at {anchor_mz:0.4} is not a survey scan in the table");
                (Vec::new(), 1)
            }
        };

        let mut accepted: Vec<Acceptance> = Vec::new();
        for target in candidates {
            let Some(k) = match_candidate(rois, &consumed, idx, target, apex, params) else {
                continue;
            };
            let correlation = peak_peak_correlation(&rois[idx], &rois[k]);
            if correlation > params.minimum_correlation {
                consumed[k] = true;
                let offset = (rois[k].mz() - anchor_mz) * charge as f64;
                accepted.push(Acceptance {
                    child: k,
                    generation: accepted.len() + 1,
                    element: explain_isotope_offset(offset, params.element_tolerance),
                });
            }
        }

        let anchor_id = rois[idx].id;
        let mut child_ids = Vec::with_capacity(accepted.len());
        let mut child_mzs = Vec::with_capacity(accepted.len());
        let mut child_heights = Vec::with_capacity(accepted.len());
        for acc in accepted.iter() {
            let child = &mut rois[acc.child];
            child.isotope = IsotopeAnnotation {
                is_isotope: true,
                generation: acc.generation,
                element: acc.element,
                parent_roi_id: anchor_id,
                child_roi_ids: Vec::new(),
            };
            child.charge = charge;
            if let Some(id) = child.id {
                child_ids.push(id);
            }
            child_mzs.push(child.mz());
            child_heights.push(child.peak_height());
        }

        let anchor = &mut rois[idx];
        anchor.charge = charge;
        anchor.isotope_mzs.push(anchor_mz);
        anchor.isotope_intensities.push(anchor.peak_height());
        anchor.isotope_mzs.extend(child_mzs);
        anchor.isotope_intensities.extend(child_heights);
        anchor.isotope.child_roi_ids = child_ids;

        if !accepted.is_empty() {
            debug!(
                "Region at {anchor_mz:0.4} anchors {} isotopes with charge {charge}",
                accepted.len()
            );
            grouping.clusters += 1;
            grouping.isotopes += accepted.len();
        }
    }
    Ok(grouping)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_find_isotopes_in_scan() {
        let params = IsotopeSearchParams::default();
        let scan = SurveyScan::new(
            0,
            0.0,
            &[300.0, 500.0, 500.02, 501.0034, 502.0067, 520.0],
            &[1.0, 100.0, 1.0, 40.0, 10.0, 1.0],
        )
        .unwrap();
        let (isos, charge) = find_isotopes_in_scan(&scan, 500.0, &params);
        assert_eq!(isos, vec![501.0034, 502.0067]);
        assert_eq!(charge, 1);

        let scan = SurveyScan::new(0, 0.0, &[500.0, 500.5017], &[100.0, 50.0]).unwrap();
        let (isos, charge) = find_isotopes_in_scan(&scan, 500.0, &params);
        assert_eq!(isos, vec![500.5017]);
        assert_eq!(charge, 2);
    }

    #[test]
    fn test_correlation() {
        let mut a = Roi::seed(0, 0.0, 100.0, 1.0);
        let mut b = Roi::seed(0, 0.0, 101.0, 2.0);
        for (i, (x, y)) in [(3.0, 6.0), (5.0, 10.0), (2.0, 4.0)].iter().enumerate() {
            a.extend(i + 1, 0.0, 100.0, *x);
            b.extend(i + 1, 0.0, 101.0, *y);
        }
        assert!((peak_peak_correlation(&a, &b) - 1.0).abs() < 1e-9);

        let c = Roi::seed(3, 0.0, 101.0, 2.0);
        assert_eq!(peak_peak_correlation(&a, &c), 1.0);

        let mut flat = Roi::seed(0, 0.0, 101.0, 5.0);
        for i in 1..4 {
            flat.extend(i, 0.0, 101.0, 5.0);
        }
        assert_eq!(peak_peak_correlation(&a, &flat), 0.0);
    }

    #[test]
    fn test_explain_offset() {
        assert_eq!(explain_isotope_offset(1.003355, 0.01), Some(IsotopeElement::C));
        assert_eq!(explain_isotope_offset(1.006277, 0.001), Some(IsotopeElement::H));
        assert_eq!(explain_isotope_offset(2.004246, 0.0001), Some(IsotopeElement::O));
        assert_eq!(explain_isotope_offset(0.3, 0.01), None);
    }
}
