//! Reduce finished regions of interest to quantifiable peaks, and order the collection
use tracing::debug;

use crate::params::RoiParams;
use crate::roi::{Roi, RoiQuality, RoiSummary};
use crate::scan::ScanTable;

/// The area under a curve by the trapezoidal rule
pub fn trapezoid(x: &[f64], y: &[f32]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(x, y)| (x[1] - x[0]) * (y[0] as f64 + y[1] as f64) / 2.0)
        .sum()
}

/// The mean of the three most intense non-zero points, or zero when there are none
pub fn height_by_average(intensities: &[f32]) -> f32 {
    let mut sorted: Vec<f32> = intensities.iter().copied().filter(|i| *i > 0.0).collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let top = &sorted[..sorted.len().min(3)];
    if top.is_empty() {
        0.0
    } else {
        top.iter().sum::<f32>() / top.len() as f32
    }
}

/// Drop the run of trailing zeros from a trace, keeping a single zero sentinel
fn trim_tail(roi: &mut Roi) {
    let mut end = roi.len() - 1;
    while end >= 1 && roi.intensities[end] == 0.0 && roi.intensities[end - 1] == 0.0 {
        end -= 1;
    }
    let keep = end + 1;
    roi.scan_indices.truncate(keep);
    roi.retention_times.truncate(keep);
    roi.mzs.truncate(keep);
    roi.intensities.truncate(keep);
}

/// Compute the apex, area, heights and length of a region of interest.
///
/// Empty regions are left unsummarized.
pub fn summarize_roi(roi: &mut Roi) {
    if roi.is_empty() {
        return;
    }
    trim_tail(roi);

    let mut apex = 0;
    for (i, v) in roi.intensities.iter().enumerate() {
        if *v > roi.intensities[apex] {
            apex = i;
        }
    }

    let mut sentinels = 0;
    if roi.intensities.first().is_some_and(|v| *v == 0.0) {
        sentinels += 1;
        roi.mzs[0] = f64::NAN;
    }
    if roi.intensities.last().is_some_and(|v| *v == 0.0) {
        sentinels += 1;
    }

    let apex_mz = roi.mzs[apex];
    roi.summary = Some(RoiSummary {
        mz: if apex_mz.is_nan() {
            roi.anchor_mz
        } else {
            apex_mz
        },
        rt: roi.retention_times[apex],
        apex_scan_index: roi.scan_indices[apex],
        peak_height: roi.intensities[apex],
        peak_height_by_average: height_by_average(&roi.intensities),
        peak_area: trapezoid(&roi.retention_times, &roi.intensities) * 60.0,
        total_intensity: roi.intensities.iter().sum(),
        length: roi.len().saturating_sub(sentinels),
    });
}

/// Label a summarized region of interest `good` or `short` by its length
pub fn assign_quality(roi: &mut Roi, params: &RoiParams) {
    roi.quality = roi.summary.map(|s| {
        if s.length >= params.min_ion_num {
            RoiQuality::Good
        } else {
            RoiQuality::Short
        }
    });
}

/// Pick the attached MS2 spectrum with the greatest total product intensity, the earliest on ties
pub fn select_best_product(roi: &mut Roi, scans: &ScanTable) {
    let mut best: Option<(usize, f32)> = None;
    for i in roi.product_scans.iter().copied() {
        let Some(scan) = scans.product_scan(i) else {
            continue;
        };
        let total = scan.total_intensity();
        match best {
            Some((_, best_total)) if best_total >= total => {}
            _ => best = Some((i, total)),
        }
    }
    roi.best_product = best.map(|(i, _)| i);
}

/// Summarize every region of interest, sort them by m/z, assign identifiers, quality and
/// best MS2 spectrum. When `discard_short` is set, `short` regions are removed before
/// identifiers are assigned.
///
/// Returns the number of regions discarded.
pub fn process_rois(
    rois: &mut Vec<Roi>,
    scans: &ScanTable,
    params: &RoiParams,
    discard_short: bool,
) -> usize {
    rois.retain(|r| !r.is_empty());
    for roi in rois.iter_mut() {
        summarize_roi(roi);
        assign_quality(roi, params);
        select_best_product(roi, scans);
    }
    rois.sort_by(|a, b| a.mz().total_cmp(&b.mz()));

    let mut discarded = 0;
    if discard_short {
        let n = rois.len();
        rois.retain(|r| r.is_good());
        discarded = n - rois.len();
        debug!("Discarded {discarded} short regions of interest");
    }
    for (i, roi) in rois.iter_mut().enumerate() {
        roi.id = Some(i);
    }
    discarded
}

/// Find the regions of interest whose representative m/z is strictly within `tolerance` of `mz`
pub fn find_rois_by_mz(rois: &[Roi], mz: f64, tolerance: f64) -> Vec<&Roi> {
    rois.iter()
        .filter(|r| (r.mz() - mz).abs() < tolerance)
        .collect()
}
