//! Split regions of interest whose trace spans two co-eluting compounds.
//!
//! A candidate cut is a strict local minimum of the intensity trace. It is confirmed when
//! the MS2 spectra acquired on either side of it, between the neighboring candidates, are
//! dissimilar enough to come from different precursors.
use tracing::{debug, warn};

use crate::params::RoiParams;
use crate::roi::Roi;
use crate::scan::{ProductScan, ScanTable};
use crate::similarity::{calculate_entropy_similarity, merge_spectra};

/// Positions of strict local minima, excluding the ends of the trace
pub fn local_minima(intensities: &[f32]) -> Vec<usize> {
    intensities
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] < w[0] && w[1] < w[2])
        .map(|(i, _)| i + 1)
        .collect()
}

fn products_between<'a>(
    roi: &Roi,
    scans: &'a ScanTable,
    start: usize,
    end: usize,
) -> Vec<&'a ProductScan> {
    roi.product_scans
        .iter()
        .filter(|i| **i > start && **i < end)
        .filter_map(|i| {
            let hit = scans.product_scan(*i);
            if hit.is_none() {
                warn!("Product scan {i} attached to a trace is missing from the scan table");
            }
            hit
        })
        .collect()
}

/// Find the positions at which `roi` should be cut, or `None` if it should be left whole.
///
/// A region is only considered when it has at least `min_ion_num` non-zero points and two
/// or more attached MS2 spectra.
pub fn find_roi_cut(roi: &Roi, scans: &ScanTable, params: &RoiParams) -> Option<Vec<usize>> {
    if roi.nonzero_count() < params.min_ion_num || roi.product_scans.len() < 2 {
        return None;
    }
    let minima = local_minima(&roi.intensities);
    if minima.is_empty() {
        return None;
    }

    let mut boundaries = Vec::with_capacity(minima.len() + 2);
    boundaries.push(0);
    boundaries.extend(minima);
    boundaries.push(roi.len() - 1);

    let mut cuts = Vec::new();
    for w in boundaries.windows(3) {
        let (left, mid, right) = (
            roi.scan_indices[w[0]],
            roi.scan_indices[w[1]],
            roi.scan_indices[w[2]],
        );
        let left_products = products_between(roi, scans, left, mid);
        let right_products = products_between(roi, scans, mid, right);
        if left_products.is_empty() || right_products.is_empty() {
            continue;
        }
        let similarity = calculate_entropy_similarity(
            &merge_spectra(left_products),
            &merge_spectra(right_products),
            params.mz_tol_ms2,
        );
        if similarity < params.ms2_similarity_tolerance {
            debug!(
                "Cutting trace at {:0.4} at scan {mid}, MS2 similarity {similarity:0.3}",
                roi.anchor_mz
            );
            cuts.push(w[1]);
        }
    }

    if cuts.is_empty() {
        None
    } else {
        Some(cuts)
    }
}

/// Split `roi` at `positions`, sharing the signal at each cut equally between both pieces.
///
/// Each piece spans from one boundary to the next inclusively, so the halved point at a cut
/// appears in both neighbors.
pub fn cut_roi(roi: &Roi, positions: &[usize]) -> Vec<Roi> {
    let mut source = roi.clone();
    for i in positions.iter().copied() {
        source.intensities[i] /= 2.0;
    }

    let mut boundaries = Vec::with_capacity(positions.len() + 2);
    boundaries.push(0);
    boundaries.extend_from_slice(positions);
    boundaries.push(source.len() - 1);

    boundaries
        .windows(2)
        .map(|w| source.subset(w[0]..(w[1] + 1)))
        .collect()
}

/// Cut every region of interest that appears to contain more than one compound
pub fn segment_rois(rois: Vec<Roi>, scans: &ScanTable, params: &RoiParams) -> Vec<Roi> {
    let n_before = rois.len();
    let mut n_cut = 0;
    let segmented: Vec<Roi> = rois
        .into_iter()
        .flat_map(|roi| match find_roi_cut(&roi, scans, params) {
            Some(positions) => {
                n_cut += 1;
                cut_roi(&roi, &positions)
            }
            None => vec![roi],
        })
        .collect();
    debug!(
        "Cut {n_cut} of {n_before} traces, {} traces after segmentation",
        segmented.len()
    );
    segmented
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scan::{Scan, SurveyScan};

    #[test]
    fn test_local_minima() {
        assert_eq!(local_minima(&[0.0, 5.0, 2.0, 6.0, 6.0, 3.0, 3.0, 8.0]), vec![2]);
        assert!(local_minima(&[1.0, 2.0]).is_empty());
        assert_eq!(local_minima(&[3.0, 1.0, 3.0, 1.0, 3.0]), vec![1, 3]);
    }

    #[test]
    fn test_cut_roi() {
        let mut roi = Roi::seed(0, 0.0, 100.0, 10.0);
        let ints = [20.0, 4.0, 30.0, 10.0];
        for (i, v) in ints.iter().enumerate() {
            roi.extend(i + 1, (i + 1) as f64, 100.0, *v);
        }
        roi.attach_product(1);
        roi.attach_product(3);
        let pieces = cut_roi(&roi, &[2]);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].intensities, vec![10.0, 20.0, 2.0]);
        assert_eq!(pieces[1].intensities, vec![2.0, 30.0, 10.0]);
        assert_eq!(pieces[0].product_scans, vec![1]);
        assert_eq!(pieces[1].product_scans, vec![3]);
        assert_eq!(roi.intensities[2], 4.0);
    }

    #[test]
    fn test_too_few_products() {
        let params = RoiParams::default();
        let mut roi = Roi::seed(0, 0.0, 100.0, 10.0);
        for (i, v) in [20.0, 4.0, 30.0, 10.0, 5.0].iter().enumerate() {
            roi.extend(i + 1, (i + 1) as f64, 100.0, *v);
        }
        roi.attach_product(1);
        let scans = ScanTable::new(vec![Scan::Survey(
            SurveyScan::new(0, 0.0, &[], &[]).unwrap(),
        )])
        .unwrap();
        assert!(find_roi_cut(&roi, &scans, &params).is_none());
    }
}
