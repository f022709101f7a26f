//! Build regions of interest by tracking ions through consecutive survey scans.
//!
//! Active traces are held in an arena ordered by creation. Each survey scan, every active
//! trace looks up the nearest ion to its anchor m/z, and the first trace to ask for an ion
//! claims it. Traces that go unmatched are padded with a zero, and retired once they have
//! gone more than `roi_gap` scans without a detection. Unclaimed ions start new traces.
use std::collections::HashMap;

use identity_hash::BuildIdentityHasher;
use tracing::{debug, trace, warn};

use crate::params::RoiParams;
use crate::roi::Roi;
use crate::scan::{nearest_peak, ProductScan, ScanTable, SurveyBlock, SurveyScan};

/// A mapping from the position of an ion in a survey scan to the product scans assigned to it
pub type ProductAllocation = HashMap<usize, Vec<usize>, BuildIdentityHasher<usize>>;

/// Assign each product scan to the survey ion with the nearest m/z to its precursor.
///
/// Every product scan mapped to an ion is kept, not only the last one acquired, so an ion
/// fragmented twice within one survey block already has the two MS2 spectra that
/// [`find_roi_cut`](crate::segment::find_roi_cut) needs before it will consider a cut.
pub fn allocate_products<'a, I: IntoIterator<Item = &'a ProductScan>>(
    survey: &SurveyScan,
    products: I,
) -> ProductAllocation {
    let mut allocation = ProductAllocation::default();
    let peaks = survey.as_slice();
    for product in products {
        match nearest_peak(peaks, product.precursor_mz) {
            Some((i, _)) => allocation.entry(i).or_default().push(product.index),
            None => {
                warn!(
                    "Product scan {} with precursor {:0.4} could not be allocated, survey scan {} is empty",
                    product.index, product.precursor_mz, survey.index
                );
            }
        }
    }
    allocation
}

/// Tracks ion traces through a sequence of survey scans.
///
/// Ions with zero intensity are treated as undetected: they never extend, reset or start a trace.
#[derive(Debug, Clone)]
pub struct RoiTracker<'a> {
    params: &'a RoiParams,
    active: Vec<Roi>,
    finished: Vec<Roi>,
    last_survey: Option<(usize, f64)>,
    claimed: Vec<bool>,
}

impl<'a> RoiTracker<'a> {
    pub fn new(params: &'a RoiParams) -> Self {
        Self {
            params,
            active: Vec::new(),
            finished: Vec::new(),
            last_survey: None,
            claimed: Vec::new(),
        }
    }

    /// The traces still accepting detections, in creation order
    pub fn active(&self) -> &[Roi] {
        &self.active
    }

    /// The traces that have been retired
    pub fn finished(&self) -> &[Roi] {
        &self.finished
    }

    fn attach(roi: &mut Roi, allocation: &mut ProductAllocation, ion: usize) {
        if let Some(products) = allocation.remove(&ion) {
            roi.product_scans.extend(products);
        }
    }

    fn seed(&mut self, survey: &SurveyScan, mut allocation: ProductAllocation) {
        for (i, peak) in survey.as_slice().iter().enumerate() {
            if peak.intensity <= 0.0 {
                continue;
            }
            let mut roi = Roi::seed(
                survey.index,
                survey.retention_time,
                peak.mz,
                peak.intensity,
            );
            Self::attach(&mut roi, &mut allocation, i);
            self.active.push(roi);
        }
        debug!(
            "Seeded {} traces from survey scan {}",
            self.active.len(),
            survey.index
        );
    }

    /// Consume the next survey scan and the product scans acquired before the one after it
    pub fn observe(&mut self, block: SurveyBlock<'_>) {
        let survey = block.survey;
        let mut allocation = allocate_products(survey, block.products());

        let (last_index, last_time) = match self.last_survey {
            Some(last) => last,
            None => {
                self.seed(survey, allocation);
                self.last_survey = Some((survey.index, survey.retention_time));
                return;
            }
        };

        let peaks = survey.as_slice();
        self.claimed.clear();
        self.claimed.resize(peaks.len(), false);

        let tolerance = self.params.mz_tol_ms1;
        let mut extended = 0usize;
        for roi in self.active.iter_mut() {
            let hit = nearest_peak(peaks, roi.anchor_mz).filter(|(i, err)| {
                *err < tolerance && !self.claimed[*i] && peaks[*i].intensity > 0.0
            });
            match hit {
                Some((i, _)) => {
                    let peak = &peaks[i];
                    roi.extend(
                        survey.index,
                        survey.retention_time,
                        peak.mz,
                        peak.intensity,
                    );
                    Self::attach(roi, &mut allocation, i);
                    self.claimed[i] = true;
                    extended += 1;
                }
                None => {
                    roi.pad(survey.index, survey.retention_time);
                }
            }
        }

        let n_before = self.active.len();
        let (retired, kept): (Vec<Roi>, Vec<Roi>) = self
            .active
            .drain(..)
            .partition(|roi| roi.gap_counter > self.params.roi_gap);
        let n_retired = retired.len();
        self.finished.extend(retired);
        self.active = kept;

        let mut spawned = 0usize;
        for (i, peak) in peaks.iter().enumerate() {
            if self.claimed[i] || peak.intensity <= 0.0 {
                continue;
            }
            let mut roi = Roi::spawn(
                last_index,
                last_time,
                survey.index,
                survey.retention_time,
                peak.mz,
                peak.intensity,
            );
            Self::attach(&mut roi, &mut allocation, i);
            self.active.push(roi);
            spawned += 1;
        }

        if tracing::enabled!(tracing::Level::TRACE) {
            trace!(
                "Survey scan {} at {:0.3}: {} ions, {extended} of {n_before} traces extended, {n_retired} retired, {spawned} spawned",
                survey.index,
                survey.retention_time,
                peaks.len(),
            );
        }
        self.last_survey = Some((survey.index, survey.retention_time));
    }

    /// Retire every remaining active trace and return all traces
    pub fn finish(mut self) -> Vec<Roi> {
        self.finished.append(&mut self.active);
        self.finished
    }
}

/// Track every survey scan in `scans` and return the finished regions of interest
pub fn find_rois(scans: &ScanTable, params: &RoiParams) -> Vec<Roi> {
    let mut tracker = RoiTracker::new(params);
    for block in scans.survey_blocks() {
        tracker.observe(block);
    }
    let rois = tracker.finish();
    debug!("Tracked {} regions of interest", rois.len());
    rois
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scan::Scan;
    use mzpeaks::{CentroidPeak, MZPeakSetType};

    fn survey(index: usize, mzs: &[f64], intensities: &[f32]) -> Scan {
        SurveyScan::new(index, index as f64 * 0.1, mzs, intensities)
            .unwrap()
            .into()
    }

    #[test]
    fn test_allocate_products() {
        let s = SurveyScan::new(0, 0.0, &[100.0, 200.0, 300.0], &[1.0, 1.0, 1.0]).unwrap();
        let products = vec![
            ProductScan::new(1, 0.0, 199.0, &[], &[]).unwrap(),
            ProductScan::new(2, 0.0, 201.0, &[], &[]).unwrap(),
            ProductScan::new(3, 0.0, 1000.0, &[], &[]).unwrap(),
        ];
        let alloc = allocate_products(&s, &products);
        assert_eq!(alloc.get(&1), Some(&vec![1, 2]));
        assert_eq!(alloc.get(&2), Some(&vec![3]));
        assert!(alloc.get(&0).is_none());
    }

    #[test]
    fn test_claim_order() {
        let params = RoiParams::default();
        let scans = ScanTable::new(vec![
            survey(0, &[100.0, 100.004], &[10.0, 20.0]),
            survey(1, &[100.001], &[30.0]),
        ])
        .unwrap();
        let mut tracker = RoiTracker::new(&params);
        for block in scans.survey_blocks() {
            tracker.observe(block);
        }
        let active = tracker.active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].intensities, vec![10.0, 30.0]);
        assert_eq!(active[1].intensities, vec![20.0, 0.0]);
        assert_eq!(active[1].gap_counter, 1);
    }

    #[test]
    fn test_retire() {
        let params = RoiParams::default();
        let scans = ScanTable::new(vec![
            survey(0, &[100.0], &[10.0]),
            survey(1, &[], &[]),
            survey(2, &[], &[]),
            survey(3, &[], &[]),
        ])
        .unwrap();
        let mut tracker = RoiTracker::new(&params);
        let mut blocks = scans.survey_blocks();
        for _ in 0..3 {
            tracker.observe(blocks.next().unwrap());
        }
        assert_eq!(tracker.active().len(), 1);
        tracker.observe(blocks.next().unwrap());
        assert_eq!(tracker.active().len(), 0);
        assert_eq!(tracker.finished().len(), 1);
        assert_eq!(tracker.finished()[0].len(), 4);
    }

    #[test]
    fn test_zero_intensity_ions_ignored() {
        let params = RoiParams::default();
        let mut zeroed = SurveyScan::new(1, 0.1, &[], &[]).unwrap();
        zeroed.peaks = MZPeakSetType::new(vec![CentroidPeak::new(100.0, 0.0, 0)]);
        let scans = ScanTable::new(vec![
            survey(0, &[100.0, 200.0], &[10.0, 20.0]),
            zeroed.into(),
        ])
        .unwrap();
        let mut tracker = RoiTracker::new(&params);
        for block in scans.survey_blocks() {
            tracker.observe(block);
        }
        assert_eq!(tracker.active().len(), 2);
        for roi in tracker.active() {
            assert_eq!(roi.gap_counter, 1);
            assert_eq!(roi.nonzero_count(), 1);
        }
    }

    #[test]
    fn test_empty() {
        let params = RoiParams::default();
        let scans = ScanTable::default();
        assert!(find_rois(&scans, &params).is_empty());
    }
}
