use std::ops::{Add, AddAssign};

use tracing::debug;

use crate::error::RoiError;
use crate::isotope::annotate_isotopes;
use crate::params::{IsotopeSearchParams, RoiParams, WorkflowOptions};
use crate::roi::Roi;
use crate::scan::ScanTable;
use crate::segment::segment_rois;
use crate::summary::process_rois;
use crate::tracker::find_rois;

/// Counts collected while running a [`RoiEngine`], for the caller to report
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingCounts {
    pub ms1_scans: usize,
    pub ms2_scans: usize,
    pub rois_tracked: usize,
    pub rois_after_segmentation: usize,
    pub rois_discarded: usize,
    pub isotope_clusters: usize,
    pub isotopes_assigned: usize,
}

impl Add for ProcessingCounts {
    type Output = ProcessingCounts;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProcessingCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.ms1_scans += rhs.ms1_scans;
        self.ms2_scans += rhs.ms2_scans;
        self.rois_tracked += rhs.rois_tracked;
        self.rois_after_segmentation += rhs.rois_after_segmentation;
        self.rois_discarded += rhs.rois_discarded;
        self.isotope_clusters += rhs.isotope_clusters;
        self.isotopes_assigned += rhs.isotopes_assigned;
    }
}

/// Runs the tracking, segmentation, summarization and isotope grouping stages over one run
#[derive(Debug, Clone, Default)]
pub struct RoiEngine {
    /// The tolerances for tracking and segmenting regions of interest
    params: RoiParams,
    /// The constants for linking isotopologues
    isotope_params: IsotopeSearchParams,
    options: WorkflowOptions,
}

impl RoiEngine {
    /// Create an engine, checking that the parameters are usable
    pub fn new(
        params: RoiParams,
        isotope_params: IsotopeSearchParams,
        options: WorkflowOptions,
    ) -> Result<Self, RoiError> {
        params.validate()?;
        isotope_params.validate()?;
        Ok(Self {
            params,
            isotope_params,
            options,
        })
    }

    pub fn params(&self) -> &RoiParams {
        &self.params
    }

    pub fn isotope_params(&self) -> &IsotopeSearchParams {
        &self.isotope_params
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Detect, summarize and group the regions of interest in `scans`.
    ///
    /// The returned regions are sorted by m/z and numbered in that order.
    pub fn detect(&self, scans: &ScanTable) -> Result<(Vec<Roi>, ProcessingCounts), RoiError> {
        let mut counts = ProcessingCounts {
            ms1_scans: scans.survey_count(),
            ms2_scans: scans.product_count(),
            ..Default::default()
        };

        let mut rois = find_rois(scans, &self.params);
        counts.rois_tracked = rois.len();

        if self.options.cut_rois {
            rois = segment_rois(rois, scans, &self.params);
        }
        counts.rois_after_segmentation = rois.len();

        counts.rois_discarded =
            process_rois(&mut rois, scans, &self.params, self.options.discard_short_rois);

        if self.options.annotate_isotopes {
            let grouping = annotate_isotopes(&mut rois, scans, &self.isotope_params)?;
            counts.isotope_clusters = grouping.clusters;
            counts.isotopes_assigned = grouping.isotopes;
        }

        debug!(
            "{} traces tracked, {} after segmentation, {} reported",
            counts.rois_tracked,
            counts.rois_after_segmentation,
            rois.len()
        );
        Ok((rois, counts))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_counts_add() {
        let a = ProcessingCounts {
            ms1_scans: 3,
            isotopes_assigned: 1,
            ..Default::default()
        };
        let mut b = a + a;
        assert_eq!(b.ms1_scans, 6);
        b += a;
        assert_eq!(b.isotopes_assigned, 3);
    }

    #[test]
    fn test_invalid_engine() {
        let params = RoiParams {
            roi_gap: 2,
            mz_tol_ms1: -1.0,
            ..Default::default()
        };
        assert!(RoiEngine::new(params, Default::default(), Default::default()).is_err());
    }

    #[test]
    fn test_empty_run() -> Result<(), RoiError> {
        let engine = RoiEngine::default();
        let (rois, counts) = engine.detect(&ScanTable::default())?;
        assert!(rois.is_empty());
        assert_eq!(counts, ProcessingCounts::default());
        Ok(())
    }
}
