//! Immutable configuration shared by every stage of region of interest processing
use crate::error::RoiError;

/// Tolerances and thresholds for tracking, segmenting and summarizing regions of interest
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RoiParams {
    /// The absolute m/z tolerance (Da) for extending a region of interest with an MS1 ion
    pub mz_tol_ms1: f64,
    /// The absolute m/z tolerance (Da) for matching product ions between MS2 spectra
    pub mz_tol_ms2: f64,
    /// The number of consecutive empty MS1 scans a region of interest may carry before it is closed
    pub roi_gap: usize,
    /// The minimum number of points for a region of interest to be `good` or eligible for cutting
    pub min_ion_num: usize,
    /// MS2 spectra on either side of a candidate cut less similar than this are treated as distinct compounds
    pub ms2_similarity_tolerance: f64,
}

impl Default for RoiParams {
    fn default() -> Self {
        Self {
            mz_tol_ms1: 0.01,
            mz_tol_ms2: 0.015,
            roi_gap: 2,
            min_ion_num: 5,
            ms2_similarity_tolerance: 0.7,
        }
    }
}

fn check_tolerance(name: &'static str, value: f64) -> Result<(), RoiError> {
    if !value.is_finite() || value <= 0.0 {
        Err(RoiError::InvalidParameter {
            name,
            reason: format!("expected a positive, finite value, got {value}"),
        })
    } else {
        Ok(())
    }
}

impl RoiParams {
    pub fn new(
        mz_tol_ms1: f64,
        mz_tol_ms2: f64,
        roi_gap: usize,
        min_ion_num: usize,
        ms2_similarity_tolerance: f64,
    ) -> Self {
        Self {
            mz_tol_ms1,
            mz_tol_ms2,
            roi_gap,
            min_ion_num,
            ms2_similarity_tolerance,
        }
    }

    /// Check that the parameters describe a usable configuration
    pub fn validate(&self) -> Result<(), RoiError> {
        check_tolerance("mz_tol_ms1", self.mz_tol_ms1)?;
        check_tolerance("mz_tol_ms2", self.mz_tol_ms2)?;
        if self.min_ion_num == 0 {
            return Err(RoiError::InvalidParameter {
                name: "min_ion_num",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.ms2_similarity_tolerance) {
            return Err(RoiError::InvalidParameter {
                name: "ms2_similarity_tolerance",
                reason: format!(
                    "expected a value between 0 and 1, got {}",
                    self.ms2_similarity_tolerance
                ),
            });
        }
        Ok(())
    }
}

/// Constants governing how isotopologue regions of interest are linked to their anchor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IsotopeSearchParams {
    /// The m/z tolerance (Da) for matching a region of interest to a candidate isotope m/z
    pub mz_tolerance: f64,
    /// The maximum apex scan index distance between an anchor and its isotopes
    pub scan_window: usize,
    /// Isotopes must correlate with their anchor more strongly than this
    pub minimum_correlation: f64,
    /// The spacing between isotopic peaks of a singly charged ion, the <sup>13</sup>C - <sup>12</sup>C mass difference
    pub isotope_spacing: f64,
    /// How far from a half-integer multiple of `isotope_spacing` an offset may lie
    pub spacing_tolerance: f64,
    /// Offsets above the anchor smaller than this are ignored
    pub min_delta: f64,
    /// Offsets above the anchor larger than this end the search
    pub max_delta: f64,
    /// The largest error allowed when labelling an isotope with the element that explains its spacing
    pub element_tolerance: f64,
}

impl Default for IsotopeSearchParams {
    fn default() -> Self {
        Self {
            mz_tolerance: 0.005,
            scan_window: 2,
            minimum_correlation: 0.9,
            isotope_spacing: 1.003355,
            spacing_tolerance: 0.012,
            min_delta: 0.04,
            max_delta: 10.0,
            element_tolerance: 0.01,
        }
    }
}

impl IsotopeSearchParams {
    pub fn validate(&self) -> Result<(), RoiError> {
        check_tolerance("isotope mz_tolerance", self.mz_tolerance)?;
        check_tolerance("isotope_spacing", self.isotope_spacing)?;
        check_tolerance("spacing_tolerance", self.spacing_tolerance)?;
        check_tolerance("element_tolerance", self.element_tolerance)?;
        if !(self.min_delta >= 0.0 && self.min_delta < self.max_delta) {
            return Err(RoiError::InvalidParameter {
                name: "min_delta",
                reason: format!(
                    "the isotope offset window {}-{} is empty",
                    self.min_delta, self.max_delta
                ),
            });
        }
        Ok(())
    }
}

/// Switches for the optional stages of the detection workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorkflowOptions {
    /// Split regions of interest that appear to contain two co-eluting compounds
    pub cut_rois: bool,
    /// Link isotopologue regions of interest into clusters
    pub annotate_isotopes: bool,
    /// Drop `short` regions of interest after quality assignment
    pub discard_short_rois: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            cut_rois: true,
            annotate_isotopes: true,
            discard_short_rois: false,
        }
    }
}
