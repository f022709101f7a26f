//! Track ion signals through an LC-MS run into regions of interest, split regions spanning
//! co-eluting compounds, summarize each into a quantifiable peak, and link isotopologues.
//!
//! The [`RoiEngine`] runs every stage over a [`ScanTable`]:
//!
//! ```
//! use mzroi::{RoiEngine, ScanTable, SurveyScan};
//!
//! let mut scans = ScanTable::default();
//! scans.push(SurveyScan::new(0, 0.00, &[100.0], &[1000.0]).unwrap()).unwrap();
//! scans.push(SurveyScan::new(1, 0.01, &[100.0005], &[1200.0]).unwrap()).unwrap();
//!
//! let engine = RoiEngine::default();
//! let (rois, _counts) = engine.detect(&scans).unwrap();
//! assert_eq!(rois.len(), 1);
//! assert_eq!(rois[0].peak_height(), 1200.0);
//! ```
pub mod api;
pub mod error;
pub mod isotope;
pub mod params;
pub mod roi;
pub mod scan;
pub mod segment;
pub mod similarity;
pub mod summary;
pub mod tracker;

pub use api::{ProcessingCounts, RoiEngine};
pub use error::RoiError;
pub use isotope::{annotate_isotopes, peak_peak_correlation, IsotopeGrouping};
pub use params::{IsotopeSearchParams, RoiParams, WorkflowOptions};
pub use roi::{IsotopeAnnotation, IsotopeElement, Roi, RoiQuality, RoiSummary};
pub use scan::{ChromatogramPoint, ProductScan, Scan, ScanTable, SurveyBlock, SurveyScan};
pub use segment::{cut_roi, find_roi_cut, segment_rois};
pub use summary::{find_rois_by_mz, process_rois, summarize_roi};
pub use tracker::{find_rois, RoiTracker};
