//! The region of interest, a single ion trace accumulated across consecutive MS1 scans
use std::fmt::Display;
use std::ops::Range;

/// Whether a region of interest is long enough to be considered a real chromatographic peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoiQuality {
    Good,
    Short,
}

impl Display for RoiQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoiQuality::Good => f.write_str("good"),
            RoiQuality::Short => f.write_str("short"),
        }
    }
}

/// The element whose heavy isotope best explains the spacing between two isotopologues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IsotopeElement {
    H,
    C,
    N,
    O,
    S,
    Cl,
}

impl IsotopeElement {
    pub const ALL: [IsotopeElement; 6] = [
        IsotopeElement::H,
        IsotopeElement::C,
        IsotopeElement::N,
        IsotopeElement::O,
        IsotopeElement::S,
        IsotopeElement::Cl,
    ];

    /// The mass difference between the most abundant isotope and the heavy isotope used here
    pub const fn mass_difference(&self) -> f64 {
        match self {
            IsotopeElement::H => 1.006277,
            IsotopeElement::C => 1.003355,
            IsotopeElement::N => 0.997035,
            IsotopeElement::O => 2.004246,
            IsotopeElement::S => 1.995796,
            IsotopeElement::Cl => 1.99705,
        }
    }

    pub const fn symbol(&self) -> &'static str {
        match self {
            IsotopeElement::H => "H",
            IsotopeElement::C => "C",
            IsotopeElement::N => "N",
            IsotopeElement::O => "O",
            IsotopeElement::S => "S",
            IsotopeElement::Cl => "Cl",
        }
    }
}

impl Display for IsotopeElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A record of a region of interest's membership in an isotope cluster
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsotopeAnnotation {
    /// Whether this region of interest is a higher isotopologue of some anchor
    pub is_isotope: bool,
    /// The 1-based position of this isotope among those accepted for its anchor, 0 for anchors
    pub generation: usize,
    pub element: Option<IsotopeElement>,
    pub parent_roi_id: Option<usize>,
    pub child_roi_ids: Vec<usize>,
}

/// The numeric attributes of a finished region of interest, computed at its intensity apex
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoiSummary {
    pub mz: f64,
    /// The retention time of the apex, in minutes
    pub rt: f64,
    pub apex_scan_index: usize,
    pub peak_height: f32,
    /// The mean of the (up to) three most intense non-zero points
    pub peak_height_by_average: f32,
    /// The trapezoidal area under the trace, in intensity × seconds
    pub peak_area: f64,
    pub total_intensity: f32,
    /// The number of points in the trace, excluding the leading and trailing zero sentinels
    pub length: usize,
}

/// A region of interest, the trace of a single ion species through consecutive MS1 scans.
///
/// The per-scan arrays always have the same length. Positions with no detected ion carry
/// an intensity of zero and a `NaN` m/z.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Roi {
    pub id: Option<usize>,
    /// The m/z of the ion that started this trace, used for matching while tracking
    pub anchor_mz: f64,
    pub scan_indices: Vec<usize>,
    pub retention_times: Vec<f64>,
    pub mzs: Vec<f64>,
    pub intensities: Vec<f32>,
    /// The number of consecutive scans since the last real detection
    pub gap_counter: usize,
    /// The scan indices of the MS2 spectra attached to this trace, in acquisition order
    pub product_scans: Vec<usize>,
    pub summary: Option<RoiSummary>,
    pub quality: Option<RoiQuality>,
    pub best_product: Option<usize>,
    pub isotope: IsotopeAnnotation,
    pub charge: i32,
    /// The apex m/z of this region and each accepted isotope, when this region anchors a cluster
    pub isotope_mzs: Vec<f64>,
    /// The apex intensity of this region and each accepted isotope
    pub isotope_intensities: Vec<f32>,
}

impl Roi {
    fn empty(anchor_mz: f64) -> Self {
        Self {
            id: None,
            anchor_mz,
            scan_indices: Vec::new(),
            retention_times: Vec::new(),
            mzs: Vec::new(),
            intensities: Vec::new(),
            gap_counter: 0,
            product_scans: Vec::new(),
            summary: None,
            quality: None,
            best_product: None,
            isotope: IsotopeAnnotation::default(),
            charge: 1,
            isotope_mzs: Vec::new(),
            isotope_intensities: Vec::new(),
        }
    }

    /// Start a trace from an ion in the first survey scan of a run
    pub fn seed(scan_index: usize, retention_time: f64, mz: f64, intensity: f32) -> Self {
        let mut this = Self::empty(mz);
        this.push(scan_index, retention_time, mz, intensity);
        this
    }

    /// Start a trace from an ion that appeared after the first survey scan, preceded by a
    /// zero-intensity sentinel at the previous survey scan.
    pub fn spawn(
        previous_scan_index: usize,
        previous_retention_time: f64,
        scan_index: usize,
        retention_time: f64,
        mz: f64,
        intensity: f32,
    ) -> Self {
        let mut this = Self::empty(mz);
        this.push(previous_scan_index, previous_retention_time, f64::NAN, 0.0);
        this.push(scan_index, retention_time, mz, intensity);
        this
    }

    fn push(&mut self, scan_index: usize, retention_time: f64, mz: f64, intensity: f32) {
        self.scan_indices.push(scan_index);
        self.retention_times.push(retention_time);
        self.mzs.push(mz);
        self.intensities.push(intensity);
    }

    /// Add a real detection, resetting the gap counter
    pub fn extend(&mut self, scan_index: usize, retention_time: f64, mz: f64, intensity: f32) {
        self.push(scan_index, retention_time, mz, intensity);
        self.gap_counter = 0;
    }

    /// Add a zero-intensity placeholder for a scan where no ion matched
    pub fn pad(&mut self, scan_index: usize, retention_time: f64) {
        self.push(scan_index, retention_time, f64::NAN, 0.0);
        self.gap_counter += 1;
    }

    pub fn attach_product(&mut self, scan_index: usize) {
        self.product_scans.push(scan_index);
    }

    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    pub fn nonzero_count(&self) -> usize {
        self.intensities.iter().filter(|i| **i > 0.0).count()
    }

    pub fn first_scan_index(&self) -> Option<usize> {
        self.scan_indices.first().copied()
    }

    pub fn last_scan_index(&self) -> Option<usize> {
        self.scan_indices.last().copied()
    }

    /// Iterate over `(scan_index, retention_time, mz, intensity)` points
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64, f64, f32)> + '_ {
        self.scan_indices
            .iter()
            .zip(self.retention_times.iter())
            .zip(self.mzs.iter())
            .zip(self.intensities.iter())
            .map(|(((s, t), m), i)| (*s, *t, *m, *i))
    }

    /// The intensity recorded at a particular scan, if the trace spans it
    pub fn intensity_at(&self, scan_index: usize) -> Option<f32> {
        self.scan_indices
            .binary_search(&scan_index)
            .ok()
            .map(|i| self.intensities[i])
    }

    /// Copy the points in `range` into a new region of interest.
    ///
    /// Only MS2 spectra acquired strictly between the first and last scans of the subset
    /// are carried over. Summary and annotation fields are not.
    pub fn subset(&self, range: Range<usize>) -> Self {
        let mut dup = Self::empty(self.anchor_mz);
        dup.scan_indices = self.scan_indices[range.clone()].to_vec();
        dup.retention_times = self.retention_times[range.clone()].to_vec();
        dup.mzs = self.mzs[range.clone()].to_vec();
        dup.intensities = self.intensities[range].to_vec();
        dup.gap_counter = self.gap_counter;
        if let (Some(first), Some(last)) = (dup.first_scan_index(), dup.last_scan_index()) {
            dup.product_scans = self
                .product_scans
                .iter()
                .copied()
                .filter(|i| *i > first && *i < last)
                .collect();
        }
        dup
    }

    /// The population standard deviation of the m/z values of real detections
    pub fn mz_error(&self) -> Option<f64> {
        let (n, acc) = self
            .mzs
            .iter()
            .filter(|m| !m.is_nan())
            .fold((0usize, 0.0), |(n, acc), m| (n + 1, acc + m));
        if n == 0 {
            return None;
        }
        let mean = acc / n as f64;
        let var = self
            .mzs
            .iter()
            .filter(|m| !m.is_nan())
            .map(|m| (m - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        Some(var.sqrt())
    }

    /// The representative m/z, the apex m/z once summarized or the anchor m/z before
    pub fn mz(&self) -> f64 {
        self.summary.map(|s| s.mz).unwrap_or(self.anchor_mz)
    }

    /// The apex intensity once summarized, zero before
    pub fn peak_height(&self) -> f32 {
        self.summary.map(|s| s.peak_height).unwrap_or_default()
    }

    pub fn rt(&self) -> Option<f64> {
        self.summary.map(|s| s.rt)
    }

    pub fn apex_scan_index(&self) -> Option<usize> {
        self.summary.map(|s| s.apex_scan_index)
    }

    pub fn is_good(&self) -> bool {
        matches!(self.quality, Some(RoiQuality::Good))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_build_trace() {
        let mut roi = Roi::spawn(0, 0.0, 1, 0.1, 200.0, 10.0);
        assert_eq!(roi.len(), 2);
        assert!(roi.mzs[0].is_nan());
        assert_eq!(roi.intensities[0], 0.0);

        roi.pad(2, 0.2);
        roi.pad(3, 0.3);
        assert_eq!(roi.gap_counter, 2);
        roi.extend(4, 0.4, 200.002, 20.0);
        assert_eq!(roi.gap_counter, 0);
        assert_eq!(roi.len(), 5);
        assert_eq!(roi.nonzero_count(), 2);
        assert_eq!(roi.scan_indices.len(), roi.retention_times.len());
        assert_eq!(roi.mzs.len(), roi.intensities.len());
        assert_eq!(roi.anchor_mz, 200.0);
        assert_eq!(roi.intensity_at(4), Some(20.0));
        assert_eq!(roi.intensity_at(5), None);
    }

    #[test]
    fn test_mz_error() {
        let mut roi = Roi::seed(0, 0.0, 100.0, 1.0);
        roi.pad(1, 0.1);
        roi.extend(2, 0.2, 100.002, 1.0);
        let err = roi.mz_error().unwrap();
        assert!((err - 0.001).abs() < 1e-9, "{err}");

        let mut roi = Roi::spawn(0, 0.0, 1, 0.1, 100.0, 1.0);
        roi.intensities[1] = 0.0;
        roi.mzs[1] = f64::NAN;
        assert!(roi.mz_error().is_none());
    }

    #[test]
    fn test_subset() {
        let mut roi = Roi::seed(0, 0.0, 100.0, 1.0);
        for i in 1..6 {
            roi.extend(i * 2, i as f64 * 0.1, 100.0, 10.0 * i as f32);
        }
        roi.attach_product(1);
        roi.attach_product(5);
        roi.attach_product(9);
        let sub = roi.subset(2..5);
        assert_eq!(sub.scan_indices, vec![4, 6, 8]);
        assert_eq!(sub.product_scans, vec![5]);
        assert!(sub.summary.is_none());
    }

    #[test]
    fn test_element_display() {
        assert_eq!(IsotopeElement::Cl.to_string(), "Cl");
        assert_eq!(RoiQuality::Short.to_string(), "short");
        assert_eq!(IsotopeElement::ALL.len(), 6);
    }
}
