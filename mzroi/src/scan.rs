//! The scan-level data model: centroided MS1 survey scans, MS2 product scans and the
//! ordered table holding both for a single LC-MS run.
use std::ops::RangeInclusive;

use mzpeaks::{prelude::*, CentroidPeak, IndexType, MZPeakSetType};

use crate::error::RoiError;

fn validate_arrays(
    index: usize,
    retention_time: f64,
    mzs: &[f64],
    intensities: &[f32],
) -> Result<(), RoiError> {
    if mzs.len() != intensities.len() {
        return Err(RoiError::MismatchedArrays {
            index,
            mz_len: mzs.len(),
            intensity_len: intensities.len(),
        });
    }
    if !retention_time.is_finite() {
        return Err(RoiError::NonFiniteTime {
            index,
            value: retention_time,
        });
    }
    for (position, (mz, inten)) in mzs.iter().zip(intensities.iter()).enumerate() {
        if !mz.is_finite() {
            return Err(RoiError::NonFiniteMZ {
                index,
                position,
                value: *mz,
            });
        }
        if !inten.is_finite() || *inten < 0.0 {
            return Err(RoiError::InvalidIntensity {
                index,
                position,
                value: *inten,
            });
        }
    }
    Ok(())
}

fn build_peaks(mzs: &[f64], intensities: &[f32]) -> MZPeakSetType<CentroidPeak> {
    let peaks: Vec<CentroidPeak> = mzs
        .iter()
        .zip(intensities.iter())
        .enumerate()
        .map(|(i, (mz, inten))| CentroidPeak::new(*mz, *inten, i as IndexType))
        .collect();
    MZPeakSetType::new(peaks)
}

fn filter_peaks<F: Fn(&CentroidPeak) -> bool>(
    peaks: &MZPeakSetType<CentroidPeak>,
    predicate: F,
) -> MZPeakSetType<CentroidPeak> {
    let kept: Vec<CentroidPeak> = peaks
        .iter()
        .filter(|p| predicate(*p))
        .cloned()
        .collect();
    MZPeakSetType::new(kept)
}

/// Find the position of the peak nearest to `mz` in an m/z-sorted slice.
///
/// When two peaks are equidistant, the one with the lower m/z wins.
pub(crate) fn nearest_peak(peaks: &[CentroidPeak], mz: f64) -> Option<(usize, f64)> {
    if peaks.is_empty() {
        return None;
    }
    let i = peaks.partition_point(|p| p.mz < mz);
    let mut best: Option<(usize, f64)> = None;
    for j in [i.checked_sub(1), Some(i)].into_iter().flatten() {
        if let Some(p) = peaks.get(j) {
            let err = (p.mz - mz).abs();
            match best {
                Some((_, best_err)) if best_err <= err => {}
                _ => best = Some((j, err)),
            }
        }
    }
    best
}

/// A centroided MS1 spectrum
#[derive(Debug, Clone)]
pub struct SurveyScan {
    /// The position of this scan in the acquisition sequence
    pub index: usize,
    /// The scan start time, in minutes
    pub retention_time: f64,
    /// The centroided ions, ascending by m/z
    pub peaks: MZPeakSetType<CentroidPeak>,
}

impl SurveyScan {
    /// Build a survey scan from parallel m/z and intensity arrays. The arrays need not be sorted.
    ///
    /// Ions with zero intensity were not detected, and are left out.
    pub fn new(
        index: usize,
        retention_time: f64,
        mzs: &[f64],
        intensities: &[f32],
    ) -> Result<Self, RoiError> {
        validate_arrays(index, retention_time, mzs, intensities)?;
        let peaks = build_peaks(mzs, intensities);
        Ok(Self {
            index,
            retention_time,
            peaks: filter_peaks(&peaks, |p| p.intensity > 0.0),
        })
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn as_slice(&self) -> &[CentroidPeak] {
        self.peaks.as_slice()
    }

    /// Remove all ions whose intensity is at or below `threshold`
    pub fn drop_ions_below(&mut self, threshold: f32) {
        self.peaks = filter_peaks(&self.peaks, |p| p.intensity > threshold);
    }

    /// The ion nearest to `mz` if it lies strictly within `tolerance`
    pub fn nearest_within(&self, mz: f64, tolerance: f64) -> Option<&CentroidPeak> {
        let peaks = self.as_slice();
        nearest_peak(peaks, mz)
            .filter(|(_, err)| *err < tolerance)
            .map(|(i, _)| &peaks[i])
    }
}

/// A centroided MS2 spectrum and the precursor m/z it was isolated for
#[derive(Debug, Clone)]
pub struct ProductScan {
    /// The position of this scan in the acquisition sequence
    pub index: usize,
    /// The scan start time, in minutes
    pub retention_time: f64,
    pub precursor_mz: f64,
    /// The centroided product ions, ascending by m/z
    pub products: MZPeakSetType<CentroidPeak>,
}

impl ProductScan {
    pub fn new(
        index: usize,
        retention_time: f64,
        precursor_mz: f64,
        mzs: &[f64],
        intensities: &[f32],
    ) -> Result<Self, RoiError> {
        validate_arrays(index, retention_time, mzs, intensities)?;
        if !precursor_mz.is_finite() {
            return Err(RoiError::NonFiniteMZ {
                index,
                position: 0,
                value: precursor_mz,
            });
        }
        Ok(Self {
            index,
            retention_time,
            precursor_mz,
            products: build_peaks(mzs, intensities),
        })
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn as_slice(&self) -> &[CentroidPeak] {
        self.products.as_slice()
    }

    /// Keep only product ions strictly more intense than `fraction` of the base peak
    pub fn retain_above_base_fraction(&mut self, fraction: f32) {
        let base = self
            .products
            .iter()
            .map(|p| p.intensity)
            .fold(0.0f32, f32::max);
        let threshold = base * fraction;
        self.products = filter_peaks(&self.products, |p| p.intensity > threshold);
    }

    /// The summed intensity of all product ions
    pub fn total_intensity(&self) -> f32 {
        self.products.iter().map(|p| p.intensity()).sum()
    }
}

/// Either kind of scan held by a [`ScanTable`]
#[derive(Debug, Clone)]
pub enum Scan {
    Survey(SurveyScan),
    Product(ProductScan),
}

impl Scan {
    pub fn index(&self) -> usize {
        match self {
            Scan::Survey(s) => s.index,
            Scan::Product(s) => s.index,
        }
    }

    pub fn retention_time(&self) -> f64 {
        match self {
            Scan::Survey(s) => s.retention_time,
            Scan::Product(s) => s.retention_time,
        }
    }

    pub fn ms_level(&self) -> u8 {
        match self {
            Scan::Survey(_) => 1,
            Scan::Product(_) => 2,
        }
    }

    pub fn as_survey(&self) -> Option<&SurveyScan> {
        match self {
            Scan::Survey(s) => Some(s),
            Scan::Product(_) => None,
        }
    }

    pub fn as_product(&self) -> Option<&ProductScan> {
        match self {
            Scan::Survey(_) => None,
            Scan::Product(s) => Some(s),
        }
    }
}

impl From<SurveyScan> for Scan {
    fn from(value: SurveyScan) -> Self {
        Self::Survey(value)
    }
}

impl From<ProductScan> for Scan {
    fn from(value: ProductScan) -> Self {
        Self::Product(value)
    }
}

/// A survey scan and the product scans acquired after it, up to the next survey scan
#[derive(Debug, Clone, Copy)]
pub struct SurveyBlock<'a> {
    pub survey: &'a SurveyScan,
    pub products: &'a [Scan],
}

impl<'a> SurveyBlock<'a> {
    pub fn products(&self) -> impl Iterator<Item = &'a ProductScan> + 'a {
        self.products.iter().filter_map(|s| s.as_product())
    }
}

/// One point of an extracted ion chromatogram
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChromatogramPoint {
    pub scan_index: usize,
    pub retention_time: f64,
    /// The m/z of the matched ion, or `None` when no ion was within tolerance
    pub mz: Option<f64>,
    pub intensity: f32,
}

fn check_order(prev: &Scan, next: &Scan) -> Result<(), RoiError> {
    if next.index() <= prev.index() {
        return Err(RoiError::ScanOrder {
            previous: prev.index(),
            next: next.index(),
        });
    }
    if next.retention_time() < prev.retention_time() {
        return Err(RoiError::TimeOrder {
            index: next.index(),
            previous: prev.retention_time(),
            next: next.retention_time(),
        });
    }
    Ok(())
}

/// Every scan of a single LC-MS run, in acquisition order
#[derive(Debug, Clone, Default)]
pub struct ScanTable {
    scans: Vec<Scan>,
}

impl ScanTable {
    /// Build a table from scans in acquisition order. Scan indices must be strictly increasing.
    ///
    /// Retention times may repeat but never decrease.
    pub fn new(scans: Vec<Scan>) -> Result<Self, RoiError> {
        for (prev, next) in scans.iter().zip(scans.iter().skip(1)) {
            check_order(prev, next)?;
        }
        Ok(Self { scans })
    }

    /// Append a scan, checking that it follows the last scan in index and retention time
    pub fn push<S: Into<Scan>>(&mut self, scan: S) -> Result<(), RoiError> {
        let scan = scan.into();
        if let Some(last) = self.scans.last() {
            check_order(last, &scan)?;
        }
        self.scans.push(scan);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scan> {
        self.scans.iter()
    }

    /// Look up a scan by its index
    pub fn get(&self, index: usize) -> Option<&Scan> {
        self.scans
            .binary_search_by_key(&index, |s| s.index())
            .ok()
            .map(|i| &self.scans[i])
    }

    pub fn survey_scan(&self, index: usize) -> Option<&SurveyScan> {
        self.get(index).and_then(|s| s.as_survey())
    }

    pub fn product_scan(&self, index: usize) -> Option<&ProductScan> {
        self.get(index).and_then(|s| s.as_product())
    }

    pub fn survey_scans(&self) -> impl Iterator<Item = &SurveyScan> + '_ {
        self.scans.iter().filter_map(|s| s.as_survey())
    }

    pub fn product_scans(&self) -> impl Iterator<Item = &ProductScan> + '_ {
        self.scans.iter().filter_map(|s| s.as_product())
    }

    pub fn survey_count(&self) -> usize {
        self.survey_scans().count()
    }

    pub fn product_count(&self) -> usize {
        self.product_scans().count()
    }

    /// Iterate over each survey scan along with the product scans that follow it.
    ///
    /// Product scans acquired before the first survey scan belong to no block.
    pub fn survey_blocks(&self) -> SurveyBlockIter<'_> {
        let start = self
            .scans
            .iter()
            .position(|s| s.as_survey().is_some())
            .unwrap_or(self.scans.len());
        SurveyBlockIter {
            scans: &self.scans,
            position: start,
        }
    }

    /// Remove every MS1 ion whose intensity is at or below `threshold`
    pub fn drop_ions_below(&mut self, threshold: f32) {
        for scan in self.scans.iter_mut() {
            if let Scan::Survey(s) = scan {
                s.drop_ions_below(threshold)
            }
        }
    }

    /// Trace the most proximal ion to `mz` through every survey scan whose time falls in `time_range`
    pub fn extract_eic(
        &self,
        mz: f64,
        tolerance: f64,
        time_range: RangeInclusive<f64>,
    ) -> Vec<ChromatogramPoint> {
        self.survey_scans()
            .filter(|s| time_range.contains(&s.retention_time))
            .map(|s| match s.nearest_within(mz, tolerance) {
                Some(peak) => ChromatogramPoint {
                    scan_index: s.index,
                    retention_time: s.retention_time,
                    mz: Some(peak.mz),
                    intensity: peak.intensity,
                },
                None => ChromatogramPoint {
                    scan_index: s.index,
                    retention_time: s.retention_time,
                    mz: None,
                    intensity: 0.0,
                },
            })
            .collect()
    }

    /// Find all product scans whose precursor m/z and time are strictly within tolerance of the target
    pub fn find_products_by_mz_rt(
        &self,
        mz: f64,
        retention_time: f64,
        mz_tolerance: f64,
        time_tolerance: f64,
    ) -> Vec<&ProductScan> {
        self.product_scans()
            .filter(|s| {
                (s.precursor_mz - mz).abs() < mz_tolerance
                    && (s.retention_time - retention_time).abs() < time_tolerance
            })
            .collect()
    }

    /// As [`ScanTable::find_products_by_mz_rt`], returning only the most intense match
    pub fn best_product_by_mz_rt(
        &self,
        mz: f64,
        retention_time: f64,
        mz_tolerance: f64,
        time_tolerance: f64,
    ) -> Option<&ProductScan> {
        let mut best: Option<&ProductScan> = None;
        for scan in self.find_products_by_mz_rt(mz, retention_time, mz_tolerance, time_tolerance)
        {
            match best {
                Some(b) if b.total_intensity() >= scan.total_intensity() => {}
                _ => best = Some(scan),
            }
        }
        best
    }
}

/// Iterator over the [`SurveyBlock`]s of a [`ScanTable`]
#[derive(Debug, Clone)]
pub struct SurveyBlockIter<'a> {
    scans: &'a [Scan],
    position: usize,
}

impl<'a> Iterator for SurveyBlockIter<'a> {
    type Item = SurveyBlock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let survey = self.scans.get(self.position)?.as_survey()?;
        let start = self.position + 1;
        let end = self.scans[start..]
            .iter()
            .position(|s| s.as_survey().is_some())
            .map(|i| start + i)
            .unwrap_or(self.scans.len());
        self.position = end;
        Some(SurveyBlock {
            survey,
            products: &self.scans[start..end],
        })
    }
}
