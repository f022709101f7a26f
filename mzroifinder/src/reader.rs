use std::ops::{Add, AddAssign};

use mzdata::prelude::*;
use mzdata::spectrum::bindata::ArrayRetrievalError;
use mzdata::spectrum::{MultiLayerSpectrum, RefPeakDataLevel, SignalContinuity};
use mzdata::MZReader;

use tracing::{debug, warn};

use mzroi::{ProductScan, ScanTable, SurveyScan};

use crate::driver::MZRoiFinderError;
use crate::time_range::TimeRange;

/// How spectra are filtered while they are read into a [`ScanTable`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadOptions {
    pub time_range: TimeRange,
    /// MS1 ions at or below this intensity are dropped
    pub noise_threshold: f32,
    /// MS2 product ions at or below this fraction of the base peak are dropped
    pub product_ion_fraction: f32,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            time_range: TimeRange::default(),
            noise_threshold: 0.0,
            product_ion_fraction: 0.01,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ReadProgress {
    pub ms1_spectra: usize,
    pub msn_spectra: usize,
    pub ms1_peaks: usize,
    pub msn_peaks: usize,
    /// Spectra with no usable peak list, an unsupported MS level, or no precursor
    pub spectra_skipped: usize,
    pub profile_spectra: usize,
}

impl Add for ReadProgress {
    type Output = ReadProgress;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ReadProgress {
    fn add_assign(&mut self, rhs: Self) {
        self.ms1_spectra += rhs.ms1_spectra;
        self.msn_spectra += rhs.msn_spectra;
        self.ms1_peaks += rhs.ms1_peaks;
        self.msn_peaks += rhs.msn_peaks;
        self.spectra_skipped += rhs.spectra_skipped;
        self.profile_spectra += rhs.profile_spectra;
    }
}

fn peak_arrays(
    spectrum: &MultiLayerSpectrum,
) -> Result<Option<(Vec<f64>, Vec<f32>)>, ArrayRetrievalError> {
    match spectrum.peaks() {
        RefPeakDataLevel::Missing | RefPeakDataLevel::Deconvoluted(_) => Ok(None),
        RefPeakDataLevel::RawData(arrays) => {
            let mzs = arrays.mzs()?.to_vec();
            let intensities = arrays.intensities()?.to_vec();
            Ok(Some((mzs, intensities)))
        }
        RefPeakDataLevel::Centroid(peaks) => {
            Ok(Some(peaks.iter().map(|p| (p.mz, p.intensity)).unzip()))
        }
    }
}

/// Convert one spectrum, returning `None` if it carries nothing the engine can use
fn convert_spectrum(
    spectrum: &MultiLayerSpectrum,
    options: &ReadOptions,
    progress: &mut ReadProgress,
) -> Result<Option<mzroi::Scan>, MZRoiFinderError> {
    let index = spectrum.index();
    let time = spectrum.start_time();
    let Some((mzs, intensities)) = peak_arrays(spectrum)? else {
        debug!("Spectrum {} has no peak list", spectrum.id());
        progress.spectra_skipped += 1;
        return Ok(None);
    };
    if spectrum.signal_continuity() == SignalContinuity::Profile {
        progress.profile_spectra += 1;
    }

    match spectrum.ms_level() {
        1 => {
            let mut scan = SurveyScan::new(index, time, &mzs, &intensities)?;
            scan.drop_ions_below(options.noise_threshold);
            progress.ms1_spectra += 1;
            progress.ms1_peaks += scan.len();
            Ok(Some(scan.into()))
        }
        2 => {
            let Some(precursor_mz) = spectrum.precursor().map(|prec| prec.ion().mz) else {
                warn!("MS2 spectrum {} has no precursor, skipping", spectrum.id());
                progress.spectra_skipped += 1;
                return Ok(None);
            };
            let mut scan = ProductScan::new(index, time, precursor_mz, &mzs, &intensities)?;
            scan.retain_above_base_fraction(options.product_ion_fraction);
            progress.msn_spectra += 1;
            progress.msn_peaks += scan.len();
            Ok(Some(scan.into()))
        }
        level => {
            debug!("Skipping MS{level} spectrum {}", spectrum.id());
            progress.spectra_skipped += 1;
            Ok(None)
        }
    }
}

/// Read the MS1 and MS2 spectra of an mzML or MGF file into a [`ScanTable`].
///
/// Spectra are read in acquisition order, and reading stops at the first spectrum
/// past the end of `options.time_range`.
pub fn read_scan_table(
    path: &str,
    options: &ReadOptions,
) -> Result<(ScanTable, ReadProgress), MZRoiFinderError> {
    let reader = MZReader::open_path(path)
        .map_err(|e| MZRoiFinderError::OpenInput(path.to_string(), e))?;

    let mut table = ScanTable::default();
    let mut progress = ReadProgress::default();
    for spectrum in reader {
        let time = spectrum.start_time();
        if options.time_range.is_past(time) {
            debug!("Stopping at {} ({time:0.3})", spectrum.id());
            break;
        }
        if !options.time_range.contains(time) {
            continue;
        }
        if let Some(scan) = convert_spectrum(&spectrum, options, &mut progress)? {
            table.push(scan)?;
        }
    }

    if progress.profile_spectra > 0 {
        warn!(
            "{} spectra were in profile mode and were used without peak picking",
            progress.profile_spectra
        );
    }
    Ok((table, progress))
}
