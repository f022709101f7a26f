use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mzdata::spectrum::bindata::ArrayRetrievalError;

use tracing::{debug, info};

use mzroi::{IsotopeSearchParams, RoiEngine, RoiError, RoiParams, WorkflowOptions};

use crate::args::ReportFormat;
use crate::reader::{read_scan_table, ReadOptions};
use crate::time_range::TimeRange;
use crate::write::{build_report, write_report_to_path};

fn non_negative_float_f32(s: &str) -> Result<f32, String> {
    let value = s.parse::<f32>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}

fn positive_float_f64(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|e| e.to_string())?;
    if value <= 0.0 || !value.is_finite() {
        Err(format!("`{s}` must be a positive number"))
    } else {
        Ok(value)
    }
}

#[derive(Debug, Error)]
pub enum MZRoiFinderError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to open input file {0}: {1}")]
    OpenInput(String, #[source] io::Error),
    #[error("Failed to read spectrum data: {0}")]
    ArrayRetrievalError(
        #[source]
        #[from]
        ArrayRetrievalError,
    ),
    #[error("Failed to process regions of interest: {0}")]
    RoiError(
        #[source]
        #[from]
        RoiError,
    ),
    #[error("Failed to load configuration: {0}")]
    ConfigError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("Failed to write CSV report: {0}")]
    CsvError(
        #[source]
        #[from]
        csv::Error,
    ),
    #[error("Failed to write JSON report: {0}")]
    JsonError(
        #[source]
        #[from]
        serde_json::Error,
    ),
}

/// Region of interest detection and isotope grouping for LC-MS files.
///
/// Read a centroided mzML or MGF file, trace every MS1 ion through the run, split traces
/// that contain co-eluting compounds, and write one report row per region of interest.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
#[serde(default)]
pub struct MZRoiFinder {
    /// The path to read the input spectra from
    #[arg()]
    pub input_file: String,

    /// The path to write the report to, or if '-' is passed, write to STDOUT.
    ///
    /// Paths ending in `.gz` are gzip compressed.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    pub output_file: PathBuf,

    /// The report format. `auto` infers it from the output path.
    #[arg(short = 'f', long = "output-format", default_value = "auto")]
    pub output_format: ReportFormat,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzroifinder.toml` in the working directory.
    /// Environment variables prefixed with `MZROIFINDER_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// The time range to process, denoted (start?)-(stop?)
    #[arg(
        short='r',
        long="time-range",
        value_parser=TimeRange::from_str,
        value_name="BEGIN-END",
        long_help=r#"The time range to process in minutes, denoted (start?)-(stop?)

If a start is not specified, processing begins from the start of the run.
If a stop is not specified, processing stops at the end of the run.
"#
    )]
    pub time_range: Option<TimeRange>,

    /// MS1 ions at or below this intensity are discarded before tracking
    #[arg(
        short = 'n',
        long = "noise-threshold",
        default_value_t = 0.0,
        value_parser = non_negative_float_f32
    )]
    pub noise_threshold: f32,

    /// MS2 product ions at or below this fraction of the base peak are discarded
    #[arg(
        long = "product-ion-fraction",
        default_value_t = 0.01,
        value_parser = non_negative_float_f32
    )]
    pub product_ion_fraction: f32,

    /// The m/z tolerance (Da) for extending a region of interest with an MS1 ion
    #[arg(
        short = 'm',
        long = "ms1-mz-tolerance",
        default_value_t = 0.01,
        value_parser = positive_float_f64
    )]
    pub mz_tol_ms1: f64,

    /// The m/z tolerance (Da) for matching product ions between MS2 spectra
    #[arg(
        short = 'M',
        long = "ms2-mz-tolerance",
        default_value_t = 0.015,
        value_parser = positive_float_f64
    )]
    pub mz_tol_ms2: f64,

    /// The number of consecutive MS1 scans a region of interest may go undetected
    #[arg(short = 'g', long = "roi-gap", default_value_t = 2)]
    pub roi_gap: usize,

    /// The minimum number of points in a `good` region of interest
    #[arg(short = 'k', long = "min-ion-count", default_value_t = 5)]
    pub min_ion_num: usize,

    /// Regions whose MS2 spectra are less similar than this across a local minimum are split
    #[arg(short = 's', long = "ms2-similarity-tolerance", default_value_t = 0.7)]
    pub ms2_similarity_tolerance: f64,

    /// Do not split regions of interest containing co-eluting compounds
    #[arg(long = "no-cut")]
    pub no_cut: bool,

    /// Do not group isotopologues
    #[arg(long = "no-isotopes")]
    pub no_isotopes: bool,

    /// Leave regions of interest shorter than the minimum ion count out of the report
    #[arg(long = "discard-short")]
    pub discard_short: bool,

    #[arg(
        skip,
        help = "The constants used to link isotopologue regions of interest"
    )]
    pub isotope_params: IsotopeSearchParams,
}

impl Default for MZRoiFinder {
    fn default() -> Self {
        let params = RoiParams::default();
        let options = WorkflowOptions::default();
        Self {
            input_file: String::new(),
            output_file: PathBuf::from("-"),
            output_format: ReportFormat::default(),
            log_file: None,
            config_file: None,
            time_range: None,
            noise_threshold: 0.0,
            product_ion_fraction: ReadOptions::default().product_ion_fraction,
            mz_tol_ms1: params.mz_tol_ms1,
            mz_tol_ms2: params.mz_tol_ms2,
            roi_gap: params.roi_gap,
            min_ion_num: params.min_ion_num,
            ms2_similarity_tolerance: params.ms2_similarity_tolerance,
            no_cut: !options.cut_rois,
            no_isotopes: !options.annotate_isotopes,
            discard_short: options.discard_short_rois,
            isotope_params: IsotopeSearchParams::default(),
        }
    }
}

impl MZRoiFinder {
    pub fn roi_params(&self) -> RoiParams {
        RoiParams::new(
            self.mz_tol_ms1,
            self.mz_tol_ms2,
            self.roi_gap,
            self.min_ion_num,
            self.ms2_similarity_tolerance,
        )
    }

    pub fn workflow_options(&self) -> WorkflowOptions {
        WorkflowOptions {
            cut_rois: !self.no_cut,
            annotate_isotopes: !self.no_isotopes,
            discard_short_rois: self.discard_short,
        }
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            time_range: self.time_range.unwrap_or_default(),
            noise_threshold: self.noise_threshold,
            product_ion_fraction: self.product_ion_fraction,
        }
    }

    /// Build the engine, rejecting unusable parameters before any input is read
    pub fn build_engine(&self) -> Result<RoiEngine, MZRoiFinderError> {
        let engine = RoiEngine::new(
            self.roi_params(),
            self.isotope_params,
            self.workflow_options(),
        )?;
        Ok(engine)
    }

    pub fn main(&self) -> Result<(), MZRoiFinderError> {
        info!(
            "mzroifinder v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("?")
        );
        info!("Input: {}", self.input_file);
        info!("Output: {}", self.output_file.display());

        let engine = self.build_engine()?;
        debug!("Parameters: {:?}", engine.params());
        debug!("Isotope parameters: {:?}", engine.isotope_params());

        let start = Instant::now();
        let read_options = self.read_options();
        if let Some(time_range) = self.time_range {
            info!("Restricting to {:0.3}-{:0.3}", time_range.start, time_range.end);
        }
        let (scans, prog) = read_scan_table(&self.input_file, &read_options)?;
        info!("MS1 Spectra: {}", prog.ms1_spectra);
        info!("MSn Spectra: {}", prog.msn_spectra);
        info!("MS1 Peaks: {}", prog.ms1_peaks);
        info!("MSn Peaks: {}", prog.msn_peaks);
        if prog.spectra_skipped > 0 {
            info!("Spectra Skipped: {}", prog.spectra_skipped);
        }
        let read_done = Instant::now();
        debug!("Reading finished in {:0.3?}", read_done - start);

        let (rois, counts) = engine.detect(&scans)?;
        info!(
            "Regions of Interest: {} tracked | {} after segmentation | {} discarded",
            counts.rois_tracked, counts.rois_after_segmentation, counts.rois_discarded
        );
        info!(
            "Isotope Clusters: {} | Isotopes: {}",
            counts.isotope_clusters, counts.isotopes_assigned
        );

        let rows = build_report(&rois, &scans);
        write_report_to_path(&rows, &self.output_file, self.output_format)?;
        info!("Reported: {}", rows.len());

        let elapsed = Instant::now() - start;
        info!("Total Elapsed Time: {:0.3?}", elapsed);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = MZRoiFinder::parse_from([
            "mzroifinder",
            "run.mzML",
            "-o",
            "rois.csv",
            "-r",
            "1-5",
            "-n",
            "200",
            "--no-cut",
            "-g",
            "3",
        ]);
        assert_eq!(args.input_file, "run.mzML");
        assert_eq!(args.time_range, Some(TimeRange::new(1.0, 5.0)));
        assert_eq!(args.noise_threshold, 200.0);
        assert_eq!(args.roi_params().roi_gap, 3);
        assert!(!args.workflow_options().cut_rois);
        assert!(args.workflow_options().annotate_isotopes);
        assert_eq!(args.isotope_params, IsotopeSearchParams::default());
    }

    #[test]
    fn test_defaults_agree() {
        let parsed = MZRoiFinder::parse_from(["mzroifinder", "run.mzML"]);
        let default = MZRoiFinder::default();
        assert_eq!(parsed.roi_params(), default.roi_params());
        assert_eq!(parsed.workflow_options(), default.workflow_options());
        assert_eq!(parsed.read_options(), default.read_options());
        assert_eq!(parsed.output_file, default.output_file);
    }

    #[test]
    fn test_rejects_bad_params() {
        let args = MZRoiFinder {
            min_ion_num: 0,
            ..Default::default()
        };
        assert!(matches!(
            args.build_engine(),
            Err(MZRoiFinderError::RoiError(RoiError::InvalidParameter { .. }))
        ));
        assert!(non_negative_float_f32("-1").is_err());
        assert!(positive_float_f64("0").is_err());
    }
}
