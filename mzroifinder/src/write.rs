use std::fs;
use std::io::{self, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use mzroi::{Roi, ScanTable};

use crate::args::{is_gzipped, ReportFormat};
use crate::driver::MZRoiFinderError;

/// One line of the feature report, describing a single region of interest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub id: usize,
    pub mz: f64,
    pub rt: f64,
    pub apex_scan: usize,
    pub length: usize,
    pub peak_area: f64,
    pub peak_height: f32,
    pub peak_height_by_average: f32,
    pub total_intensity: f32,
    pub mz_error: Option<f64>,
    pub quality: String,
    pub charge: i32,
    pub is_isotope: bool,
    pub isotope_generation: usize,
    pub isotope_element: Option<String>,
    pub parent_roi_id: Option<usize>,
    pub child_roi_ids: String,
    pub isotope_mzs: String,
    pub isotope_intensities: String,
    pub ms2_count: usize,
    pub best_ms2_scan: Option<usize>,
    pub best_ms2_precursor_mz: Option<f64>,
}

impl ReportRow {
    /// Build a row for a processed region of interest. Returns `None` if it was never summarized.
    pub fn from_roi(roi: &Roi, scans: &ScanTable) -> Option<Self> {
        let summary = roi.summary?;
        let best_ms2_precursor_mz = roi
            .best_product
            .and_then(|i| scans.product_scan(i))
            .map(|p| p.precursor_mz);
        Some(Self {
            id: roi.id.unwrap_or_default(),
            mz: summary.mz,
            rt: summary.rt,
            apex_scan: summary.apex_scan_index,
            length: summary.length,
            peak_area: summary.peak_area,
            peak_height: summary.peak_height,
            peak_height_by_average: summary.peak_height_by_average,
            total_intensity: summary.total_intensity,
            mz_error: roi.mz_error(),
            quality: roi
                .quality
                .map(|q| q.to_string())
                .unwrap_or_default(),
            charge: roi.charge,
            is_isotope: roi.isotope.is_isotope,
            isotope_generation: roi.isotope.generation,
            isotope_element: roi.isotope.element.map(|e| e.to_string()),
            parent_roi_id: roi.isotope.parent_roi_id,
            child_roi_ids: roi.isotope.child_roi_ids.iter().join(";"),
            isotope_mzs: roi.isotope_mzs.iter().map(|mz| format!("{mz:0.5}")).join(";"),
            isotope_intensities: roi.isotope_intensities.iter().join(";"),
            ms2_count: roi.product_scans.len(),
            best_ms2_scan: roi.best_product,
            best_ms2_precursor_mz,
        })
    }
}

pub fn build_report(rois: &[Roi], scans: &ScanTable) -> Vec<ReportRow> {
    rois.iter()
        .filter_map(|roi| ReportRow::from_roi(roi, scans))
        .collect()
}

/// Write `rows` to `writer` in `format`. [`ReportFormat::Auto`] is treated as CSV.
pub fn write_report<W: Write>(
    rows: &[ReportRow],
    writer: W,
    format: ReportFormat,
) -> Result<(), MZRoiFinderError> {
    match format {
        ReportFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writeln!(writer)?;
            writer.flush()?;
        }
        ReportFormat::Csv | ReportFormat::Tsv | ReportFormat::Auto => {
            let delimiter = if format == ReportFormat::Tsv { b'\t' } else { b',' };
            let mut writer = csv::WriterBuilder::new()
                .delimiter(delimiter)
                .from_writer(writer);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

/// Write `rows` to the file at `path`, or to STDOUT if `path` is `-`.
///
/// Paths ending in `.gz` are gzip compressed.
pub fn write_report_to_path(
    rows: &[ReportRow],
    path: &Path,
    format: ReportFormat,
) -> Result<(), MZRoiFinderError> {
    let format = format.resolve(path);
    if path == Path::new("-") {
        let stdout = io::stdout();
        return write_report(rows, stdout.lock(), format);
    }
    debug!("Writing {} rows as {format} to {}", rows.len(), path.display());
    let handle = io::BufWriter::new(fs::File::create(path)?);
    if is_gzipped(path) {
        let mut encoder = GzEncoder::new(handle, Compression::best());
        write_report(rows, &mut encoder, format)?;
        encoder.finish()?.flush()?;
    } else {
        write_report(rows, handle, format)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    use flate2::read::GzDecoder;
    use mzroi::{RoiEngine, SurveyScan};
    use std::io::Read;

    fn make_rows() -> Vec<ReportRow> {
        let mut scans = ScanTable::default();
        for (i, (a, b)) in [(10.0, 5.0), (50.0, 20.0), (100.0, 45.0), (60.0, 35.0), (20.0, 8.0)]
            .into_iter()
            .enumerate()
        {
            scans
                .push(SurveyScan::new(i, i as f64 * 0.02, &[500.0, 501.0034], &[a, b]).unwrap())
                .unwrap();
        }
        let (rois, _) = RoiEngine::default().detect(&scans).unwrap();
        build_report(&rois, &scans)
    }

    #[test]
    fn test_rows() {
        let rows = make_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 0);
        assert_eq!(rows[0].child_roi_ids, "1");
        assert_eq!(rows[0].isotope_mzs, "500.00000;501.00340");
        assert_eq!(rows[1].parent_roi_id, Some(0));
        assert_eq!(rows[1].isotope_element.as_deref(), Some("C"));
        assert_eq!(rows[0].quality, "good");
        assert_eq!(rows[0].ms2_count, 0);
    }

    #[test]
    fn test_write_csv() -> Result<(), MZRoiFinderError> {
        let rows = make_rows();
        let mut buf = Vec::new();
        write_report(&rows, &mut buf, ReportFormat::Csv)?;
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("id,mz,rt,apex_scan,length"));
        assert_eq!(lines.count(), 2);
        Ok(())
    }

    #[test]
    fn test_write_tsv_json() -> Result<(), MZRoiFinderError> {
        let rows = make_rows();
        let mut buf = Vec::new();
        write_report(&rows, &mut buf, ReportFormat::Tsv)?;
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("id\tmz\trt"));

        let mut buf = Vec::new();
        write_report(&rows, &mut buf, ReportFormat::Json)?;
        let value: serde_json::Value = serde_json::from_slice(&buf)?;
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[1]["is_isotope"], serde_json::Value::Bool(true));
        Ok(())
    }

    #[test]
    fn test_write_gzip() -> Result<(), MZRoiFinderError> {
        let rows = make_rows();
        let path = std::env::temp_dir().join(format!("mzroifinder-{}.csv.gz", std::process::id()));
        write_report_to_path(&rows, &path, ReportFormat::Auto)?;
        let mut text = String::new();
        GzDecoder::new(fs::File::open(&path)?).read_to_string(&mut text)?;
        fs::remove_file(&path)?;
        assert!(text.starts_with("id,mz"));
        assert_eq!(text.lines().count(), 3);
        Ok(())
    }
}
