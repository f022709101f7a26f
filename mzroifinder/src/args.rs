use std::fmt::Display;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The layout of the feature report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    /// Infer the format from the output path, writing CSV to STDOUT
    Auto,
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// A JSON array with one object per region of interest
    Json,
}

impl ReportFormat {
    /// Resolve [`ReportFormat::Auto`] against `path`, ignoring a trailing `.gz`
    pub fn resolve(self, path: &Path) -> Self {
        if self != Self::Auto {
            return self;
        }
        let path = if is_gzipped(path) {
            path.with_extension("")
        } else {
            path.to_path_buf()
        };
        match path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("json") => Self::Json,
            Some("tsv") | Some("txt") => Self::Tsv,
            _ => Self::Csv,
        }
    }
}

impl Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub(crate) fn is_gzipped(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_resolve_format() {
        assert_eq!(
            ReportFormat::Auto.resolve(Path::new("rois.json")),
            ReportFormat::Json
        );
        assert_eq!(
            ReportFormat::Auto.resolve(Path::new("out/rois.tsv.gz")),
            ReportFormat::Tsv
        );
        assert_eq!(
            ReportFormat::Auto.resolve(Path::new("rois.csv.gz")),
            ReportFormat::Csv
        );
        assert_eq!(ReportFormat::Auto.resolve(Path::new("-")), ReportFormat::Csv);
        assert_eq!(
            ReportFormat::Json.resolve(Path::new("rois.csv")),
            ReportFormat::Json
        );
    }
}
