//! CSV reports
//!
//! `single.csv` is written row by row while the run progresses, so rows
//! already produced survive an aborted run. The pairwise reports are written
//! once all pairs have completed.

use pgext_core::Result;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::testing::TestVerdict;

/// Header of `single.csv`
pub const SINGLE_HEADER: [&str; 5] = [
    "extension",
    "in registry",
    "runnable",
    "tests exist",
    "tests pass",
];

/// Top-left cell of `pairwise.csv`; rows are the first extension of a pair
pub const MATRIX_CORNER: &str = "first =>>";

const YES: &str = "yes";
const NO: &str = "no";
const NOT_SUPPORTED: &str = "not supported";

/// Minimal RFC 4180 writer; every row is flushed as it is written
#[derive(Debug)]
pub struct CsvWriter<W: Write> {
    inner: W,
}

impl CsvWriter<BufWriter<File>> {
    /// Create (truncating) a CSV file
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_row<I, S>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let line = fields
            .into_iter()
            .map(|field| escape(field.as_ref()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\r\n")?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// How far single-mode testing got for one extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleStatus {
    NotInRegistry,
    /// A dependency has no registry record
    DependencyUnsupported { tests_declared: bool },
    /// Missing methods or failed provisioning
    CannotRun { tests_declared: bool },
    Ran(TestVerdict),
}

/// One row of `single.csv`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleRow {
    pub extension: String,
    pub status: SingleStatus,
}

impl SingleRow {
    pub fn new(extension: impl Into<String>, status: SingleStatus) -> Self {
        Self {
            extension: extension.into(),
            status,
        }
    }

    /// Cells in [`SINGLE_HEADER`] order
    pub fn cells(&self) -> [String; 5] {
        let declared = |yes: bool| if yes { YES } else { NO };
        let [registry, runnable, exist, pass] = match self.status {
            SingleStatus::NotInRegistry => [NO, NOT_SUPPORTED, NOT_SUPPORTED, NOT_SUPPORTED],
            SingleStatus::DependencyUnsupported { tests_declared }
            | SingleStatus::CannotRun { tests_declared } => {
                [YES, NO, declared(tests_declared), NOT_SUPPORTED]
            }
            SingleStatus::Ran(TestVerdict::NotDeclared) => [YES, YES, NO, NOT_SUPPORTED],
            SingleStatus::Ran(TestVerdict::Passed) => [YES, YES, YES, YES],
            SingleStatus::Ran(TestVerdict::Failed) => [YES, YES, YES, NO],
        };
        [
            self.extension.clone(),
            registry.to_string(),
            runnable.to_string(),
            exist.to_string(),
            pass.to_string(),
        ]
    }
}

/// Compatibility result of one ordered pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairResult {
    pub first: String,
    pub second: String,
    pub compatible: bool,
}

/// Write `pairwise_parallel.csv`: one `first,second,true|false` row per pair
pub fn write_pair_results(path: &Path, results: &[PairResult]) -> Result<()> {
    let mut writer = CsvWriter::create(path)?;
    for result in results {
        writer.write_row([
            result.first.as_str(),
            result.second.as_str(),
            if result.compatible { "true" } else { "false" },
        ])?;
    }
    Ok(())
}

/// Square compatibility matrix over the requested extensions
#[derive(Debug, Clone, Default)]
pub struct CompatibilityMatrix {
    extensions: Vec<String>,
    cells: HashMap<(String, String), bool>,
}

impl CompatibilityMatrix {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions.to_vec(),
            cells: HashMap::new(),
        }
    }

    /// Build from pair results
    pub fn from_results(extensions: &[String], results: &[PairResult]) -> Self {
        let mut matrix = Self::new(extensions);
        for result in results {
            matrix.record(&result.first, &result.second, result.compatible);
        }
        matrix
    }

    pub fn record(&mut self, first: &str, second: &str, compatible: bool) {
        self.cells
            .insert((first.to_string(), second.to_string()), compatible);
    }

    pub fn get(&self, first: &str, second: &str) -> Option<bool> {
        self.cells
            .get(&(first.to_string(), second.to_string()))
            .copied()
    }

    /// Header row followed by one row per first extension; `n/a` on the diagonal
    pub fn rows(&self) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(self.extensions.len() + 1);

        let mut header = vec![MATRIX_CORNER.to_string()];
        header.extend(self.extensions.iter().cloned());
        rows.push(header);

        for first in &self.extensions {
            let mut row = vec![first.clone()];
            for second in &self.extensions {
                let cell = if first == second {
                    "n/a"
                } else {
                    match self.get(first, second) {
                        Some(true) => YES,
                        _ => NO,
                    }
                };
                row.push(cell.to_string());
            }
            rows.push(row);
        }
        rows
    }

    /// Write `pairwise.csv`
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = CsvWriter::create(path)?;
        for row in self.rows() {
            writer.write_row(&row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_string(rows: &[&[&str]]) -> String {
        let mut writer = CsvWriter::new(Vec::new());
        for row in rows {
            writer.write_row(row.iter()).unwrap();
        }
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(
            csv_string(&[&["a", "b,c", "say \"hi\""]]),
            "a,\"b,c\",\"say \"\"hi\"\"\"\r\n"
        );
    }

    #[test]
    fn test_single_rows() {
        assert_eq!(
            SingleRow::new("cube", SingleStatus::Ran(TestVerdict::Passed)).cells(),
            ["cube", "yes", "yes", "yes", "yes"]
        );
        assert_eq!(
            SingleRow::new("unknown_ext", SingleStatus::NotInRegistry).cells(),
            [
                "unknown_ext",
                "no",
                "not supported",
                "not supported",
                "not supported"
            ]
        );
        assert_eq!(
            SingleRow::new(
                "postgis",
                SingleStatus::DependencyUnsupported {
                    tests_declared: true
                }
            )
            .cells(),
            ["postgis", "yes", "no", "yes", "not supported"]
        );
        assert_eq!(
            SingleRow::new("plain", SingleStatus::Ran(TestVerdict::NotDeclared)).cells(),
            ["plain", "yes", "yes", "no", "not supported"]
        );
    }

    #[test]
    fn test_matrix_rows() {
        let extensions = vec!["a".to_string(), "b".to_string()];
        let results = vec![
            PairResult {
                first: "a".into(),
                second: "b".into(),
                compatible: true,
            },
            PairResult {
                first: "b".into(),
                second: "a".into(),
                compatible: false,
            },
        ];
        let matrix = CompatibilityMatrix::from_results(&extensions, &results);
        assert_eq!(
            matrix.rows(),
            vec![
                vec!["first =>>", "a", "b"],
                vec!["a", "n/a", "yes"],
                vec!["b", "no", "n/a"],
            ]
        );
    }
}
