//! Delimited-text reader for light-curve tables of unknown layout.
//!
//! Light curves reach us as CSV exports from archive portals, TSV dumps
//! from reduction scripts, pipe-separated tables from catalogue queries
//! and whitespace-separated text from older tools.  Nothing about the
//! schema is known in advance, so [`TableReader`] tries a fixed list of
//! delimiters and keeps the first split that produces a plausible table.
//!
//! Parsing is permissive: rows with more fields than the header are
//! skipped, short rows are padded with missing values and cells that do
//! not parse as numbers become missing.  The result is a [`RawTable`]: a
//! dense `(rows × columns)` array of `f64` in which `NaN` marks a missing
//! cell.

use std::path::Path;

use log::{debug, info};
use ndarray::{Array2, ArrayView1};

use crate::types::IngestParams;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while reading a delimited light-curve file.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "could not parse file: no delimiter in {tried:?} yields at least {min_columns} columns and more than {min_rows} rows"
    )]
    NoUsableDelimiter {
        tried: Vec<char>,
        min_columns: usize,
        min_rows: usize,
    },

    #[error("delimiter {0:?} is not a single-byte character")]
    BadDelimiter(char),
}

// ---------------------------------------------------------------------------
// RawTable
// ---------------------------------------------------------------------------

/// A rectangular table of named numeric columns.
///
/// All columns have the same length by construction.  A column is
/// *numeric* when every non-empty cell in it parsed as a number; a single
/// text cell demotes the whole column, mirroring how dataframe libraries
/// infer dtypes.
#[derive(Clone, Debug)]
pub struct RawTable {
    names: Vec<String>,
    data: Array2<f64>,
    numeric: Vec<bool>,
    delimiter: char,
}

impl RawTable {
    /// Build a table from column names and one value vector per column.
    ///
    /// Every column is assumed numeric; used by tests and by callers that
    /// already hold parsed values.
    pub fn from_columns(names: Vec<String>, columns: Vec<Vec<f64>>) -> Option<Self> {
        if names.len() != columns.len() {
            return None;
        }
        let n_rows = columns.first().map_or(0, Vec::len);
        if columns.iter().any(|c| c.len() != n_rows) {
            return None;
        }
        let n_cols = names.len();
        let data = Array2::from_shape_fn((n_rows, n_cols), |(r, c)| columns[c][r]);
        Some(Self {
            numeric: vec![true; n_cols],
            names,
            data,
            delimiter: ',',
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }

    /// The delimiter that produced this table.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// View of column `j`, missing cells as `NaN`.
    pub fn column(&self, j: usize) -> ArrayView1<'_, f64> {
        self.data.column(j)
    }

    pub fn is_numeric(&self, j: usize) -> bool {
        self.numeric[j]
    }

    /// The non-missing values of column `j`, in row order.
    pub fn present_values(&self, j: usize) -> Vec<f64> {
        self.column(j).iter().copied().filter(|v| !v.is_nan()).collect()
    }

    /// Indices of rows where every column in `cols` holds a value.
    pub fn complete_rows(&self, cols: &[usize]) -> Vec<usize> {
        (0..self.n_rows())
            .filter(|&r| cols.iter().all(|&c| !self.data[[r, c]].is_nan()))
            .collect()
    }

    /// Values of column `j` at the given rows.
    pub fn gather(&self, j: usize, rows: &[usize]) -> Vec<f64> {
        rows.iter().map(|&r| self.data[[r, j]]).collect()
    }
}

// ---------------------------------------------------------------------------
// TableReader
// ---------------------------------------------------------------------------

/// Delimiter-sniffing reader producing a [`RawTable`].
#[derive(Clone, Debug, Default)]
pub struct TableReader {
    params: IngestParams,
}

impl TableReader {
    pub fn new(params: IngestParams) -> Self {
        Self { params }
    }

    /// Read the whole file at `path` and parse it.
    ///
    /// The content is decoded lossily: stray non-UTF-8 bytes only affect
    /// the cells they sit in.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<RawTable, TableError> {
        let bytes = std::fs::read(path.as_ref())?;
        let content = String::from_utf8_lossy(&bytes);
        self.parse(&content)
    }

    /// Parse already-loaded text, trying each delimiter in order.
    pub fn parse(&self, content: &str) -> Result<RawTable, TableError> {
        for &delimiter in &self.params.delimiters {
            let table = match self.parse_with(content, delimiter)? {
                Some(table) => table,
                None => continue,
            };

            if table.n_cols() >= self.params.min_columns && table.n_rows() > self.params.min_rows {
                info!(
                    "Parsed table with delimiter {:?}: {} rows × {} columns",
                    delimiter,
                    table.n_rows(),
                    table.n_cols(),
                );
                return Ok(table);
            }

            debug!(
                "Delimiter {:?} rejected: {} rows × {} columns",
                delimiter,
                table.n_rows(),
                table.n_cols(),
            );
        }

        Err(TableError::NoUsableDelimiter {
            tried: self.params.delimiters.clone(),
            min_columns: self.params.min_columns,
            min_rows: self.params.min_rows,
        })
    }

    /// Split `content` on a single delimiter.
    ///
    /// Returns `Ok(None)` when not even a header row can be read.
    fn parse_with(&self, content: &str, delimiter: char) -> Result<Option<RawTable>, TableError> {
        let delim = single_byte(delimiter)?;
        let comment = single_byte(self.params.comment)?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delim)
            .comment(Some(comment))
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let names: Vec<String> = match reader.headers() {
            Ok(headers) => headers
                .iter()
                .enumerate()
                .map(|(j, h)| {
                    if h.is_empty() {
                        format!("column_{j}")
                    } else {
                        h.to_string()
                    }
                })
                .collect(),
            Err(e) => {
                debug!("Delimiter {:?}: unreadable header ({})", delimiter, e);
                return Ok(None);
            }
        };
        if names.is_empty() {
            return Ok(None);
        }

        let n_cols = names.len();
        let mut numeric = vec![true; n_cols];
        let mut values = Vec::new();
        let mut n_rows = 0usize;
        let mut skipped = 0usize;

        for record in reader.records() {
            let record = match record {
                Ok(record) if record.len() <= n_cols => record,
                _ => {
                    skipped += 1;
                    continue;
                }
            };
            for (j, is_numeric) in numeric.iter_mut().enumerate() {
                values.push(parse_cell(record.get(j).unwrap_or(""), is_numeric));
            }
            n_rows += 1;
        }

        if skipped > 0 {
            debug!("Delimiter {:?}: skipped {} malformed rows", delimiter, skipped);
        }

        // `values` holds exactly n_rows × n_cols cells, so the shape always matches.
        let data = match Array2::from_shape_vec((n_rows, n_cols), values) {
            Ok(data) => data,
            Err(_) => return Ok(None),
        };

        Ok(Some(RawTable {
            names,
            data,
            numeric,
            delimiter,
        }))
    }
}

fn single_byte(c: char) -> Result<u8, TableError> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(TableError::BadDelimiter(c))
    }
}

/// Parse one cell.  Empty and non-finite cells are missing; text marks the
/// column as non-numeric.
fn parse_cell(cell: &str, is_numeric: &mut bool) -> f64 {
    if cell.is_empty() {
        return f64::NAN;
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        Ok(_) => f64::NAN,
        Err(_) => {
            *is_numeric = false;
            f64::NAN
        }
    }
}
