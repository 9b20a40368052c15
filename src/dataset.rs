use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell value of an uploaded sheet
///
/// Uploaded sheets have no declared schema, so a cell is either a number or
/// a piece of text. Serialized untagged, which matches plain JSON values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view of the value
    ///
    /// Text that parses as a number counts as numeric too, which is what the
    /// chart renderer wants for sheets exported with quoted numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            Scalar::Number(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Whole numbers print without a trailing ".0"
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

/// One row of a sheet: column name -> value, in column order
pub type Row = IndexMap<String, Scalar>;

/// The rows of one uploaded file
pub type Dataset = Vec<Row>;

/// Every dataset an identity has uploaded, keyed by file name
pub type DatasetStore = IndexMap<String, Dataset>;

/// Column list of a dataset
///
/// Columns are the keys of the first row, in order. An empty dataset has no
/// columns.
pub fn columns_of(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

/// Build a row from `(column, value)` pairs
///
/// # Examples
/// ```
/// use datavis::dataset::{row, Scalar};
///
/// let r = row([("Region", Scalar::from("East")), ("Sales", Scalar::from(10))]);
/// assert_eq!(r.keys().collect::<Vec<_>>(), vec!["Region", "Sales"]);
/// ```
pub fn row<K, I>(cells: I) -> Row
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Scalar)>,
{
    cells.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
