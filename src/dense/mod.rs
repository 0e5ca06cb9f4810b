//! # Dense labeled tables
//!
//! Named `f64` columns backed by an [`ndarray::Array2`], with `NaN` marking a missing cell,
//! and the [`RowSource`] abstraction the discriminant analysis reads its rows through.

use std::collections::HashSet;

use anyhow::bail;
use nalgebra::DVector;
use ndarray::{concatenate, Array2, ArrayView1, ArrayView2, Axis};

use crate::dimred::lda::LdaError;

/// Random access to rows made of an optional feature vector and an optional class label.
///
/// Sources are read more than once (class statistics first, scatter matrices second), so
/// every call for the same row must return the same values.
pub trait RowSource: Sync {
    fn n_rows(&self) -> usize;

    /// Length `d` of every feature vector this source yields.
    fn n_predictors(&self) -> usize;

    /// Feature vector of `row`, or `None` if any predictor value is missing.
    fn features(&self, row: usize) -> Option<DVector<f64>>;

    /// Class label of `row`, or `None` if it is missing.
    fn label(&self, row: usize) -> Option<&str>;
}

/// Extracts fixed-size feature vectors from table rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureExtractor {
    indices: Vec<usize>,
}

impl FeatureExtractor {
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns `None` as soon as one selected cell is missing (`NaN`).
    pub fn extract(&self, row: ArrayView1<f64>) -> Option<DVector<f64>> {
        let mut vec = DVector::zeros(self.indices.len());
        for (c, &idx) in self.indices.iter().enumerate() {
            let value = row[idx];
            if value.is_nan() {
                return None;
            }
            vec[c] = value;
        }
        Some(vec)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenseTable {
    columns: Vec<String>,
    data: Array2<f64>,
}

impl DenseTable {
    pub fn new(columns: Vec<String>, data: Array2<f64>) -> anyhow::Result<Self> {
        if columns.len() != data.ncols() {
            bail!(
                "Number of column names ({}) does not match number of columns ({})",
                columns.len(),
                data.ncols()
            );
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                bail!("Duplicate column name \"{}\"", name);
            }
        }
        Ok(Self { columns, data })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.data.row(i)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Resolves `names` to column indices, reporting every name the table lacks.
    pub fn column_indices(&self, names: &[String]) -> Result<Vec<usize>, LdaError> {
        let mut indices = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.column_index(name) {
                Some(idx) => indices.push(idx),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(LdaError::ColumnMissingFromInput { columns: missing });
        }
        Ok(indices)
    }

    /// Pairs the table with per-row class labels and a predictor column selection.
    pub fn labeled<'a>(
        &'a self,
        predictors: &[String],
        labels: &'a [Option<String>],
    ) -> Result<TableRows<'a>, LdaError> {
        if labels.len() != self.nrows() {
            return Err(LdaError::DimensionMismatch {
                expected: self.nrows(),
                found: labels.len(),
            });
        }
        let extractor = FeatureExtractor::new(self.column_indices(predictors)?);
        Ok(TableRows {
            table: self,
            extractor,
            labels,
        })
    }

    /// New table with the columns at `drop` removed and `values` appended under `names`.
    pub(crate) fn rearranged(
        &self,
        drop: &[usize],
        names: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self, LdaError> {
        let keep: Vec<usize> = (0..self.ncols()).filter(|i| !drop.contains(i)).collect();
        let kept = self.data.select(Axis(1), &keep);
        let data = concatenate(Axis(1), &[kept.view(), values.view()])?;

        let mut columns: Vec<String> = keep.iter().map(|&i| self.columns[i].clone()).collect();
        columns.extend(names);
        Ok(Self { columns, data })
    }
}

/// A [`DenseTable`] viewed through a predictor selection and a class label column.
#[derive(Debug, Clone)]
pub struct TableRows<'a> {
    table: &'a DenseTable,
    extractor: FeatureExtractor,
    labels: &'a [Option<String>],
}

impl TableRows<'_> {
    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }
}

impl RowSource for TableRows<'_> {
    fn n_rows(&self) -> usize {
        self.table.nrows()
    }

    fn n_predictors(&self) -> usize {
        self.extractor.len()
    }

    fn features(&self, row: usize) -> Option<DVector<f64>> {
        self.extractor.extract(self.table.row(row))
    }

    fn label(&self, row: usize) -> Option<&str> {
        self.labels[row].as_deref()
    }
}

/// A single pre-extracted observation.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub features: Option<DVector<f64>>,
    pub label: Option<String>,
}

impl LabeledSample {
    pub fn new(features: &[f64], label: &str) -> Self {
        Self {
            features: Some(DVector::from_column_slice(features)),
            label: Some(label.to_string()),
        }
    }
}

/// A slice of [`LabeledSample`]s with a declared feature dimension.
#[derive(Debug, Clone, Copy)]
pub struct SampleRows<'a> {
    samples: &'a [LabeledSample],
    n_predictors: usize,
}

impl<'a> SampleRows<'a> {
    pub fn new(samples: &'a [LabeledSample], n_predictors: usize) -> Self {
        Self {
            samples,
            n_predictors,
        }
    }
}

impl RowSource for SampleRows<'_> {
    fn n_rows(&self) -> usize {
        self.samples.len()
    }

    fn n_predictors(&self) -> usize {
        self.n_predictors
    }

    fn features(&self, row: usize) -> Option<DVector<f64>> {
        self.samples[row].features.clone()
    }

    fn label(&self, row: usize) -> Option<&str> {
        self.samples[row].label.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_extract_selected_columns() {
        let data = array![[1.0, 2.0, 3.0], [4.0, f64::NAN, 6.0]];
        let extractor = FeatureExtractor::new(vec![2, 0]);

        let v = extractor.extract(data.row(0)).unwrap();
        assert_eq!(v.as_slice(), &[3.0, 1.0]);

        // the missing cell is not selected
        let v = extractor.extract(data.row(1)).unwrap();
        assert_eq!(v.as_slice(), &[6.0, 4.0]);

        let extractor = FeatureExtractor::new(vec![1]);
        assert!(extractor.extract(data.row(1)).is_none());
    }

    #[test]
    fn test_table_rejects_bad_shapes() {
        assert!(DenseTable::new(names(&["a"]), array![[1.0, 2.0]]).is_err());
        assert!(DenseTable::new(names(&["a", "a"]), array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_column_indices_reports_all_missing() {
        let table = DenseTable::new(names(&["a", "b"]), array![[1.0, 2.0]]).unwrap();
        assert_eq!(table.column_indices(&names(&["b", "a"])).unwrap(), vec![1, 0]);

        let err = table.column_indices(&names(&["a", "x", "y"])).unwrap_err();
        assert_eq!(
            err,
            LdaError::ColumnMissingFromInput {
                columns: names(&["x", "y"])
            }
        );
    }

    #[test]
    fn test_table_rows_source() {
        let table = DenseTable::new(names(&["a", "b", "c"]), array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        let labels = vec![Some("x".to_string()), None];
        let rows = table.labeled(&names(&["c", "a"]), &labels).unwrap();

        assert_eq!(rows.n_rows(), 2);
        assert_eq!(rows.n_predictors(), 2);
        assert_eq!(rows.features(1).unwrap().as_slice(), &[6.0, 4.0]);
        assert_eq!(rows.label(0), Some("x"));
        assert_eq!(rows.label(1), None);

        let short = vec![Some("x".to_string())];
        assert!(matches!(
            table.labeled(&names(&["a"]), &short),
            Err(LdaError::DimensionMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_rearranged() {
        let table = DenseTable::new(names(&["a", "b", "c"]), array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        let out = table
            .rearranged(&[0, 2], names(&["p"]), array![[7.0], [8.0]])
            .unwrap();

        assert_eq!(out.columns(), &names(&["b", "p"])[..]);
        assert_eq!(out.data(), array![[2.0, 7.0], [5.0, 8.0]]);
    }
}
