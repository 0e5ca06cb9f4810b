use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::LdaError;
use crate::dense::{DenseTable, RowSource};
use crate::utils::{check_cancelled, report_row_progress, ExecutionMonitor};

/// The `k×d` projection of a fitted discriminant analysis, one row per retained dimension.
///
/// Never mutated after construction; share it by reference across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct TransformationMatrix {
    w: DMatrix<f64>,
}

impl TransformationMatrix {
    pub fn new(w: DMatrix<f64>) -> Self {
        Self { w }
    }

    /// Builds the matrix from row-major rows of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> anyhow::Result<Self> {
        let k = rows.len();
        let d = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != d) {
            bail!(
                "Row {} of the transformation matrix has {} entries, expected {}",
                bad,
                rows[bad].len(),
                d
            );
        }
        Ok(Self {
            w: DMatrix::from_fn(k, d, |i, j| rows[i][j]),
        })
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.w
            .row_iter()
            .map(|r| r.iter().copied().collect())
            .collect()
    }

    /// Number of output dimensions `k`.
    pub fn dimensions(&self) -> usize {
        self.w.nrows()
    }

    /// Number of predictors `d`.
    pub fn n_predictors(&self) -> usize {
        self.w.ncols()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.w
    }

    /// `W·x`.
    pub fn apply(&self, x: &DVector<f64>) -> Result<DVector<f64>, LdaError> {
        if x.len() != self.n_predictors() {
            return Err(LdaError::DimensionMismatch {
                expected: self.n_predictors(),
                found: x.len(),
            });
        }
        Ok(&self.w * x)
    }

    /// The first `k` rows.
    pub fn truncated(&self, k: usize) -> Result<Self, LdaError> {
        if k == 0 || k > self.dimensions() {
            return Err(LdaError::ProjectionDimensionOutOfRange {
                requested: k,
                max: self.dimensions(),
            });
        }
        Ok(Self {
            w: self.w.rows(0, k).into_owned(),
        })
    }
}

impl TryFrom<Vec<Vec<f64>>> for TransformationMatrix {
    type Error = anyhow::Error;

    fn try_from(rows: Vec<Vec<f64>>) -> anyhow::Result<Self> {
        Self::from_rows(&rows)
    }
}

impl From<TransformationMatrix> for Vec<Vec<f64>> {
    fn from(m: TransformationMatrix) -> Self {
        m.rows()
    }
}

/// Projects one feature vector.
///
/// A missing vector fails with [`LdaError::MissingFeatureValue`] under `fail_on_missing`,
/// otherwise yields `None`, the missing projection.
pub fn project(
    transformation: &TransformationMatrix,
    features: Option<&DVector<f64>>,
    fail_on_missing: bool,
) -> Result<Option<DVector<f64>>, LdaError> {
    match features {
        Some(x) => transformation.apply(x).map(Some),
        None if fail_on_missing => Err(LdaError::MissingFeatureValue { row: None }),
        None => Ok(None),
    }
}

/// Projects every row of `source`, in order. Labels are ignored.
///
/// Under the lenient policy rows with missing values yield `None`; their count is logged once.
pub fn project_rows<S: RowSource + ?Sized>(
    transformation: &TransformationMatrix,
    source: &S,
    fail_on_missing: bool,
    monitor: &dyn ExecutionMonitor,
) -> Result<Vec<Option<DVector<f64>>>, LdaError> {
    let n_rows = source.n_rows();
    let mut out = Vec::with_capacity(n_rows);
    for row in 0..n_rows {
        check_cancelled(monitor)?;
        report_row_progress(monitor, row, n_rows, "Projecting rows");

        let features = source.features(row);
        let projected = project(transformation, features.as_ref(), fail_on_missing).map_err(
            |err| match err {
                LdaError::MissingFeatureValue { .. } => LdaError::MissingFeatureValue { row: Some(row) },
                other => other,
            },
        )?;
        out.push(projected);
    }

    let missing_rows = out.iter().filter(|p| p.is_none()).count();
    if missing_rows > 0 {
        log::warn!(
            "{} row(s) with missing predictor values were projected to missing values",
            missing_rows
        );
    }
    Ok(out)
}

/// A fitted transformation together with the predictor columns defining its input layout.
///
/// Serialized as `{"columns": [...], "matrix": [[...], ...]}` with the matrix row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationModel {
    columns: Vec<String>,
    matrix: TransformationMatrix,
}

impl TransformationModel {
    pub fn new(columns: Vec<String>, matrix: TransformationMatrix) -> Result<Self, LdaError> {
        if columns.len() != matrix.n_predictors() {
            return Err(LdaError::DimensionMismatch {
                expected: matrix.n_predictors(),
                found: columns.len(),
            });
        }
        Ok(Self { columns, matrix })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn matrix(&self) -> &TransformationMatrix {
        &self.matrix
    }

    /// Largest number of dimensions this model can project to.
    pub fn max_dimension(&self) -> usize {
        self.matrix.dimensions()
    }

    /// Indices of the model's columns in `table`, in model order.
    pub fn bind(&self, table: &DenseTable) -> Result<Vec<usize>, LdaError> {
        table.column_indices(&self.columns)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize transformation model")
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let model: Self =
            serde_json::from_str(json).context("Failed to deserialize transformation model")?;
        if model.columns.len() != model.matrix.n_predictors() {
            return Err(anyhow!(
                "Transformation model has {} columns but its matrix expects {} predictors",
                model.columns.len(),
                model.matrix.n_predictors()
            ));
        }
        Ok(model)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write transformation model to {}", path.display()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read transformation model from {}", path.display()))?;
        Self::from_json(&json)
    }
}
