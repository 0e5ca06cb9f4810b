use std::collections::HashSet;

use nalgebra::DMatrix;
use nshare::IntoNdarray2;
use serde::{Deserialize, Serialize};

use super::transform::{project, TransformationModel};
use super::LdaError;
use crate::dense::{DenseTable, FeatureExtractor};
use crate::utils::{check_cancelled, report_row_progress, unique_name, ExecutionMonitor, NoopMonitor};

/// Settings for applying a stored [`TransformationModel`] to new tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Number of leading dimensions to output; all of the model's when `None`.
    pub dimensions: Option<usize>,
    pub fail_on_missing: bool,
    /// Drop the model's input columns from the output table.
    pub remove_used_columns: bool,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            dimensions: None,
            fail_on_missing: false,
            remove_used_columns: false,
        }
    }
}

/// Builder for [`LdaApplier`].
///
/// Defaults: all of the model's dimensions, missing values produce missing outputs, input
/// columns are kept.
pub struct LdaApplyBuilder {
    config: ApplyConfig,
}

impl LdaApplyBuilder {
    pub fn new() -> Self {
        Self {
            config: ApplyConfig::default(),
        }
    }

    /// Output only the first `dimensions` discriminant dimensions.
    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.config.dimensions = Some(dimensions);
        self
    }

    pub fn fail_on_missing(mut self, fail_on_missing: bool) -> Self {
        self.config.fail_on_missing = fail_on_missing;
        self
    }

    pub fn remove_used_columns(mut self, remove_used_columns: bool) -> Self {
        self.config.remove_used_columns = remove_used_columns;
        self
    }

    pub fn build(self) -> LdaApplier {
        LdaApplier::new(self.config)
    }
}

impl Default for LdaApplyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends the projection of every row as columns `LDA dimension 0..k`.
pub struct LdaApplier {
    config: ApplyConfig,
}

impl LdaApplier {
    pub fn new(config: ApplyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ApplyConfig {
        &self.config
    }

    /// Applies `model` to `table`, binding its columns by name.
    ///
    /// # Parameters
    /// - `model`: Stored transformation with the predictor columns it was fitted on
    /// - `table`: Input table; must contain every model column, in any order
    ///
    /// # Returns
    /// - `Ok(AppliedTable)`: Table with the projection appended and the missing row count
    /// - `Err`: A model column is absent, the dimension is out of range, or a row is
    ///   missing values under `fail_on_missing`
    pub fn apply(&self, model: &TransformationModel, table: &DenseTable) -> Result<AppliedTable, LdaError> {
        self.apply_with_monitor(model, table, &NoopMonitor)
    }

    /// Rows with missing predictor values get `NaN` outputs unless `fail_on_missing` is set.
    pub fn apply_with_monitor(
        &self,
        model: &TransformationModel,
        table: &DenseTable,
        monitor: &dyn ExecutionMonitor,
    ) -> Result<AppliedTable, LdaError> {
        let indices = model.bind(table)?;
        let k = self.config.dimensions.unwrap_or(model.max_dimension());
        let transformation = model.matrix().truncated(k)?;
        let extractor = FeatureExtractor::new(indices);

        let n_rows = table.nrows();
        let mut projected = DMatrix::from_element(n_rows, k, f64::NAN);
        let mut missing_rows = 0;
        for row in 0..n_rows {
            check_cancelled(monitor)?;
            report_row_progress(monitor, row, n_rows, "Applying transformation");

            let features = extractor.extract(table.row(row));
            let result = project(&transformation, features.as_ref(), self.config.fail_on_missing)
                .map_err(|err| match err {
                    LdaError::MissingFeatureValue { .. } => LdaError::MissingFeatureValue { row: Some(row) },
                    other => other,
                })?;
            match result {
                Some(y) => projected.row_mut(row).copy_from(&y.transpose()),
                None => missing_rows += 1,
            }
        }

        let drop: Vec<usize> = if self.config.remove_used_columns {
            extractor.indices().to_vec()
        } else {
            Vec::new()
        };
        let mut taken: HashSet<String> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, _)| !drop.contains(i))
            .map(|(_, c)| c.clone())
            .collect();
        let mut names = Vec::with_capacity(k);
        for i in 0..k {
            let name = unique_name(&taken, &format!("LDA dimension {i}"));
            taken.insert(name.clone());
            names.push(name);
        }

        if missing_rows > 0 {
            log::warn!(
                "{} row(s) with missing predictor values were projected to missing values",
                missing_rows
            );
        }
        log::info!(
            "Projected {} rows onto {} discriminant dimension(s)",
            n_rows,
            k
        );
        let table = table.rearranged(&drop, names, projected.into_ndarray2().into_owned())?;
        Ok(AppliedTable { table, missing_rows })
    }
}

/// Output of [`LdaApplier::apply`]: the extended table and the number of rows whose
/// projection is missing because of missing predictor values.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedTable {
    table: DenseTable,
    missing_rows: usize,
}

impl AppliedTable {
    pub fn table(&self) -> &DenseTable {
        &self.table
    }

    pub fn into_table(self) -> DenseTable {
        self.table
    }

    pub fn missing_rows(&self) -> usize {
        self.missing_rows
    }
}
