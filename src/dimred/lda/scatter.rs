use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use super::stats::ClassStatistics;
use super::LdaError;
use crate::dense::RowSource;
use crate::utils::{check_cancelled, report_row_progress, ExecutionMonitor};

/// Within-class (`Sw`) and between-class (`Sb`) scatter matrices of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterMatrices {
    within: DMatrix<f64>,
    between: DMatrix<f64>,
    global_mean: DVector<f64>,
    n_samples: usize,
}

impl ScatterMatrices {
    /// Second pass over `source`. `stats` must be the normalized output of the first pass
    /// over the same source, with the same missing value policy.
    pub fn compute<S: RowSource + ?Sized>(
        source: &S,
        stats: &ClassStatistics,
        parallel: bool,
        monitor: &dyn ExecutionMonitor,
    ) -> Result<Self, LdaError> {
        let global_mean = global_mean(stats);
        let within = if parallel {
            within_class_scatter_par(source, stats, monitor)?
        } else {
            within_class_scatter(source, stats, monitor)?
        };
        let between = between_class_scatter(stats, &global_mean, monitor)?;

        Ok(Self {
            within,
            between,
            global_mean,
            n_samples: stats.total_count(),
        })
    }

    pub fn within(&self) -> &DMatrix<f64> {
        &self.within
    }

    pub fn between(&self) -> &DMatrix<f64> {
        &self.between
    }

    pub fn global_mean(&self) -> &DVector<f64> {
        &self.global_mean
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// `Sw` divided by the number of rows that contributed to it.
    pub fn scaled_within(&self) -> DMatrix<f64> {
        self.scaled(&self.within)
    }

    /// `Sb` divided by the number of rows that contributed to it.
    pub fn scaled_between(&self) -> DMatrix<f64> {
        self.scaled(&self.between)
    }

    fn scaled(&self, m: &DMatrix<f64>) -> DMatrix<f64> {
        if self.n_samples == 0 {
            m.clone()
        } else {
            m / self.n_samples as f64
        }
    }
}

/// Count-weighted average of the class means.
pub fn global_mean(stats: &ClassStatistics) -> DVector<f64> {
    let mut mean = DVector::zeros(stats.n_predictors());
    let total = stats.total_count();
    if total == 0 {
        return mean;
    }
    for (_, class) in stats.iter() {
        mean.axpy(class.count() as f64, class.vector(), 1.0);
    }
    mean / total as f64
}

fn centered_row<S: RowSource + ?Sized>(
    source: &S,
    stats: &ClassStatistics,
    row: usize,
) -> Result<Option<DVector<f64>>, LdaError> {
    let Some(features) = source.features(row) else {
        return Ok(None);
    };
    let label = source.label(row).ok_or(LdaError::MissingClassLabel { row })?;
    let class = stats.get(label).ok_or_else(|| LdaError::UnknownClass {
        row,
        label: label.to_string(),
    })?;
    Ok(Some(features - class.vector()))
}

fn within_class_scatter<S: RowSource + ?Sized>(
    source: &S,
    stats: &ClassStatistics,
    monitor: &dyn ExecutionMonitor,
) -> Result<DMatrix<f64>, LdaError> {
    let d = stats.n_predictors();
    let n_rows = source.n_rows();
    let mut sw = DMatrix::zeros(d, d);

    for row in 0..n_rows {
        check_cancelled(monitor)?;
        report_row_progress(monitor, row, n_rows, "Calculating within-class scatter matrix");

        if let Some(v) = centered_row(source, stats, row)? {
            sw.ger(1.0, &v, &v, 1.0);
        }
    }
    Ok(sw)
}

/// Same as [`within_class_scatter`], with per-thread partial sums merged at the end.
fn within_class_scatter_par<S: RowSource + ?Sized>(
    source: &S,
    stats: &ClassStatistics,
    monitor: &dyn ExecutionMonitor,
) -> Result<DMatrix<f64>, LdaError> {
    let d = stats.n_predictors();

    (0..source.n_rows())
        .into_par_iter()
        .try_fold(
            || DMatrix::zeros(d, d),
            |mut acc, row| -> Result<DMatrix<f64>, LdaError> {
                check_cancelled(monitor)?;
                if let Some(v) = centered_row(source, stats, row)? {
                    acc.ger(1.0, &v, &v, 1.0);
                }
                Ok(acc)
            },
        )
        .try_reduce(|| DMatrix::zeros(d, d), |a, b| Ok(a + b))
}

fn between_class_scatter(
    stats: &ClassStatistics,
    global_mean: &DVector<f64>,
    monitor: &dyn ExecutionMonitor,
) -> Result<DMatrix<f64>, LdaError> {
    let d = stats.n_predictors();
    let n_classes = stats.class_count();
    let mut sb = DMatrix::zeros(d, d);

    for (i, (_, class)) in stats.iter().enumerate() {
        check_cancelled(monitor)?;
        report_row_progress(monitor, i, n_classes, "Calculating between-class scatter matrix");

        let v = class.vector() - global_mean;
        sb.ger(class.count() as f64, &v, &v, 1.0);
    }
    Ok(sb)
}
