//! # Linear Discriminant Analysis
//!
//! Supervised dimensionality reduction: finds the projection that maximizes the scatter
//! between class means relative to the scatter within classes, i.e. the leading
//! eigenvectors of `Sw⁻¹·Sb`.
//!
//! A fit reads its [`RowSource`] twice. The first pass accumulates class means, the second
//! pass builds the within-class scatter matrix from the rows centered by their class mean.
//! The resulting [`TransformationMatrix`] is immutable and can be stored as a
//! [`TransformationModel`] and applied to other tables with [`LdaApplier`].

mod apply;
pub mod eigen;
mod error;
pub mod scatter;
pub mod stats;
mod transform;

pub use apply::{AppliedTable, ApplyConfig, LdaApplier, LdaApplyBuilder};
pub use error::LdaError;
pub use transform::{project, project_rows, TransformationMatrix, TransformationModel};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::dense::RowSource;
use crate::utils::{check_cancelled, ExecutionMonitor, NoopMonitor};
use eigen::EigenPair;
use scatter::ScatterMatrices;
use stats::ClassStatistics;

/// Largest number of discriminant dimensions: `min(class_count - 1, predictor_count)`.
pub fn max_feasible_dimension(class_count: usize, predictor_count: usize) -> usize {
    class_count.saturating_sub(1).min(predictor_count)
}

/// Number of discriminant dimensions to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetDimension {
    /// Use [`max_feasible_dimension`].
    #[default]
    Auto,
    Fixed(usize),
}

/// Settings of an [`Lda`] fit.
///
/// # Fields
/// - `target_dim`: Number of dimensions of the transformation, or the maximum feasible one
/// - `fail_on_missing`: Fail on rows with missing predictor values instead of skipping them
/// - `parallel`: Accumulate the within-class scatter matrix on the rayon pool
///
/// Deserializes with defaults for absent fields, so a host can store partial settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LdaConfig {
    pub target_dim: TargetDimension,
    pub fail_on_missing: bool,
    /// Accumulate the within-class scatter matrix on the rayon pool.
    pub parallel: bool,
}

impl Default for LdaConfig {
    fn default() -> Self {
        Self {
            target_dim: TargetDimension::Auto,
            fail_on_missing: false,
            parallel: false,
        }
    }
}

/// Builder for [`Lda`] with a fluent interface.
///
/// Defaults: automatic target dimension, lenient missing value handling, sequential passes.
///
/// ```ignore
/// let lda = LdaBuilder::new().target_dim(2).fail_on_missing(true).build();
/// let fit = lda.compute_transformation(&rows)?;
/// ```
pub struct LdaBuilder {
    config: LdaConfig,
}

impl LdaBuilder {
    pub fn new() -> Self {
        LdaBuilder {
            config: LdaConfig::default(),
        }
    }

    /// Number of dimensions to reduce to. Defaults to the maximum feasible dimension.
    pub fn target_dim(mut self, k: usize) -> Self {
        self.config.target_dim = TargetDimension::Fixed(k);
        self
    }

    /// Keep `min(classes - 1, predictors)` dimensions.
    pub fn auto_dim(mut self) -> Self {
        self.config.target_dim = TargetDimension::Auto;
        self
    }

    /// Fail on rows with missing predictor values instead of skipping them.
    pub fn fail_on_missing(mut self, fail_on_missing: bool) -> Self {
        self.config.fail_on_missing = fail_on_missing;
        self
    }

    /// Build the within-class scatter matrix from per-thread partial sums.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn build(self) -> Lda {
        Lda::new(self.config)
    }
}

impl Default for LdaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear discriminant analysis over labeled rows.
///
/// Computes the `k×d` transformation whose rows are the leading eigenvectors of `Sw⁻¹·Sb`,
/// where `Sw` is the within-class and `Sb` the between-class scatter matrix.
///
/// # Errors
/// - [`LdaError::MissingClassLabel`], [`LdaError::MissingFeatureValue`]: invalid rows
/// - [`LdaError::DegenerateProblem`], [`LdaError::TargetDimensionTooHigh`],
///   [`LdaError::InsufficientClassSize`]: the data cannot support the requested dimension
/// - [`LdaError::SingularScatterMatrix`]: linearly dependent predictors
/// - [`LdaError::Cancelled`]: the monitor requested cancellation
pub struct Lda {
    config: LdaConfig,
}

impl Lda {
    pub fn new(config: LdaConfig) -> Self {
        Lda { config }
    }

    pub fn config(&self) -> &LdaConfig {
        &self.config
    }

    /// Fits the transformation without progress reporting or cancellation.
    pub fn compute_transformation<S: RowSource + ?Sized>(&self, source: &S) -> Result<LdaFit, LdaError> {
        self.compute_transformation_with_monitor(source, &NoopMonitor)
    }

    /// Fits the transformation.
    ///
    /// # Parameters
    /// - `source`: Rows to fit on; read twice, so it must return the same values on each pass
    /// - `monitor`: Receives per-row progress and is polled for cancellation
    ///
    /// # Returns
    /// - `Ok(LdaFit)`: The transformation with its diagnostics
    /// - `Err`: Nothing is returned unless every stage completed
    pub fn compute_transformation_with_monitor<S: RowSource + ?Sized>(
        &self,
        source: &S,
        monitor: &dyn ExecutionMonitor,
    ) -> Result<LdaFit, LdaError> {
        log::info!(
            "Computing LDA over {} rows and {} predictors",
            source.n_rows(),
            source.n_predictors()
        );

        let stats = ClassStatistics::accumulate(source, self.config.fail_on_missing, monitor)?;
        let max_dimension = stats.max_dimension();
        let k = stats.resolve_dimension(self.config.target_dim)?;

        let scatter = ScatterMatrices::compute(source, &stats, self.config.parallel, monitor)?;

        check_cancelled(monitor)?;
        let eigen = eigen::solve(scatter.within(), scatter.between())?;
        let (w, eigen_pairs) = eigen::select_components(eigen.pairs, k)?;

        log::info!(
            "LDA reduced {} predictors to {} of at most {} dimension(s) ({} classes)",
            stats.n_predictors(),
            k,
            max_dimension,
            stats.class_count()
        );

        let classes = stats
            .iter()
            .map(|(label, class)| ClassSummary {
                label: label.to_string(),
                count: class.count(),
                mean: class.vector().clone(),
            })
            .collect();

        Ok(LdaFit {
            transformation: TransformationMatrix::new(w),
            max_dimension,
            eigen_pairs,
            classes,
            within_scatter: scatter.scaled_within(),
            between_scatter: scatter.scaled_between(),
            discriminant: eigen.discriminant,
            n_samples: scatter.n_samples(),
            skipped_rows: stats.skipped_rows(),
        })
    }
}

/// Mean and size of one class, in the order classes were first seen.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSummary {
    pub label: String,
    pub count: usize,
    pub mean: DVector<f64>,
}

/// Result of [`Lda::compute_transformation`]: the transformation plus diagnostics.
#[derive(Debug, Clone)]
pub struct LdaFit {
    transformation: TransformationMatrix,
    max_dimension: usize,
    eigen_pairs: Vec<EigenPair>,
    classes: Vec<ClassSummary>,
    within_scatter: DMatrix<f64>,
    between_scatter: DMatrix<f64>,
    discriminant: DMatrix<f64>,
    n_samples: usize,
    skipped_rows: usize,
}

impl LdaFit {
    pub fn transformation(&self) -> &TransformationMatrix {
        &self.transformation
    }

    pub fn into_transformation(self) -> TransformationMatrix {
        self.transformation
    }

    /// Binds the transformation to the predictor column names it was computed on.
    pub fn into_model(self, columns: Vec<String>) -> Result<TransformationModel, LdaError> {
        TransformationModel::new(columns, self.transformation)
    }

    pub fn dimensions(&self) -> usize {
        self.transformation.dimensions()
    }

    pub fn max_dimension(&self) -> usize {
        self.max_dimension
    }

    /// All eigenvalues of `Sw⁻¹·Sb`, descending.
    pub fn eigenvalues(&self) -> Vec<f64> {
        self.eigen_pairs.iter().map(|p| p.value).collect()
    }

    /// The full eigen decomposition of `Sw⁻¹·Sb`, sorted by descending eigenvalue. The first
    /// [`dimensions`](Self::dimensions) vectors are the rows of the transformation.
    pub fn eigen_pairs(&self) -> &[EigenPair] {
        &self.eigen_pairs
    }

    pub fn classes(&self) -> &[ClassSummary] {
        &self.classes
    }

    /// Within-class scatter divided by the number of non-missing rows.
    pub fn within_scatter(&self) -> &DMatrix<f64> {
        &self.within_scatter
    }

    /// Between-class scatter divided by the number of non-missing rows.
    pub fn between_scatter(&self) -> &DMatrix<f64> {
        &self.between_scatter
    }

    /// `Sw⁻¹·Sb`
    pub fn discriminant(&self) -> &DMatrix<f64> {
        &self.discriminant
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    pub fn project_rows<S: RowSource + ?Sized>(
        &self,
        source: &S,
        fail_on_missing: bool,
    ) -> Result<Vec<Option<DVector<f64>>>, LdaError> {
        project_rows(&self.transformation, source, fail_on_missing, &NoopMonitor)
    }
}
