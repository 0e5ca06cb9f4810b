use std::collections::{HashMap, HashSet};

use nalgebra::DVector;

use super::{max_feasible_dimension, LdaError, TargetDimension};
use crate::dense::RowSource;
use crate::utils::{check_cancelled, report_row_progress, ExecutionMonitor};

/// Running sum and count of the feature vectors of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassStats {
    vec: DVector<f64>,
    count: usize,
    normalized: bool,
}

impl ClassStats {
    pub fn new(len: usize) -> Self {
        Self {
            vec: DVector::zeros(len),
            count: 0,
            normalized: false,
        }
    }

    pub fn add(&mut self, data: &DVector<f64>) {
        self.count += 1;
        self.vec += data;
    }

    /// Turns the sum into the class mean. Fails if called a second time.
    pub fn normalize(&mut self) -> Result<(), LdaError> {
        if self.normalized {
            return Err(LdaError::AlreadyNormalized);
        }
        if self.count > 0 {
            self.vec /= self.count as f64;
        }
        self.normalized = true;
        Ok(())
    }

    /// The running sum before [`normalize`](Self::normalize), the class mean after.
    pub fn vector(&self) -> &DVector<f64> {
        &self.vec
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }
}

/// Per-class statistics of one dataset, kept in the order classes were first seen.
#[derive(Debug, Clone)]
pub struct ClassStatistics {
    labels: Vec<String>,
    stats: Vec<ClassStats>,
    index: HashMap<String, usize>,
    empty_classes: Vec<String>,
    n_predictors: usize,
    skipped_rows: usize,
}

impl ClassStatistics {
    /// First pass over `source`: groups rows by label and computes class means.
    ///
    /// A missing label always fails. A row with missing predictor values fails under
    /// `fail_on_missing`, otherwise it is skipped and counted.
    pub fn accumulate<S: RowSource + ?Sized>(
        source: &S,
        fail_on_missing: bool,
        monitor: &dyn ExecutionMonitor,
    ) -> Result<Self, LdaError> {
        let n_rows = source.n_rows();
        let n_predictors = source.n_predictors();

        let mut labels: Vec<String> = Vec::new();
        let mut stats: Vec<ClassStats> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut seen: Vec<String> = Vec::new();
        let mut seen_set: HashSet<String> = HashSet::new();
        let mut skipped_rows = 0;

        for row in 0..n_rows {
            check_cancelled(monitor)?;
            report_row_progress(monitor, row, n_rows, "Calculating class statistics");

            let label = source
                .label(row)
                .ok_or(LdaError::MissingClassLabel { row })?;
            if !seen_set.contains(label) {
                seen_set.insert(label.to_string());
                seen.push(label.to_string());
            }

            let Some(features) = source.features(row) else {
                if fail_on_missing {
                    return Err(LdaError::MissingFeatureValue { row: Some(row) });
                }
                skipped_rows += 1;
                continue;
            };
            if features.len() != n_predictors {
                return Err(LdaError::DimensionMismatch {
                    expected: n_predictors,
                    found: features.len(),
                });
            }

            let idx = match index.get(label) {
                Some(&idx) => idx,
                None => {
                    labels.push(label.to_string());
                    stats.push(ClassStats::new(n_predictors));
                    index.insert(label.to_string(), stats.len() - 1);
                    stats.len() - 1
                }
            };
            stats[idx].add(&features);
        }

        for class in stats.iter_mut() {
            class.normalize()?;
        }

        let empty_classes = seen
            .into_iter()
            .filter(|label| !index.contains_key(label))
            .collect();

        if skipped_rows > 0 {
            log::warn!(
                "{} row(s) with missing predictor values were ignored",
                skipped_rows
            );
        }
        log::debug!(
            "Class statistics: {} classes over {} predictors ({} rows, {} skipped)",
            stats.len(),
            n_predictors,
            n_rows,
            skipped_rows
        );

        Ok(Self {
            labels,
            stats,
            index,
            empty_classes,
            n_predictors,
            skipped_rows,
        })
    }

    /// Number of classes with at least one usable row.
    pub fn class_count(&self) -> usize {
        self.stats.len()
    }

    pub fn n_predictors(&self) -> usize {
        self.n_predictors
    }

    /// Rows that were skipped because of missing predictor values.
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Number of rows that contributed to the statistics.
    pub fn total_count(&self) -> usize {
        self.stats.iter().map(ClassStats::count).sum()
    }

    /// Labels that appeared only on rows with missing predictor values.
    pub fn empty_classes(&self) -> &[String] {
        &self.empty_classes
    }

    pub fn get(&self, label: &str) -> Option<&ClassStats> {
        self.index.get(label).map(|&idx| &self.stats[idx])
    }

    /// Classes in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClassStats)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.stats.iter())
    }

    pub fn max_dimension(&self) -> usize {
        max_feasible_dimension(self.class_count(), self.n_predictors)
    }

    /// Validates the problem and resolves the number of dimensions to keep.
    pub fn resolve_dimension(&self, target: TargetDimension) -> Result<usize, LdaError> {
        let max = self.max_dimension();
        if max == 0 {
            return Err(LdaError::DegenerateProblem {
                class_count: self.class_count(),
                predictor_count: self.n_predictors,
                empty_classes: self.empty_classes.clone(),
            });
        }

        let k = match target {
            TargetDimension::Auto => max,
            TargetDimension::Fixed(0) => {
                return Err(LdaError::InvalidTargetDimension { requested: 0 })
            }
            TargetDimension::Fixed(k) if k > max => {
                return Err(LdaError::TargetDimensionTooHigh {
                    requested: k,
                    max,
                    class_count: self.class_count(),
                    predictor_count: self.n_predictors,
                })
            }
            TargetDimension::Fixed(k) => k,
        };

        for (label, class) in self.iter() {
            if class.count() < self.n_predictors {
                return Err(LdaError::InsufficientClassSize {
                    class: label.to_string(),
                    count: class.count(),
                    predictor_count: self.n_predictors,
                });
            }
        }
        Ok(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::{LabeledSample, SampleRows};
    use crate::utils::{CancellationToken, NoopMonitor};
    use approx::assert_relative_eq;

    fn missing(label: &str) -> LabeledSample {
        LabeledSample {
            features: None,
            label: Some(label.to_string()),
        }
    }

    #[test]
    fn test_class_stats_mean() {
        let mut stats = ClassStats::new(2);
        stats.add(&DVector::from_vec(vec![1.0, 2.0]));
        stats.add(&DVector::from_vec(vec![3.0, 6.0]));
        assert_eq!(stats.count(), 2);
        assert_eq!(stats.vector().as_slice(), &[4.0, 8.0]);

        stats.normalize().unwrap();
        assert_eq!(stats.vector().as_slice(), &[2.0, 4.0]);
        assert_eq!(stats.normalize(), Err(LdaError::AlreadyNormalized));
    }

    #[test]
    fn test_accumulate_keeps_first_seen_order() {
        let samples = vec![
            LabeledSample::new(&[1.0], "b"),
            LabeledSample::new(&[2.0], "a"),
            LabeledSample::new(&[3.0], "b"),
            LabeledSample::new(&[4.0], "c"),
        ];
        let stats =
            ClassStatistics::accumulate(&SampleRows::new(&samples, 1), true, &NoopMonitor).unwrap();

        let order: Vec<&str> = stats.iter().map(|(label, _)| label).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
        assert_relative_eq!(stats.get("b").unwrap().vector()[0], 2.0);
        assert_eq!(stats.get("b").unwrap().count(), 2);
        assert_eq!(stats.total_count(), 4);
        assert_eq!(stats.max_dimension(), 1);
    }

    #[test]
    fn test_missing_label_is_always_fatal() {
        let samples = vec![
            LabeledSample::new(&[1.0], "a"),
            LabeledSample {
                features: None,
                label: None,
            },
        ];
        for fail_on_missing in [true, false] {
            let err = ClassStatistics::accumulate(
                &SampleRows::new(&samples, 1),
                fail_on_missing,
                &NoopMonitor,
            )
            .unwrap_err();
            assert_eq!(err, LdaError::MissingClassLabel { row: 1 });
        }
    }

    #[test]
    fn test_missing_features_policy() {
        let samples = vec![
            LabeledSample::new(&[1.0], "a"),
            missing("a"),
            missing("z"),
            LabeledSample::new(&[2.0], "b"),
        ];
        let source = SampleRows::new(&samples, 1);

        let err = ClassStatistics::accumulate(&source, true, &NoopMonitor).unwrap_err();
        assert_eq!(err, LdaError::MissingFeatureValue { row: Some(1) });

        let stats = ClassStatistics::accumulate(&source, false, &NoopMonitor).unwrap();
        assert_eq!(stats.class_count(), 2);
        assert_eq!(stats.skipped_rows(), 2);
        assert_eq!(stats.empty_classes(), &["z".to_string()]);
    }

    #[test]
    fn test_resolve_dimension() {
        let samples = vec![
            LabeledSample::new(&[1.0, 0.0], "a"),
            LabeledSample::new(&[2.0, 1.0], "a"),
            LabeledSample::new(&[5.0, 4.0], "b"),
            LabeledSample::new(&[6.0, 3.0], "b"),
            LabeledSample::new(&[9.0, 9.0], "c"),
            LabeledSample::new(&[8.0, 7.0], "c"),
        ];
        let stats =
            ClassStatistics::accumulate(&SampleRows::new(&samples, 2), true, &NoopMonitor).unwrap();

        assert_eq!(stats.resolve_dimension(TargetDimension::Auto), Ok(2));
        assert_eq!(stats.resolve_dimension(TargetDimension::Fixed(1)), Ok(1));
        assert_eq!(
            stats.resolve_dimension(TargetDimension::Fixed(3)),
            Err(LdaError::TargetDimensionTooHigh {
                requested: 3,
                max: 2,
                class_count: 3,
                predictor_count: 2,
            })
        );
        assert_eq!(
            stats.resolve_dimension(TargetDimension::Fixed(0)),
            Err(LdaError::InvalidTargetDimension { requested: 0 })
        );
    }

    #[test]
    fn test_insufficient_class_size() {
        let samples = vec![
            LabeledSample::new(&[1.0, 0.0, 2.0], "a"),
            LabeledSample::new(&[2.0, 1.0, 2.5], "a"),
            LabeledSample::new(&[3.0, 1.0, 0.5], "a"),
            LabeledSample::new(&[5.0, 4.0, 1.0], "b"),
            LabeledSample::new(&[6.0, 3.0, 0.0], "b"),
        ];
        let stats =
            ClassStatistics::accumulate(&SampleRows::new(&samples, 3), true, &NoopMonitor).unwrap();

        assert_eq!(
            stats.resolve_dimension(TargetDimension::Auto),
            Err(LdaError::InsufficientClassSize {
                class: "b".to_string(),
                count: 2,
                predictor_count: 3,
            })
        );
    }

    #[test]
    fn test_class_size_boundary() {
        let mut samples = vec![
            LabeledSample::new(&[1.0, 0.0, 2.0], "a"),
            LabeledSample::new(&[2.0, 1.0, 2.5], "a"),
            LabeledSample::new(&[3.0, 1.0, 0.5], "a"),
            LabeledSample::new(&[5.0, 4.0, 1.0], "b"),
            LabeledSample::new(&[6.0, 3.0, 0.0], "b"),
            LabeledSample::new(&[7.0, 5.0, 1.5], "b"),
        ];
        // both classes hold exactly as many rows as there are predictors
        let stats =
            ClassStatistics::accumulate(&SampleRows::new(&samples, 3), true, &NoopMonitor).unwrap();
        assert_eq!(stats.resolve_dimension(TargetDimension::Auto), Ok(1));

        samples.pop();
        let stats =
            ClassStatistics::accumulate(&SampleRows::new(&samples, 3), true, &NoopMonitor).unwrap();
        assert_eq!(
            stats.resolve_dimension(TargetDimension::Auto),
            Err(LdaError::InsufficientClassSize {
                class: "b".to_string(),
                count: 2,
                predictor_count: 3,
            })
        );
    }

    #[test]
    fn test_single_class_is_degenerate() {
        let samples = vec![
            LabeledSample::new(&[1.0], "a"),
            LabeledSample::new(&[2.0], "a"),
            missing("b"),
        ];
        let stats =
            ClassStatistics::accumulate(&SampleRows::new(&samples, 1), false, &NoopMonitor).unwrap();

        assert_eq!(
            stats.resolve_dimension(TargetDimension::Auto),
            Err(LdaError::DegenerateProblem {
                class_count: 1,
                predictor_count: 1,
                empty_classes: vec!["b".to_string()],
            })
        );
    }

    #[test]
    fn test_wrong_feature_length() {
        let samples = vec![LabeledSample::new(&[1.0, 2.0], "a")];
        let err = ClassStatistics::accumulate(&SampleRows::new(&samples, 3), true, &NoopMonitor)
            .unwrap_err();
        assert_eq!(err, LdaError::DimensionMismatch { expected: 3, found: 2 });
    }

    #[test]
    fn test_cancelled_accumulation() {
        let samples = vec![LabeledSample::new(&[1.0], "a")];
        let token = CancellationToken::new();
        token.cancel();
        let err =
            ClassStatistics::accumulate(&SampleRows::new(&samples, 1), true, &token).unwrap_err();
        assert_eq!(err, LdaError::Cancelled);
    }
}
