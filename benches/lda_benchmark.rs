use criterion::measurement::Measurement;
use criterion::{criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::distr::{Distribution, Uniform};
use rand::{rngs::StdRng, SeedableRng};
use single_lda::dimred::lda::LdaApplyBuilder;
use single_lda::{DenseTable, LdaBuilder};
use std::time::Duration;

#[derive(Clone)]
pub struct LdaBenchConfig {
    seed: u64,
    /// (rows, predictors, classes)
    problem_sizes: Vec<(usize, usize, usize)>,
    measurement_time: u64,
    sample_size: usize,
}

impl Default for LdaBenchConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            problem_sizes: vec![(1000, 10, 3), (10000, 20, 5), (50000, 50, 10), (100000, 100, 20)],
            measurement_time: 10,
            sample_size: 10,
        }
    }
}

struct Problem {
    table: DenseTable,
    predictors: Vec<String>,
    labels: Vec<Option<String>>,
}

/// Uniform noise around one random center per class.
fn create_problem(rows: usize, cols: usize, classes: usize, seed: u64) -> Problem {
    let mut rng = StdRng::seed_from_u64(seed);
    let center_dist = Uniform::try_from(-5.0..5.0).unwrap();
    let noise_dist = Uniform::try_from(-1.0..1.0).unwrap();

    let centers: Vec<Vec<f64>> = (0..classes)
        .map(|_| (0..cols).map(|_| center_dist.sample(&mut rng)).collect())
        .collect();

    let mut data = Array2::zeros((rows, cols));
    let mut labels = Vec::with_capacity(rows);
    for i in 0..rows {
        let class = i % classes;
        for j in 0..cols {
            data[[i, j]] = centers[class][j] + noise_dist.sample(&mut rng);
        }
        labels.push(Some(format!("class_{}", class)));
    }

    let predictors: Vec<String> = (0..cols).map(|j| format!("feature_{}", j)).collect();
    Problem {
        table: DenseTable::new(predictors.clone(), data).unwrap(),
        predictors,
        labels,
    }
}

fn configure_group<'a, M: Measurement>(
    c: &'a mut Criterion<M>,
    name: &str,
    config: &LdaBenchConfig,
) -> BenchmarkGroup<'a, M> {
    let mut group = c.benchmark_group(name);
    group.measurement_time(Duration::from_secs(config.measurement_time));
    group.sample_size(config.sample_size);
    group
}

pub fn bench_lda_fit(c: &mut Criterion) {
    let config = LdaBenchConfig::default();
    let mut group = configure_group(c, "LDA_Fit", &config);

    for &(rows, cols, classes) in config.problem_sizes.iter() {
        let problem = create_problem(rows, cols, classes, config.seed + (rows * cols) as u64);
        let source = problem.table.labeled(&problem.predictors, &problem.labels).unwrap();
        let id = format!("{}x{}_c{}", rows, cols, classes);

        group.bench_with_input(BenchmarkId::new("sequential", &id), &source, |b, source| {
            let lda = LdaBuilder::new().build();
            b.iter(|| lda.compute_transformation(source).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("parallel", &id), &source, |b, source| {
            let lda = LdaBuilder::new().parallel(true).build();
            b.iter(|| lda.compute_transformation(source).unwrap());
        });
    }
    group.finish();
}

pub fn bench_lda_apply(c: &mut Criterion) {
    let config = LdaBenchConfig::default();
    let mut group = configure_group(c, "LDA_Apply", &config);

    for &(rows, cols, classes) in config.problem_sizes.iter() {
        let problem = create_problem(rows, cols, classes, config.seed + (rows * cols) as u64);
        let source = problem.table.labeled(&problem.predictors, &problem.labels).unwrap();
        let model = LdaBuilder::new()
            .build()
            .compute_transformation(&source)
            .unwrap()
            .into_model(problem.predictors.clone())
            .unwrap();
        let applier = LdaApplyBuilder::new().build();

        group.bench_with_input(
            BenchmarkId::new("apply", format!("{}x{}_c{}", rows, cols, classes)),
            &problem.table,
            |b, table| {
                b.iter(|| applier.apply(&model, table).unwrap());
            },
        );
    }
    group.finish();
}

criterion_group!(lda_benches, bench_lda_fit, bench_lda_apply);
criterion_main!(lda_benches);
