pub mod dense;
pub mod dimred;
mod utils;

pub use dense::{DenseTable, LabeledSample, RowSource, SampleRows};
pub use dimred::lda::{Lda, LdaBuilder, LdaError, LdaFit, TransformationMatrix, TransformationModel};
pub use utils::CancellationToken;
pub use utils::ExecutionMonitor;
pub use utils::NoopMonitor;
