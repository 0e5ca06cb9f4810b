//! # Dimensionality Reduction
//!
//! Supervised reduction of labeled data onto the axes that best separate its classes.
//!
//! ## Currently Available
//! - **LDA** ([`lda`]): Linear Discriminant Analysis, fitting a `k×d` projection from
//!   labeled rows and applying it to new tables
//!
//! ## Algorithm Selection Guide
//! - Use **LDA** when class labels are known and the reduced space should keep the classes apart
//! - The number of dimensions is bounded by `min(classes - 1, predictors)`

pub mod lda;
