//! Generalized eigenproblem `Sb·v = λ·Sw·v` and selection of the leading eigenvectors.

use std::cmp::Ordering;

use nalgebra::{DMatrix, DVector};

use super::LdaError;

/// Pivot threshold of the LU invertibility test, applied to `Sw` after scaling it to a unit
/// diagonal.
pub const SINGULARITY_TOLERANCE: f64 = 1e-11;

#[derive(Debug, Clone, PartialEq)]
pub struct EigenPair {
    pub value: f64,
    /// Unit Euclidean norm.
    pub vector: DVector<f64>,
}

#[derive(Debug, Clone)]
pub struct GeneralizedEigen {
    /// `Sw⁻¹·Sb`
    pub discriminant: DMatrix<f64>,
    /// One pair per predictor, in solver order.
    pub pairs: Vec<EigenPair>,
}

/// LU based invertibility test, independent of the scale of each predictor.
///
/// `Sw` is equilibrated to `D^-1/2·Sw·D^-1/2` with `D = diag(Sw)` before its pivots are
/// compared against [`SINGULARITY_TOLERANCE`]. A non-positive or non-finite diagonal entry
/// (a constant predictor) makes the matrix singular.
pub fn is_singular(m: &DMatrix<f64>) -> bool {
    if !m.is_square() {
        return true;
    }
    if m.diagonal().iter().any(|&d| d <= 0.0 || !d.is_finite()) {
        return true;
    }
    let inv_sqrt = m.diagonal().map(|d| 1.0 / d.sqrt());
    let equilibrated = DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| {
        m[(i, j)] * inv_sqrt[i] * inv_sqrt[j]
    });
    let u = equilibrated.lu().u();
    u.diagonal()
        .iter()
        .any(|pivot| !pivot.is_finite() || pivot.abs() <= SINGULARITY_TOLERANCE)
}

/// Eigenpairs of `Sw⁻¹·Sb`.
///
/// `Sw` is symmetric positive definite once it passed the invertibility test, so the problem
/// is reduced to the symmetric matrix `L⁻¹·Sb·L⁻ᵀ` with `Sw = L·Lᵀ`. Its eigenvectors `y`
/// map back to eigenvectors `L⁻ᵀ·y` of `Sw⁻¹·Sb` with the same eigenvalues.
pub fn solve(sw: &DMatrix<f64>, sb: &DMatrix<f64>) -> Result<GeneralizedEigen, LdaError> {
    if sw.shape() != sb.shape() {
        return Err(LdaError::DimensionMismatch {
            expected: sw.nrows(),
            found: sb.nrows(),
        });
    }
    if is_singular(sw) {
        return Err(LdaError::SingularScatterMatrix);
    }

    let sw_inv = sw
        .clone()
        .lu()
        .try_inverse()
        .ok_or(LdaError::SingularScatterMatrix)?;
    let discriminant = &sw_inv * sb;

    let l = sw
        .clone()
        .cholesky()
        .ok_or(LdaError::SingularScatterMatrix)?
        .l();
    let half = l
        .solve_lower_triangular(sb)
        .ok_or(LdaError::SingularScatterMatrix)?;
    let reduced = l
        .solve_lower_triangular(&half.transpose())
        .ok_or(LdaError::SingularScatterMatrix)?;
    let reduced = (&reduced + reduced.transpose()) * 0.5;

    let eigen = reduced.symmetric_eigen();
    let mut pairs = Vec::with_capacity(eigen.eigenvalues.len());
    for (i, &value) in eigen.eigenvalues.iter().enumerate() {
        let y = eigen.eigenvectors.column(i).into_owned();
        let mut vector = l
            .tr_solve_lower_triangular(&y)
            .ok_or(LdaError::SingularScatterMatrix)?;
        let norm = vector.norm();
        if norm > 0.0 {
            vector /= norm;
        }
        pairs.push(EigenPair { value, vector });
    }

    log::debug!(
        "Eigenvalues of the discriminant matrix: {:?}",
        pairs.iter().map(|p| p.value).collect::<Vec<_>>()
    );

    Ok(GeneralizedEigen {
        discriminant,
        pairs,
    })
}

/// Sorts `pairs` by descending eigenvalue, keeping solver order among equal values, and
/// stacks the first `k` eigenvectors as rows of a `k×d` matrix.
///
/// Returns the matrix and all pairs in sorted order.
pub fn select_components(
    mut pairs: Vec<EigenPair>,
    k: usize,
) -> Result<(DMatrix<f64>, Vec<EigenPair>), LdaError> {
    if k > pairs.len() {
        return Err(LdaError::DimensionMismatch {
            expected: k,
            found: pairs.len(),
        });
    }
    let d = pairs.first().map_or(0, |p| p.vector.len());

    pairs.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));

    let w = DMatrix::from_fn(k, d, |i, j| pairs[i].vector[j]);
    Ok((w, pairs))
}
