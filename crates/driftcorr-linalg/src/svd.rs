//! Double precision 3×3 Singular Value Decomposition (SVD).
//!
//! For any matrix A ∈ ℝ³ˣ³ the decomposition is
//!
//! ```text
//! A = U Σ Vᵀ
//! ```
//!
//! where U and V are orthogonal and Σ holds the singular values sorted so that
//! σ₁ ≥ σ₂ ≥ σ₃ ≥ 0.
//!
//! # Implementation Details
//!
//! * V is obtained from the eigenvectors of AᵀA with cyclic Jacobi rotations.
//! * B = A V is sorted by decreasing column norm.
//! * U comes from a QR decomposition of B using Givens rotations, which keeps
//!   U orthogonal even when A is rank deficient.
//!
//! # Example
//!
//! ```
//! use glam::{DMat3, DVec3};
//! use driftcorr_linalg::svd::svd3;
//!
//! let matrix = DMat3::from_diagonal(DVec3::new(1.0, 2.0, 3.0));
//!
//! let svd_result = svd3(&matrix);
//! assert!((svd_result.s().x - 3.0).abs() < 1e-12);
//! ```
//!
//! # References
//!
//! * McAdams, Selle, Tamstorf, Teran, and Sifakis (2011).
//!   "Computing the Singular Value Decomposition of 3x3 matrices with minimal
//!   branching and elementary floating point operations."
//!   University of Wisconsin-Madison Technical Report TR1690.
//! * Press et al. "Numerical Recipes", §11.1 (Jacobi transformations).

use glam::{DMat3, DVec3};

/// Upper bound on the number of Jacobi sweeps. Three-by-three symmetric
/// matrices converge to machine precision in well under ten.
const MAX_SWEEPS: usize = 16;

type Rows = [[f64; 3]; 3];

const IDENTITY_ROWS: Rows = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// The three factors of a 3×3 singular value decomposition.
#[derive(Debug, Clone)]
pub struct SVD3Set {
    /// The matrix of left singular vectors.
    u: DMat3,

    /// The singular values, sorted in decreasing order.
    s: DVec3,

    /// The matrix of right singular vectors.
    v: DMat3,
}

impl SVD3Set {
    /// Get the left singular vectors matrix.
    #[inline]
    pub fn u(&self) -> &DMat3 {
        &self.u
    }

    /// Get the singular values in decreasing order.
    #[inline]
    pub fn s(&self) -> &DVec3 {
        &self.s
    }

    /// Get the singular values as a diagonal matrix.
    #[inline]
    pub fn s_mat(&self) -> DMat3 {
        DMat3::from_diagonal(self.s)
    }

    /// Get the right singular vectors matrix.
    #[inline]
    pub fn v(&self) -> &DMat3 {
        &self.v
    }
}

#[inline]
fn to_rows(m: &DMat3) -> Rows {
    m.transpose().to_cols_array_2d()
}

#[inline]
fn from_rows(rows: &Rows) -> DMat3 {
    DMat3::from_cols_array_2d(rows).transpose()
}

/// Applies one Jacobi rotation in the (p, q) plane so that `s[p][q]` vanishes.
///
/// `s` is replaced by Jᵀ S J and `v` by V J.
fn jacobi_rotate(s: &mut Rows, v: &mut Rows, p: usize, q: usize) {
    let s_pq = s[p][q];
    if s_pq.abs() < f64::MIN_POSITIVE {
        return;
    }

    let theta = (s[q][q] - s[p][p]) / (2.0 * s_pq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let cos_theta = 1.0 / (t * t + 1.0).sqrt();
    let sin_theta = t * cos_theta;

    // S J
    for row in s.iter_mut() {
        let (a, b) = (row[p], row[q]);
        row[p] = cos_theta * a - sin_theta * b;
        row[q] = sin_theta * a + cos_theta * b;
    }

    // Jᵀ (S J)
    for k in 0..3 {
        let (a, b) = (s[p][k], s[q][k]);
        s[p][k] = cos_theta * a - sin_theta * b;
        s[q][k] = sin_theta * a + cos_theta * b;
    }
    s[p][q] = 0.0;
    s[q][p] = 0.0;

    // V J
    for row in v.iter_mut() {
        let (a, b) = (row[p], row[q]);
        row[p] = cos_theta * a - sin_theta * b;
        row[q] = sin_theta * a + cos_theta * b;
    }
}

/// Eigenvectors (as columns) of a symmetric matrix.
fn jacobi_eigenanalysis(mut s: Rows) -> Rows {
    let mut v = IDENTITY_ROWS;
    for _ in 0..MAX_SWEEPS {
        let off_diag_norm_sq = s[0][1] * s[0][1] + s[0][2] * s[0][2] + s[1][2] * s[1][2];
        let diag_norm_sq = s[0][0] * s[0][0] + s[1][1] * s[1][1] + s[2][2] * s[2][2];
        if off_diag_norm_sq <= f64::EPSILON * f64::EPSILON * diag_norm_sq
            || off_diag_norm_sq < f64::MIN_POSITIVE
        {
            break;
        }

        jacobi_rotate(&mut s, &mut v, 0, 1);
        jacobi_rotate(&mut s, &mut v, 0, 2);
        jacobi_rotate(&mut s, &mut v, 1, 2);
    }
    v
}

/// Cosine and sine of the rotation that zeroes `b` against `a`.
#[inline]
fn givens(a: f64, b: f64) -> (f64, f64) {
    let rho = a.hypot(b);
    if rho < f64::MIN_POSITIVE {
        (1.0, 0.0)
    } else {
        (a / rho, b / rho)
    }
}

/// QR decomposition of a 3×3 matrix using Givens rotations.
///
/// Returns Q and the row-major upper triangular R.
fn qr_decomposition(b: &DMat3) -> (DMat3, Rows) {
    let mut r = to_rows(b);
    let mut q = IDENTITY_ROWS;

    // (pivot row, eliminated row, column)
    for (p, k, col) in [(0, 1, 0), (0, 2, 0), (1, 2, 1)] {
        let (c, s) = givens(r[p][col], r[k][col]);

        for j in 0..3 {
            let (rp, rk) = (r[p][j], r[k][j]);
            r[p][j] = c * rp + s * rk;
            r[k][j] = -s * rp + c * rk;
        }

        // Q = Q Gᵀ
        for row in q.iter_mut() {
            let (qp, qk) = (row[p], row[k]);
            row[p] = c * qp + s * qk;
            row[k] = -s * qp + c * qk;
        }
    }

    (from_rows(&q), r)
}

/// Computes the singular value decomposition of a 3×3 matrix.
pub fn svd3(a: &DMat3) -> SVD3Set {
    // right singular vectors are the eigenvectors of AᵀA
    let v = from_rows(&jacobi_eigenanalysis(to_rows(&(a.transpose() * *a))));
    let b = *a * v;

    // sort the columns of B (and V) by decreasing norm
    let b_cols = [b.x_axis, b.y_axis, b.z_axis];
    let v_cols = [v.x_axis, v.y_axis, v.z_axis];
    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| {
        b_cols[j]
            .length_squared()
            .total_cmp(&b_cols[i].length_squared())
    });
    let b = DMat3::from_cols(b_cols[order[0]], b_cols[order[1]], b_cols[order[2]]);
    let v = DMat3::from_cols(v_cols[order[0]], v_cols[order[1]], v_cols[order[2]]);

    let (q, r) = qr_decomposition(&b);

    // force non-negative singular values by flipping the matching column of U
    let mut u_cols = [q.x_axis, q.y_axis, q.z_axis];
    let mut s = DVec3::new(r[0][0], r[1][1], r[2][2]);
    for (i, u_col) in u_cols.iter_mut().enumerate() {
        if s[i] < 0.0 {
            s[i] = -s[i];
            *u_col = -*u_col;
        }
    }

    SVD3Set {
        u: DMat3::from_cols(u_cols[0], u_cols[1], u_cols[2]),
        s,
        v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    /// Checks reconstruction, orthogonality and ordering of a decomposition.
    fn verify_svd_properties(a: &DMat3, svd: &SVD3Set) {
        let u = *svd.u();
        let v = *svd.v();
        let s = *svd.s();

        let reconstruction = u * svd.s_mat() * v.transpose();
        assert!(
            a.abs_diff_eq(reconstruction, EPSILON),
            "Reconstruction failed: A != U*S*V.T\nA:\n{}\nReconstruction:\n{}",
            a,
            reconstruction
        );

        let u_t_u = u.transpose() * u;
        assert!(
            DMat3::IDENTITY.abs_diff_eq(u_t_u, EPSILON),
            "U is not orthogonal: U.T*U != I\nU.T*U:\n{}",
            u_t_u
        );

        let v_t_v = v.transpose() * v;
        assert!(
            DMat3::IDENTITY.abs_diff_eq(v_t_v, EPSILON),
            "V is not orthogonal: V.T*V != I\nV.T*V:\n{}",
            v_t_v
        );

        assert!(
            s.x >= 0.0 && s.y >= 0.0 && s.z >= 0.0,
            "Singular values are not non-negative: {:?}",
            s
        );
        assert!(
            s.x >= s.y - EPSILON && s.y >= s.z - EPSILON,
            "Singular values are not sorted: {:?}",
            s
        );
    }

    #[test]
    fn test_svd3_diagonal_sorted() {
        let a = DMat3::from_diagonal(DVec3::new(3.0, 2.0, 1.0));
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result);
        assert!(svd_result.s().abs_diff_eq(DVec3::new(3.0, 2.0, 1.0), EPSILON));
    }

    #[test]
    fn test_svd3_diagonal_unsorted() {
        let a = DMat3::from_diagonal(DVec3::new(2.0, 3.0, 1.0));
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result);
        assert!(svd_result.s().abs_diff_eq(DVec3::new(3.0, 2.0, 1.0), EPSILON));
    }

    #[test]
    fn test_svd3_zero() {
        let a = DMat3::ZERO;
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result);
        assert!(svd_result.s().abs_diff_eq(DVec3::ZERO, EPSILON));
    }

    #[test]
    fn test_svd3_identity() {
        let a = DMat3::IDENTITY;
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result);
        assert!(svd_result.s().abs_diff_eq(DVec3::ONE, EPSILON));
    }

    #[test]
    fn test_svd3_singular_rank1() {
        let a = DMat3::from_cols(
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(2.0, 4.0, 6.0),
            DVec3::new(3.0, 6.0, 9.0),
        );
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result);

        let s = svd_result.s();
        assert!(s.x > EPSILON);
        assert!(s.y.abs() < 1e-7);
        assert!(s.z.abs() < 1e-7);
    }

    #[test]
    fn test_svd3_singular_rank2() {
        let a = DMat3::from_cols(
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(4.0, 5.0, 6.0),
            DVec3::new(5.0, 7.0, 9.0), // c0 + c1
        );
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result);

        let s = svd_result.s();
        assert!(s.x > EPSILON);
        assert!(s.y > EPSILON);
        assert!(s.z.abs() < 1e-7);
    }

    #[test]
    fn test_svd3_rotation_matrix() {
        let a = DMat3::from_rotation_y(std::f64::consts::FRAC_PI_4);
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result);
        assert!(svd_result.s().abs_diff_eq(DVec3::ONE, EPSILON));
    }

    #[test]
    fn test_svd3_reflection_matrix() {
        let a = DMat3::from_diagonal(DVec3::new(1.0, -1.0, 1.0));
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result);
        assert!(svd_result.s().abs_diff_eq(DVec3::ONE, EPSILON));
    }

    #[test]
    fn test_svd3_general_full_rank() {
        let a = DMat3::from_cols(
            DVec3::new(1.0, 4.0, 7.0),
            DVec3::new(2.0, 5.0, 8.0),
            DVec3::new(3.0, 6.0, 10.0),
        );
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result);
        assert!(svd_result.s().min_element() > EPSILON);
    }

    #[test]
    fn test_svd3_random() {
        for _ in 0..100 {
            let a = DMat3::from_cols_array(&std::array::from_fn(|_| {
                rand::random::<f64>() * 2.0 - 1.0
            }));
            let svd_result = svd3(&a);
            verify_svd_properties(&a, &svd_result);
        }
    }
}
