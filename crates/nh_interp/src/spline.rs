// crates/nh_interp/src/spline.rs

//! 薄板样条插值
//!
//! 求解带线性漂移项的径向基插值系统：
//!
//! ```text
//! | K  P | |w|   |v|
//! | Pᵀ 0 | |a| = |0|
//! ```
//!
//! 其中 K_ij = φ(‖p_i − p_j‖)，φ(r) = r² ln r，P 的行为 [1, x, y]。
//! 样条严格通过样本点，是站点稀疏时的默认算法。

use crate::interp::Sample;
use nalgebra::{DMatrix, DVector};
use nh_foundation::error::{NhError, NhResult};
use nh_geo::geometry::Point3D;

/// 薄板样条算子
#[derive(Debug, Clone, Copy, Default)]
pub struct ThinPlateSpline;

/// 径向基核 φ(r) = r² ln r（r → 0 时取 0）
#[inline]
fn kernel(r2: f64) -> f64 {
    if r2 < 1e-24 {
        0.0
    } else {
        0.5 * r2 * r2.ln()
    }
}

impl ThinPlateSpline {
    /// 在查询点求值
    ///
    /// 少于 3 个样本时退化为反距离加权（系统欠定）；
    /// 系统奇异（共点样本等）时同样退化。
    pub fn interpolate(&self, samples: &[Sample], query: &Point3D) -> NhResult<f64> {
        let n = samples.len();
        if n == 0 {
            return Err(NhError::insufficient_data("thin plate spline: no samples"));
        }
        if n < 3 {
            return crate::idw::InverseDistance::default().interpolate(samples, query);
        }

        // 增广系统 (n+3) x (n+3)
        let dim = n + 3;
        let mut a = DMatrix::zeros(dim, dim);
        let mut b = DVector::zeros(dim);

        for i in 0..n {
            for j in 0..n {
                let dx = samples[i].x - samples[j].x;
                let dy = samples[i].y - samples[j].y;
                a[(i, j)] = kernel(dx * dx + dy * dy);
            }
            a[(i, n)] = 1.0;
            a[(i, n + 1)] = samples[i].x;
            a[(i, n + 2)] = samples[i].y;
            a[(n, i)] = 1.0;
            a[(n + 1, i)] = samples[i].x;
            a[(n + 2, i)] = samples[i].y;
            b[i] = samples[i].value;
        }

        let lu = a.lu();
        let solution = match lu.solve(&b) {
            Some(s) => s,
            None => {
                // 共线/共点样本使系统奇异
                log::warn!(
                    "thin plate spline system singular for {} samples, falling back to idw",
                    n
                );
                return crate::idw::InverseDistance::default().interpolate(samples, query);
            }
        };

        let mut value = solution[n] + solution[n + 1] * query.x + solution[n + 2] * query.y;
        for (i, s) in samples.iter().enumerate() {
            let dx = query.x - s.x;
            let dy = query.y - s.y;
            value += solution[i] * kernel(dx * dx + dy * dy);
        }

        if !value.is_finite() {
            return Err(NhError::internal(format!(
                "thin plate spline produced non-finite value at ({}, {})",
                query.x, query.y
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_samples() {
        let samples = vec![
            Sample::new(0.0, 0.0, 1.0),
            Sample::new(10.0, 0.0, 3.0),
            Sample::new(0.0, 10.0, 5.0),
            Sample::new(10.0, 10.0, 2.0),
        ];
        let tps = ThinPlateSpline;
        for s in &samples {
            let v = tps
                .interpolate(&samples, &Point3D::new(s.x, s.y, 0.0))
                .unwrap();
            assert!((v - s.value).abs() < 1e-8, "at ({},{}): {}", s.x, s.y, v);
        }
    }

    #[test]
    fn test_reproduces_linear_field() {
        // 薄板样条的漂移项应精确重现线性场
        let f = |x: f64, y: f64| 2.0 + 0.5 * x - 0.25 * y;
        let samples: Vec<Sample> = [
            (0.0, 0.0),
            (10.0, 0.0),
            (0.0, 10.0),
            (10.0, 10.0),
            (5.0, 3.0),
        ]
        .iter()
        .map(|&(x, y)| Sample::new(x, y, f(x, y)))
        .collect();

        let v = ThinPlateSpline
            .interpolate(&samples, &Point3D::new(4.0, 7.0, 0.0))
            .unwrap();
        assert!((v - f(4.0, 7.0)).abs() < 1e-8);
    }

    #[test]
    fn test_two_samples_falls_back() {
        let samples = vec![Sample::new(0.0, 0.0, 1.0), Sample::new(2.0, 0.0, 3.0)];
        let v = ThinPlateSpline
            .interpolate(&samples, &Point3D::new(1.0, 0.0, 0.0))
            .unwrap();
        assert!((v - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_coincident_samples_fall_back() {
        let samples = vec![Sample::new(1.0, 1.0, 4.0); 5];
        let v = ThinPlateSpline
            .interpolate(&samples, &Point3D::new(3.0, 3.0, 0.0))
            .unwrap();
        assert!((v - 4.0).abs() < 1e-9);
    }
}
