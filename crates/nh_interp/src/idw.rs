// crates/nh_interp/src/idw.rs

//! 反距离加权插值
//!
//! 权重 w_i = 1/d_i^p，默认距离指数 p = 2。查询点与某样本重合时
//! 直接返回该样本值。

use crate::interp::Sample;
use nh_foundation::error::{NhError, NhResult};
use nh_geo::geometry::Point3D;

/// 重合判定距离平方
const EXACT_HIT_EPS2: f64 = 1e-20;

/// 反距离加权算子
#[derive(Debug, Clone, Copy)]
pub struct InverseDistance {
    /// 距离指数
    pub power: f64,
}

impl Default for InverseDistance {
    fn default() -> Self {
        Self { power: 2.0 }
    }
}

impl InverseDistance {
    /// 指定距离指数创建
    #[must_use]
    pub fn with_power(power: f64) -> Self {
        Self { power }
    }

    /// 在查询点求值
    pub fn interpolate(&self, samples: &[Sample], query: &Point3D) -> NhResult<f64> {
        if samples.is_empty() {
            return Err(NhError::insufficient_data("idw: no samples"));
        }

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for s in samples {
            let dx = query.x - s.x;
            let dy = query.y - s.y;
            let d2 = dx * dx + dy * dy;
            if d2 < EXACT_HIT_EPS2 {
                return Ok(s.value);
            }
            let w = 1.0 / d2.sqrt().powf(self.power);
            numerator += w * s.value;
            denominator += w;
        }

        if denominator <= 0.0 || !denominator.is_finite() {
            return Err(NhError::internal("idw: degenerate weight sum"));
        }
        Ok(numerator / denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_hit() {
        let samples = vec![Sample::new(1.0, 2.0, 9.0), Sample::new(5.0, 5.0, 1.0)];
        let v = InverseDistance::default()
            .interpolate(&samples, &Point3D::new(1.0, 2.0, 0.0))
            .unwrap();
        assert_eq!(v, 9.0);
    }

    #[test]
    fn test_midpoint_average() {
        let samples = vec![Sample::new(0.0, 0.0, 0.0), Sample::new(2.0, 0.0, 10.0)];
        let v = InverseDistance::default()
            .interpolate(&samples, &Point3D::new(1.0, 0.0, 0.0))
            .unwrap();
        assert!((v - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_weight_decay() {
        // 离查询点近的样本权重更大
        let samples = vec![Sample::new(1.0, 0.0, 10.0), Sample::new(9.0, 0.0, 0.0)];
        let v = InverseDistance::default()
            .interpolate(&samples, &Point3D::new(2.0, 0.0, 0.0))
            .unwrap();
        assert!(v > 5.0);
    }

    #[test]
    fn test_power_parameter() {
        let samples = vec![Sample::new(1.0, 0.0, 10.0), Sample::new(9.0, 0.0, 0.0)];
        let q = Point3D::new(2.0, 0.0, 0.0);
        let p2 = InverseDistance::with_power(2.0)
            .interpolate(&samples, &q)
            .unwrap();
        let p4 = InverseDistance::with_power(4.0)
            .interpolate(&samples, &q)
            .unwrap();
        // 更高的指数让近样本更占优
        assert!(p4 > p2);
    }
}
