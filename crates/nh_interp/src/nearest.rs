// crates/nh_interp/src/nearest.rs

//! 最近邻插值
//!
//! 返回与查询点最近的样本值；等距时取列表中先出现者。

use crate::interp::Sample;
use nh_foundation::error::{NhError, NhResult};
use nh_geo::geometry::Point3D;

/// 最近邻算子
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighbor;

impl NearestNeighbor {
    /// 在查询点求值
    pub fn interpolate(&self, samples: &[Sample], query: &Point3D) -> NhResult<f64> {
        let mut best: Option<(f64, f64)> = None;
        for s in samples {
            let dx = query.x - s.x;
            let dy = query.y - s.y;
            let d2 = dx * dx + dy * dy;
            match best {
                Some((bd2, _)) if d2 >= bd2 => {}
                _ => best = Some((d2, s.value)),
            }
        }
        best.map(|(_, v)| v)
            .ok_or_else(|| NhError::insufficient_data("nearest neighbor: no samples"))
    }
}
