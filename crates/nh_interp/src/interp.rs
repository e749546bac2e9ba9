// crates/nh_interp/src/interp.rs

//! 插值算子选择
//!
//! 每个实例类型是一个无状态算子：给定 `(x_i, y_i, v_i)` 样本列表
//! 与查询点 `(x, y, z)`，返回一个标量。`z` 对纯几何算子可见但
//! 不参与计算；垂直抬升是调用方的职责。

use crate::idw::InverseDistance;
use crate::nearest::NearestNeighbor;
use crate::spline::ThinPlateSpline;
use nh_foundation::error::{NhError, NhResult};
use nh_geo::geometry::Point3D;

/// 插值样本
///
/// 已抬升到公共参考面的站点值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// 站点 x
    pub x: f64,
    /// 站点 y
    pub y: f64,
    /// 抬升后的值
    pub value: f64,
}

impl Sample {
    /// 创建样本
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }
}

/// 插值算法
///
/// 由配置键 `interp_algorithm` 按名字选择。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpAlgorithm {
    /// 薄板样条
    #[default]
    Spline,
    /// 反距离加权
    Idw,
    /// 最近邻
    NearestNeighbor,
}

impl InterpAlgorithm {
    /// 按名字解析算法
    pub fn from_name(name: &str) -> NhResult<Self> {
        match name {
            "spline" => Ok(Self::Spline),
            "idw" => Ok(Self::Idw),
            "nn" => Ok(Self::NearestNeighbor),
            other => Err(NhError::config(format!(
                "unknown interp_algorithm '{}' (expected spline, idw, nn)",
                other
            ))),
        }
    }

    /// 算法名称
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Spline => "spline",
            Self::Idw => "idw",
            Self::NearestNeighbor => "nn",
        }
    }

    /// 执行插值
    ///
    /// # 错误
    ///
    /// 样本为空返回 `InsufficientData`；样条系统奇异时返回内部错误。
    pub fn interpolate(&self, samples: &[Sample], query: &Point3D) -> NhResult<f64> {
        if samples.is_empty() {
            return Err(NhError::insufficient_data(format!(
                "no samples for interpolation at ({}, {})",
                query.x, query.y
            )));
        }
        match self {
            Self::Spline => ThinPlateSpline.interpolate(samples, query),
            Self::Idw => InverseDistance::default().interpolate(samples, query),
            Self::NearestNeighbor => NearestNeighbor.interpolate(samples, query),
        }
    }
}
