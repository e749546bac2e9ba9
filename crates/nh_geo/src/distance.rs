// crates/nh_geo/src/distance.rs

//! 距离度量
//!
//! 地理网格的站点坐标以度存储，距离使用大圆（haversine）公式；
//! 投影网格使用平面欧氏距离。度量由网格坐标系决定，
//! 对模块可见的站点集合在所选坐标系下封闭。

use crate::geometry::Point2D;
use serde::{Deserialize, Serialize};

/// 平均地球半径 [m]
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// 每纬度一度对应的弧长 [m]
pub const METERS_PER_DEG: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// 距离度量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// 平面欧氏距离（投影坐标，单位 m）
    #[default]
    Planar,
    /// 大圆距离（经纬度坐标，单位度；返回值单位 m）
    GreatCircle,
}

impl DistanceMetric {
    /// 获取度量名称
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Planar => "planar",
            Self::GreatCircle => "great_circle",
        }
    }

    /// 计算两点距离 [m]
    ///
    /// `Planar` 下直接取欧氏距离；`GreatCircle` 下 `a`、`b`
    /// 的 `x` 为经度、`y` 为纬度（度）。
    #[must_use]
    pub fn distance(&self, a: &Point2D, b: &Point2D) -> f64 {
        match self {
            Self::Planar => a.distance_to(b),
            Self::GreatCircle => haversine(a, b),
        }
    }
}

/// 大圆距离（haversine 公式）[m]
///
/// 输入为经纬度（度），`x` 为经度、`y` 为纬度。
#[must_use]
pub fn haversine(a: &Point2D, b: &Point2D) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let dlat = (b.y - a.y).to_radians();
    let dlon = (b.x - a.x).to_radians();

    let s = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * s.sqrt().min(1.0).asin()
}
