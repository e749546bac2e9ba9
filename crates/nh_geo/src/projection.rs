// crates/nh_geo/src/projection.rs

//! 网格参考系投影
//!
//! 气象后端以各自的原生坐标（通常为经纬度）提供站点位置，
//! 协调器在加载时将其重投影到网格参考系：
//!
//! - 地理网格：站点坐标保持度，下游距离用大圆公式
//! - 投影网格：正向投影到 UTM 平面（球面横轴墨卡托近似），
//!   下游距离用平面欧氏公式
//!
//! 投影失败（站点离中央经线过远）在加载阶段致命。

use crate::distance::DistanceMetric;
use crate::geometry::Point2D;
use nh_foundation::error::{NhError, NhResult};
use serde::{Deserialize, Serialize};

/// UTM 比例因子
const UTM_K0: f64 = 0.9996;

/// 球面地球半径（UTM 球面近似）[m]
const UTM_RADIUS: f64 = 6_378_137.0;

/// UTM 东伪偏移 [m]
const FALSE_EASTING: f64 = 500_000.0;

/// UTM 南半球北伪偏移 [m]
const FALSE_NORTHING: f64 = 10_000_000.0;

/// 网格参考系
///
/// 由网格文件声明；决定站点重投影方式与距离度量。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeshProjection {
    /// 地理坐标（经纬度，度）
    Geographic,
    /// UTM 投影带
    Utm {
        /// 带号 (1..=60)
        zone: u8,
        /// 是否南半球
        south: bool,
    },
}

impl MeshProjection {
    /// 该参考系下的距离度量
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        match self {
            Self::Geographic => DistanceMetric::GreatCircle,
            Self::Utm { .. } => DistanceMetric::Planar,
        }
    }

    /// 是否为地理网格
    #[must_use]
    pub fn is_geographic(&self) -> bool {
        matches!(self, Self::Geographic)
    }

    /// 将经纬度（度）站点位置变换到网格参考系
    ///
    /// 地理网格原样返回；UTM 网格执行球面横轴墨卡托正向投影。
    pub fn project(&self, lon: f64, lat: f64) -> NhResult<Point2D> {
        match *self {
            Self::Geographic => {
                if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
                    return Err(NhError::invalid_input(format!(
                        "station position out of range: lon={}, lat={}",
                        lon, lat
                    )));
                }
                Ok(Point2D::new(lon, lat))
            }
            Self::Utm { zone, south } => {
                if !(1..=60).contains(&zone) {
                    return Err(NhError::config(format!("invalid UTM zone {}", zone)));
                }
                let lon0 = f64::from(zone) * 6.0 - 183.0;
                let dlon = (lon - lon0).to_radians();
                let phi = lat.to_radians();

                let b = phi.cos() * dlon.sin();
                // 离中央经线过远时 atanh 发散，视为投影失败
                if b.abs() >= 0.999 {
                    return Err(NhError::invalid_input(format!(
                        "projection failure: lon={} too far from UTM zone {} central meridian {}",
                        lon, zone, lon0
                    )));
                }

                let x = UTM_K0 * UTM_RADIUS * b.atanh() + FALSE_EASTING;
                let mut y = UTM_K0 * UTM_RADIUS * (phi.tan() / dlon.cos()).atan();
                if south {
                    y += FALSE_NORTHING;
                }
                Ok(Point2D::new(x, y))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geographic_identity() {
        let p = MeshProjection::Geographic.project(-115.5, 50.8).unwrap();
        assert_eq!(p, Point2D::new(-115.5, 50.8));
        assert!(MeshProjection::Geographic.project(200.0, 0.0).is_err());
    }

    #[test]
    fn test_utm_central_meridian() {
        // 11 带中央经线 -117°；其上点的 x 应为伪偏移 500 km
        let proj = MeshProjection::Utm {
            zone: 11,
            south: false,
        };
        let p = proj.project(-117.0, 51.0).unwrap();
        assert!((p.x - FALSE_EASTING).abs() < 1e-6);
        assert!(p.y > 0.0);
    }

    #[test]
    fn test_utm_east_of_meridian() {
        let proj = MeshProjection::Utm {
            zone: 11,
            south: false,
        };
        let west = proj.project(-117.5, 51.0).unwrap();
        let east = proj.project(-116.5, 51.0).unwrap();
        assert!(east.x > FALSE_EASTING && west.x < FALSE_EASTING);
        // 纬度 51° 上经度 0.5° 约 35 km
        assert!((east.x - FALSE_EASTING - 35_000.0).abs() < 500.0);
    }

    #[test]
    fn test_utm_southern_hemisphere() {
        let north = MeshProjection::Utm {
            zone: 33,
            south: false,
        };
        let south = MeshProjection::Utm {
            zone: 33,
            south: true,
        };
        let pn = north.project(15.0, -30.0).unwrap();
        let ps = south.project(15.0, -30.0).unwrap();
        assert!((ps.y - pn.y - FALSE_NORTHING).abs() < 1e-6);
    }

    #[test]
    fn test_projection_failure_far_from_zone() {
        let proj = MeshProjection::Utm {
            zone: 11,
            south: false,
        };
        // 经度偏离中央经线近 90 度
        assert!(proj.project(-30.0, 0.1).is_err());
    }

    #[test]
    fn test_metric_selection() {
        assert_eq!(
            MeshProjection::Geographic.metric(),
            DistanceMetric::GreatCircle
        );
        let utm = MeshProjection::Utm {
            zone: 11,
            south: false,
        };
        assert_eq!(utm.metric(), DistanceMetric::Planar);
    }
}
