// crates/nh_geo/src/lib.rs

//! NivaHydro 几何层
//!
//! 提供项目统一的几何抽象：
//!
//! - [`geometry`]: 2D/3D 点类型
//! - [`distance`]: 平面欧氏与大圆距离度量
//! - [`kdtree`]: 站点空间索引（静态 2-D k-d 树，滑动中点分割）
//! - [`projection`]: 站点坐标到网格参考系的正向投影
//!
//! 地理网格的坐标以度存储，其下游距离计算使用大圆距离；
//! 投影网格使用平面欧氏距离。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distance;
pub mod geometry;
pub mod kdtree;
pub mod projection;

pub use distance::DistanceMetric;
pub use geometry::{Point2D, Point3D};
pub use kdtree::StationKdTree;
pub use projection::MeshProjection;
