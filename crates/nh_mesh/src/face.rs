// crates/nh_mesh/src/face.rs

//! 三角面
//!
//! 面是携带状态的网格单元：不可变拓扑/几何 + 可变变量
//! （变量存储在引擎层，不在这里）。
//!
//! 几何量（面心、面积、坡度、坡向、法向量）在网格构造时
//! 从三个顶点一次性导出。

use nh_geo::geometry::Point3D;
use serde::{Deserialize, Serialize};

/// 面索引
///
/// 网格内按加载顺序稳定编号；邻居间互指通过索引表达，
/// 避免句柄之间的循环引用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaceId(pub usize);

impl std::fmt::Display for FaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "face {}", self.0)
    }
}

/// 植被属性
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VegAttributes {
    /// 冠层高度 [m]
    pub canopy_height: f64,
    /// 叶面积指数 [m²/m²]
    #[serde(default)]
    pub lai: f64,
}

/// 面的构造描述
///
/// 网格导入器（或测试）提供的原始数据；派生几何量由
/// [`Face::from_init`] 计算。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceInit {
    /// 三个顶点（逆时针）
    pub vertices: [Point3D; 3],
    /// 三个邻居槽位；`None` 表示域边界
    #[serde(default)]
    pub neighbors: [Option<usize>; 3],
    /// 分区网格中的 halo 面标志
    #[serde(default)]
    pub is_ghost: bool,
    /// 植被属性
    #[serde(default)]
    pub vegetation: Option<VegAttributes>,
}

/// 三角面
///
/// 拓扑与几何不可变；ghost 面提供只读 halo 状态，
/// 任何模块不得修改其可写变量。
#[derive(Debug, Clone)]
pub struct Face {
    id: FaceId,
    vertices: [Point3D; 3],
    centroid: Point3D,
    area: f64,
    slope: f64,
    azimuth: f64,
    normal: Point3D,
    neighbors: [Option<FaceId>; 3],
    is_ghost: bool,
    vegetation: Option<VegAttributes>,
}

impl Face {
    /// 从构造描述派生几何量
    pub(crate) fn from_init(id: FaceId, init: &FaceInit) -> Self {
        let [v0, v1, v2] = init.vertices;
        let centroid = Point3D::new(
            (v0.x + v1.x + v2.x) / 3.0,
            (v0.y + v1.y + v2.y) / 3.0,
            (v0.z + v1.z + v2.z) / 3.0,
        );
        let cross = (v1 - v0).cross(&(v2 - v0));
        let area = 0.5 * cross.norm();
        // 法向量取向上的一侧
        let normal = if cross.z < 0.0 {
            (-cross).normalized()
        } else {
            cross.normalized()
        };
        let slope = normal.z.clamp(-1.0, 1.0).acos();
        // 坡向：最陡下降方向的水平方位角（自北顺时针）
        let azimuth = if normal.x.abs() < 1e-15 && normal.y.abs() < 1e-15 {
            0.0
        } else {
            normal.x.atan2(normal.y)
        };

        Self {
            id,
            vertices: init.vertices,
            centroid,
            area,
            slope,
            azimuth,
            normal,
            neighbors: init.neighbors.map(|n| n.map(FaceId)),
            is_ghost: init.is_ghost,
            vegetation: init.vegetation,
        }
    }

    /// 面索引
    #[inline]
    #[must_use]
    pub fn id(&self) -> FaceId {
        self.id
    }

    /// 三个顶点
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[Point3D; 3] {
        &self.vertices
    }

    /// 面心（3D）
    #[inline]
    #[must_use]
    pub fn center(&self) -> Point3D {
        self.centroid
    }

    /// 面心 x
    #[inline]
    #[must_use]
    pub fn x(&self) -> f64 {
        self.centroid.x
    }

    /// 面心 y
    #[inline]
    #[must_use]
    pub fn y(&self) -> f64 {
        self.centroid.y
    }

    /// 面心高程
    #[inline]
    #[must_use]
    pub fn z(&self) -> f64 {
        self.centroid.z
    }

    /// 面积 [m²]
    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// 坡度 [rad]
    #[inline]
    #[must_use]
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// 坡向 [rad]，自北顺时针
    #[inline]
    #[must_use]
    pub fn azimuth(&self) -> f64 {
        self.azimuth
    }

    /// 单位外法向量
    #[inline]
    #[must_use]
    pub fn normal(&self) -> Point3D {
        self.normal
    }

    /// 邻居槽位 (0..3)；`None` 表示域边界
    #[inline]
    #[must_use]
    pub fn neighbor(&self, slot: usize) -> Option<FaceId> {
        self.neighbors.get(slot).copied().flatten()
    }

    /// 全部邻居槽位
    #[inline]
    #[must_use]
    pub fn neighbors(&self) -> &[Option<FaceId>; 3] {
        &self.neighbors
    }

    /// 是否为分区 halo 面
    #[inline]
    #[must_use]
    pub fn is_ghost(&self) -> bool {
        self.is_ghost
    }

    /// 植被属性探针
    #[inline]
    #[must_use]
    pub fn vegetation(&self) -> Option<&VegAttributes> {
        self.vegetation.as_ref()
    }

    /// 是否有植被
    #[inline]
    #[must_use]
    pub fn has_vegetation(&self) -> bool {
        self.vegetation.is_some()
    }
}
