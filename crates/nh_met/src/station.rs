// crates/nh_met/src/station.rs

//! 点观测持有者
//!
//! 站点只持有当前时间步的变量值，每个模型时间步由气象协调器
//! 重新填充。真实站点来自 ascii 文件，虚拟站点来自格点单元，
//! 两者在这里不可区分。

use crate::error::MetError;
use indexmap::IndexMap;
use nh_geo::geometry::{Point2D, Point3D};

/// 站点
///
/// 位置已变换到网格参考系；变量映射只反映当前时间步，
/// 且在所有逐站过滤器运行之后。
#[derive(Debug, Clone)]
pub struct Station {
    id: String,
    position: Point3D,
    values: IndexMap<String, f64>,
}

impl Station {
    /// 创建站点
    #[must_use]
    pub fn new(id: impl Into<String>, position: Point3D) -> Self {
        Self {
            id: id.into(),
            position,
            values: IndexMap::new(),
        }
    }

    /// 站点标识（唯一）
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 网格参考系位置
    #[inline]
    #[must_use]
    pub fn position(&self) -> Point3D {
        self.position
    }

    /// 平面位置
    #[inline]
    #[must_use]
    pub fn xy(&self) -> Point2D {
        self.position.xy()
    }

    /// x 坐标
    #[inline]
    #[must_use]
    pub fn x(&self) -> f64 {
        self.position.x
    }

    /// y 坐标
    #[inline]
    #[must_use]
    pub fn y(&self) -> f64 {
        self.position.y
    }

    /// 高程
    #[inline]
    #[must_use]
    pub fn z(&self) -> f64 {
        self.position.z
    }

    /// 读取当前时间步的变量值
    ///
    /// # 错误
    ///
    /// 数据源不提供该变量时返回 `missing-variable`。
    pub fn get(&self, variable: &str) -> Result<f64, MetError> {
        self.values
            .get(variable)
            .copied()
            .ok_or_else(|| MetError::MissingVariable {
                station: self.id.clone(),
                variable: variable.to_string(),
            })
    }

    /// 是否携带该变量
    #[must_use]
    pub fn has(&self, variable: &str) -> bool {
        self.values.contains_key(variable)
    }

    /// 写入变量值（协调器与过滤器专用）
    pub fn set(&mut self, variable: impl Into<String>, value: f64) {
        self.values.insert(variable.into(), value);
    }

    /// 当前携带的变量名
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}
