// crates/nh_modules/src/interp_met/dist_met.rs

//! 通用气象变量分布
//!
//! 把一个气象变量不做垂直订正地分布到每个面（搜索半径内的
//! 站点、选定的插值算法）。按变量参数化：实例名为
//! `dist_met.<变量>`，同一配置可以挂多个实例。
//!
//! **Depends from met:** `<变量>`
//!
//! **Provides:** `<变量>`
//!
//! **Configuration keys:**
//! - `variable`: 被分布的变量名（必需）
//! - `allow_nodata`: 无可用站点时写缺测哨兵而不是报错（默认 false）

use nh_engine::{FaceWrites, Module, Parallelism, TickInfo};
use nh_foundation::config::ConfigTree;
use nh_foundation::constants::{is_nodata, NODATA};
use nh_foundation::error::{NhError, NhResult};
use nh_interp::interp::Sample;
use nh_mesh::Face;

/// 通用分布模块
pub struct DistMet {
    name: String,
    variable: String,
    provides: Vec<String>,
    depends_met: Vec<String>,
    allow_nodata: bool,
}

impl DistMet {
    /// 从配置构造；实例名由变量名导出
    pub fn from_config(cfg: &ConfigTree) -> NhResult<Self> {
        let variable: String = cfg.get_required("variable")?;
        if variable.is_empty() {
            return Err(NhError::config("dist_met: empty variable name"));
        }
        Ok(Self {
            name: format!("dist_met.{}", variable),
            provides: vec![variable.clone()],
            depends_met: vec![variable.clone()],
            allow_nodata: cfg.get("allow_nodata", false),
            variable,
        })
    }
}

impl Module for DistMet {
    fn name(&self) -> &str {
        &self.name
    }

    fn parallelism(&self) -> Parallelism {
        Parallelism::Data
    }

    fn provides(&self) -> &[String] {
        &self.provides
    }

    fn depends_from_met(&self) -> &[String] {
        &self.depends_met
    }

    fn run_face(
        &self,
        face: &Face,
        _store: &nh_engine::FaceStore,
        tick: &TickInfo,
        out: &mut FaceWrites,
    ) -> NhResult<()> {
        let mut samples = Vec::new();
        for s in tick
            .met
            .stations_in_radius(face.x(), face.y(), tick.engine.station_search_radius)
        {
            let v = s.get(&self.variable).map_err(NhError::from)?;
            if !v.is_finite() || is_nodata(v) {
                continue;
            }
            samples.push(Sample::new(s.x(), s.y(), v));
        }

        if samples.is_empty() {
            if self.allow_nodata {
                return out.set(&self.variable, NODATA);
            }
            return Err(NhError::insufficient_data(format!(
                "{}: no usable '{}' within {} m",
                face.id(),
                self.variable,
                tick.engine.station_search_radius
            )));
        }

        let value = tick
            .engine
            .interp_algorithm
            .interpolate(&samples, &face.center())?;
        out.set(&self.variable, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_name_from_variable() {
        let cfg = ConfigTree::from_str(r#"{"variable": "swe"}"#).unwrap();
        let m = DistMet::from_config(&cfg).unwrap();
        assert_eq!(m.name(), "dist_met.swe");
        assert_eq!(m.provides(), &["swe".to_string()]);
        assert_eq!(m.depends_from_met(), &["swe".to_string()]);
    }

    #[test]
    fn test_variable_required() {
        assert!(DistMet::from_config(&ConfigTree::empty()).is_err());
        let empty = ConfigTree::from_str(r#"{"variable": ""}"#).unwrap();
        assert!(DistMet::from_config(&empty).is_err());
    }
}
