// crates/nh_modules/src/interp_met/dodson_nsa_ta.rs

//! Dodson–Marks 中性稳定温度分布
//!
//! 中性稳定算法（NSA）用静力方程与位温方程把测得的温度/高程
//! 变换为海平面位温，对位温做空间插值，再映射回面高程。
//!
//! **Depends from met:** `t`
//!
//! **Provides:** `t`、`t_lapse_rate`
//!
//! **Reference:**
//! Dodson, R. and Marks, D.: Daily air temperature interpolated at
//! high spatial resolution over a large mountainous region,
//! Clim. Res., 8, 1–20, 1997.

use nh_engine::{FaceWrites, Module, Parallelism, TickInfo};
use nh_foundation::config::ConfigTree;
use nh_foundation::constants::is_nodata;
use nh_foundation::error::{NhError, NhResult};
use nh_interp::interp::Sample;
use nh_interp::thermo;
use nh_mesh::Face;

/// 诊断递减率的有限差分步长 [m]
const GRADIENT_DZ: f64 = 1.0;

/// NSA 温度分布模块
pub struct DodsonNsaTa {
    provides: Vec<String>,
    depends_met: Vec<String>,
}

impl DodsonNsaTa {
    /// 从配置构造（无私有键）
    pub fn from_config(_cfg: &ConfigTree) -> NhResult<Self> {
        Ok(Self {
            provides: vec!["t".to_string(), "t_lapse_rate".to_string()],
            depends_met: vec!["t".to_string()],
        })
    }
}

impl Module for DodsonNsaTa {
    fn name(&self) -> &str {
        "dodson_nsa_ta"
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
        let mut theta_samples = Vec::new();
        for s in tick
            .met
            .stations_in_radius(face.x(), face.y(), tick.engine.station_search_radius)
        {
            let t = s.get("t").map_err(NhError::from)?;
            if !t.is_finite() || is_nodata(t) {
                continue;
            }
            theta_samples.push(Sample::new(
                s.x(),
                s.y(),
                thermo::potential_temperature(t, s.z()),
            ));
        }
        if theta_samples.is_empty() {
            return Err(NhError::insufficient_data(format!(
                "{}: no usable temperature within {} m",
                face.id(),
                tick.engine.station_search_radius
            )));
        }

        let theta = tick
            .engine
            .interp_algorithm
            .interpolate(&theta_samples, &face.center())?;
        let t_face = thermo::temperature_from_potential(theta, face.z());

        // 诊断：同一位温场在面高程附近的局地垂直梯度
        let t_above = thermo::temperature_from_potential(theta, face.z() + GRADIENT_DZ);
        let gradient = (t_face - t_above) / GRADIENT_DZ;

        out.set("t", t_face)?;
        out.set("t_lapse_rate", gradient)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructs() {
        let m = DodsonNsaTa::from_config(&ConfigTree::empty()).unwrap();
        assert_eq!(m.name(), "dodson_nsa_ta");
        assert_eq!(m.provides(), &["t".to_string(), "t_lapse_rate".to_string()]);
    }

    #[test]
    fn test_potential_transform_is_height_consistent() {
        // 两个不同高程的站点若有相同位温，任意面高程都还原出一致温度
        let theta = thermo::potential_temperature(5.0, 1000.0);
        let t_2000 = thermo::temperature_from_potential(theta, 2000.0);
        let theta_back = thermo::potential_temperature(t_2000, 2000.0);
        assert!((theta_back - theta).abs() < 1e-9);
        // 位温一致的大气是稳定层结，温度随高度降低
        assert!(t_2000 < 5.0);
    }
}
