// crates/nh_modules/src/interp_met/dist_tlapse.rs

//! 递减率温度分布
//!
//! 每面每 tick：取搜索半径内的站点，剔除非有限温度；
//! 用气象输入 `t_lapse_rate` 提供的递减率把各站温度抬升到
//! 海平面，几何插值到面心，再降回面高程。
//!
//! **Depends from met:** `t`、`t_lapse_rate`
//!
//! **Provides:** `t`、`t_lapse_rate`
//!
//! 半径内没有可用站点以 `insufficient-data` 失败。

use nh_engine::{FaceWrites, Module, Parallelism, TickInfo};
use nh_foundation::constants::is_nodata;
use nh_foundation::error::{NhError, NhResult};
use nh_interp::interp::Sample;
use nh_interp::lapse;
use nh_foundation::config::ConfigTree;
use nh_mesh::Face;

/// 递减率温度分布模块
pub struct DistTlapse {
    provides: Vec<String>,
    depends_met: Vec<String>,
}

impl DistTlapse {
    /// 从配置构造（无私有键）
    pub fn from_config(_cfg: &ConfigTree) -> NhResult<Self> {
        Ok(Self {
            provides: vec!["t".to_string(), "t_lapse_rate".to_string()],
            depends_met: vec!["t".to_string(), "t_lapse_rate".to_string()],
        })
    }
}

impl Module for DistTlapse {
    fn name(&self) -> &str {
        "dist_tlapse"
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
        // 面上的递减率取自最近站点的 t_lapse_rate 气象输入
        let lapse_rate = tick
            .met
            .nearest_stations(face.x(), face.y(), 1)
            .first()
            .ok_or_else(|| NhError::insufficient_data(format!("{}: no stations", face.id())))?
            .get("t_lapse_rate")
            .map_err(NhError::from)?;
        if !lapse_rate.is_finite() || is_nodata(lapse_rate) {
            return Err(NhError::insufficient_data(format!(
                "{}: t_lapse_rate is not usable",
                face.id()
            )));
        }

        // 先把站点值降到海平面再插值
        let mut lowered = Vec::new();
        for s in tick
            .met
            .stations_in_radius(face.x(), face.y(), tick.engine.station_search_radius)
        {
            let t = s.get("t").map_err(NhError::from)?;
            if !t.is_finite() || is_nodata(t) {
                continue;
            }
            lowered.push(Sample::new(s.x(), s.y(), lapse::lift(t, lapse_rate, s.z())));
        }
        if lowered.is_empty() {
            return Err(NhError::insufficient_data(format!(
                "{}: no usable temperature within {} m",
                face.id(),
                tick.engine.station_search_radius
            )));
        }

        let value = tick
            .engine
            .interp_algorithm
            .interpolate(&lowered, &face.center())?;

        // 再从海平面升回面高程
        let t_face = lapse::lower(value, lapse_rate, face.z());

        out.set("t", t_face)?;
        out.set("t_lapse_rate", lapse_rate)?;
        Ok(())
    }
}
