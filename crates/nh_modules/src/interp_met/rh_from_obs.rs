// crates/nh_modules/src/interp_met/rh_from_obs.rs

//! 由观测回归的相对湿度分布
//!
//! 每站点由 `rh`、`t` 求实际水汽压 `ea = (rh/100)·esat(t)`；
//! 对全部站点做一次 `ea = γ·z + c` 的普通最小二乘（每模拟时间戳
//! 只拟合一次，缓存以时间戳为失效键），用 γ 把各站 `ea` 降到
//! 海平面，薄板样条插值，再升回面高程；除以面温度的 `esat`
//! 还原 RH，并截断到物理域 [10, 100] %。
//!
//! **Depends:** `t`
//!
//! **Depends from met:** `rh`、`t`
//!
//! **Provides:** `rh`

use nh_engine::{Depend, FaceWrites, Module, Parallelism, TickInfo};
use nh_foundation::config::ConfigTree;
use nh_foundation::constants::is_nodata;
use nh_foundation::error::{NhError, NhResult};
use nh_interp::interp::Sample;
use nh_interp::lapse::{fit_lapse_ols, TimeCachedLapse};
use nh_interp::spline::ThinPlateSpline;
use nh_interp::thermo::esat;
use nh_mesh::Face;

/// RH 物理下界 [%]
const RH_MIN: f64 = 10.0;

/// RH 物理上界 [%]
const RH_MAX: f64 = 100.0;

/// 观测回归 RH 分布模块
pub struct RhFromObs {
    provides: Vec<String>,
    depends: Vec<Depend>,
    depends_met: Vec<String>,
    /// 本时间步的 γ 缓存（模块私有状态，按时间戳失效）
    lapse_cache: TimeCachedLapse,
}

impl RhFromObs {
    /// 从配置构造（无私有键）
    pub fn from_config(_cfg: &ConfigTree) -> NhResult<Self> {
        Ok(Self {
            provides: vec!["rh".to_string()],
            depends: vec![Depend::same("t")],
            depends_met: vec!["rh".to_string(), "t".to_string()],
            lapse_cache: TimeCachedLapse::new(),
        })
    }

    /// 站点的 (高程, 实际水汽压) 对；跳过不可用观测
    fn station_vapour_pressures(tick: &TickInfo) -> Vec<(f64, f64, f64, f64)> {
        let mut rows = Vec::new();
        for s in tick.met.stations() {
            let (Ok(rh), Ok(t)) = (s.get("rh"), s.get("t")) else {
                continue;
            };
            if !rh.is_finite() || is_nodata(rh) || !t.is_finite() || is_nodata(t) {
                continue;
            }
            let ea = rh / 100.0 * esat(t);
            rows.push((s.x(), s.y(), s.z(), ea));
        }
        rows
    }

    #[cfg(test)]
    pub(crate) fn cached_lapse(&self) -> Option<(chrono::DateTime<chrono::Utc>, f64)> {
        self.lapse_cache.peek()
    }
}

impl Module for RhFromObs {
    fn name(&self) -> &str {
        "rh_from_obs"
    }

    fn parallelism(&self) -> Parallelism {
        Parallelism::Data
    }

    fn provides(&self) -> &[String] {
        &self.provides
    }

    fn depends(&self) -> &[Depend] {
        &self.depends
    }

    fn depends_from_met(&self) -> &[String] {
        &self.depends_met
    }

    fn run_face(
        &self,
        face: &Face,
        store: &nh_engine::FaceStore,
        tick: &TickInfo,
        out: &mut FaceWrites,
    ) -> NhResult<()> {
        let rows = Self::station_vapour_pressures(tick);

        let gamma = self.lapse_cache.get_or_fit(tick.time, || {
            let zs_ea: Vec<(f64, f64)> = rows.iter().map(|&(_, _, z, ea)| (z, ea)).collect();
            let (slope, _) = fit_lapse_ols(&zs_ea)?;
            Ok(slope)
        })?;

        // 各站 ea 降到海平面
        let lowered: Vec<Sample> = rows
            .iter()
            .map(|&(x, y, z, ea)| Sample::new(x, y, ea + gamma * (0.0 - z)))
            .collect();
        if lowered.is_empty() {
            return Err(NhError::insufficient_data(format!(
                "{}: no usable rh/t observations",
                face.id()
            )));
        }

        let ea_sea = ThinPlateSpline.interpolate(&lowered, &face.center())?;
        // 升回面高程
        let ea_face = ea_sea + gamma * (face.z() - 0.0);

        let t_face = store.get(face.id().0, "t")?;
        let rh = (ea_face / esat(t_face) * 100.0).clamp(RH_MIN, RH_MAX);

        out.set("rh", rh)
    }
}
