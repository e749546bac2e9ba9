// crates/nh_modules/src/interp_met/kunkel_monthly_td_rh.rs

//! Kunkel 逐月露点递减 RH 分布
//!
//! 基于 Kunkel (1989) 的逐月线性递减率对相对湿度做高程订正：
//! RH 经露点温度递减：站点 `rh`、`t` 先换算为露点，露点按逐月
//! 递减率抬升到海平面、插值、降回面高程，再与面温度一起恢复 RH。
//!
//! **Depends:** `t`
//!
//! **Depends from met:** `rh`、`t`
//!
//! **Provides:** `rh`
//!
//! **Configuration keys:**
//! - `lapse_rates`: 12 元素露点递减率表 [°C/m]
//!
//! **Reference:**
//! Kunkel, K. E. (1989). Simple procedures for extrapolation of
//! humidity variables in the mountainous western United States.
//! Journal of Climate, 2(7), 656–669.

use chrono::Datelike;
use nh_engine::{Depend, FaceWrites, Module, Parallelism, TickInfo};
use nh_foundation::config::ConfigTree;
use nh_foundation::constants::is_nodata;
use nh_foundation::error::{NhError, NhResult};
use nh_interp::interp::Sample;
use nh_interp::lapse::{self, MonthlyLapseTable};
use nh_interp::thermo::{dew_point, rh_from_dew_point};
use nh_mesh::Face;

/// 缺省逐月露点递减率 [°C/m]（Kunkel 1989）
const DEFAULT_RATES: [f64; 12] = [
    0.00041, 0.00042, 0.00040, 0.00039, 0.00038, 0.00036, 0.00033, 0.00033, 0.00036, 0.00037,
    0.00040, 0.00040,
];

/// RH 物理下界 [%]
const RH_MIN: f64 = 10.0;

/// RH 物理上界 [%]
const RH_MAX: f64 = 100.0;

/// Kunkel 逐月露点 RH 分布模块
pub struct KunkelMonthlyTdRh {
    provides: Vec<String>,
    depends: Vec<Depend>,
    depends_met: Vec<String>,
    table: MonthlyLapseTable,
}

impl KunkelMonthlyTdRh {
    /// 从配置构造
    pub fn from_config(cfg: &ConfigTree) -> NhResult<Self> {
        let table = match cfg.get_opt::<Vec<f64>>("lapse_rates") {
            Some(rates) => MonthlyLapseTable::from_vec(rates)?,
            None => MonthlyLapseTable::new(DEFAULT_RATES),
        };
        Ok(Self {
            provides: vec!["rh".to_string()],
            depends: vec![Depend::same("t")],
            depends_met: vec!["rh".to_string(), "t".to_string()],
            table,
        })
    }
}

impl Module for KunkelMonthlyTdRh {
    fn name(&self) -> &str {
        "kunkel_monthly_td_rh"
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
        let gamma = self.table.for_month(tick.time.month());

        let mut lowered = Vec::new();
        for s in tick
            .met
            .stations_in_radius(face.x(), face.y(), tick.engine.station_search_radius)
        {
            let (Ok(rh), Ok(t)) = (s.get("rh"), s.get("t")) else {
                continue;
            };
            if !rh.is_finite() || is_nodata(rh) || !t.is_finite() || is_nodata(t) {
                continue;
            }
            let td = dew_point(t, rh);
            lowered.push(Sample::new(s.x(), s.y(), lapse::lift(td, gamma, s.z())));
        }
        if lowered.is_empty() {
            return Err(NhError::insufficient_data(format!(
                "{}: no usable rh/t within {} m",
                face.id(),
                tick.engine.station_search_radius
            )));
        }

        let td_sea = tick
            .engine
            .interp_algorithm
            .interpolate(&lowered, &face.center())?;
        let td_face = lapse::lower(td_sea, gamma, face.z());

        let t_face = store.get(face.id().0, "t")?;
        let rh = rh_from_dew_point(t_face, td_face).clamp(RH_MIN, RH_MAX);
        out.set("rh", rh)
    }
}
