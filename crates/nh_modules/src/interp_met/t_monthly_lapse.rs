// crates/nh_modules/src/interp_met/t_monthly_lapse.rs

//! 逐月递减率温度分布
//!
//! 与 `dist_tlapse` 同构，但递减率来自 12 元素逐月表
//! （按模拟月份取值），不依赖气象输入的递减率。
//!
//! **Depends from met:** `t`
//!
//! **Provides:** `t`、`t_lapse_rate`
//!
//! **Configuration keys:**
//! - `lapse_rates`: 12 元素表 [°C/m]，缺省为中纬度月气温直减率

use chrono::Datelike;
use nh_engine::{FaceWrites, Module, Parallelism, TickInfo};
use nh_foundation::config::ConfigTree;
use nh_foundation::constants::is_nodata;
use nh_foundation::error::{NhError, NhResult};
use nh_interp::interp::Sample;
use nh_interp::lapse::{self, MonthlyLapseTable};
use nh_mesh::Face;

/// 缺省逐月气温直减率 [°C/m]
const DEFAULT_RATES: [f64; 12] = [
    0.0044, 0.0059, 0.0071, 0.0078, 0.0081, 0.0082, 0.0081, 0.0081, 0.0077, 0.0068, 0.0055,
    0.0047,
];

/// 逐月递减率温度分布模块
pub struct TMonthlyLapse {
    provides: Vec<String>,
    depends_met: Vec<String>,
    table: MonthlyLapseTable,
}

impl TMonthlyLapse {
    /// 从配置构造
    pub fn from_config(cfg: &ConfigTree) -> NhResult<Self> {
        let table = match cfg.get_opt::<Vec<f64>>("lapse_rates") {
            Some(rates) => MonthlyLapseTable::from_vec(rates)?,
            None => MonthlyLapseTable::new(DEFAULT_RATES),
        };
        Ok(Self {
            provides: vec!["t".to_string(), "t_lapse_rate".to_string()],
            depends_met: vec!["t".to_string()],
            table,
        })
    }
}

impl Module for TMonthlyLapse {
    fn name(&self) -> &str {
        "t_monthly_lapse"
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
        let gamma = self.table.for_month(tick.time.month());

        let mut lowered = Vec::new();
        for s in tick
            .met
            .stations_in_radius(face.x(), face.y(), tick.engine.station_search_radius)
        {
            let t = s.get("t").map_err(NhError::from)?;
            if !t.is_finite() || is_nodata(t) {
                continue;
            }
            lowered.push(Sample::new(s.x(), s.y(), lapse::lift(t, gamma, s.z())));
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
        out.set("t", lapse::lower(value, gamma, face.z()))?;
        out.set("t_lapse_rate", gamma)?;
        Ok(())
    }
}
