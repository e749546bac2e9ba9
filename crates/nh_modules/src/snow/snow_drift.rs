// crates/nh_modules/src/snow/snow_drift.rs

//! 强迫驱动的风吹雪侵蚀
//!
//! 从面上剥蚀积雪质量并报告输运量。侵蚀质量只来自外部强迫
//! 变量（如上游耦合模型给出的剥蚀量，负值为侵蚀）；没有强迫时
//! 不发生侵蚀。由风速现场计算侵蚀通量的路径在上游实现中已被
//! 停用，这里保持纯强迫语义。
//!
//! 无雪或无风数据时不侵蚀；无风数据时 `drift` 写缺测哨兵
//! （模块契约允许）。侵蚀量不超过面上现有 SWE。
//!
//! **Depends:** `swe`、`snowdepthavg`（以及可选的强迫变量）
//!
//! **Depends from met:** `vw_drift`
//!
//! **Provides:** `drift`（被剥蚀质量 [kg/m²]）、
//! `delta_drift_mass`（质量变化 [kg/m²]，侵蚀为负）
//!
//! **Configuration keys:**
//! - `force_variable`: 携带强迫剥蚀质量的面变量名（可选）

use nh_engine::{Depend, FaceWrites, Module, Parallelism, TickInfo};
use nh_foundation::config::ConfigTree;
use nh_foundation::constants::{is_nodata, NODATA};
use nh_foundation::error::{NhError, NhResult};
use nh_mesh::Face;

/// 强迫量的触发阈值
const FORCE_EPS: f64 = 1e-12;

/// 风吹雪侵蚀模块
pub struct SnowDrift {
    provides: Vec<String>,
    depends: Vec<Depend>,
    depends_met: Vec<String>,
    force_variable: Option<String>,
}

impl SnowDrift {
    /// 从配置构造
    pub fn from_config(cfg: &ConfigTree) -> NhResult<Self> {
        let force_variable: Option<String> = cfg.get_opt("force_variable");
        let mut depends = vec![Depend::same("swe"), Depend::same("snowdepthavg")];
        if let Some(var) = &force_variable {
            depends.push(Depend::same(var.clone()));
        }
        Ok(Self {
            provides: vec!["drift".to_string(), "delta_drift_mass".to_string()],
            depends,
            depends_met: vec!["vw_drift".to_string()],
            force_variable,
        })
    }
}

impl Module for SnowDrift {
    fn name(&self) -> &str {
        "snow_drift"
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
        let swe = store.get(face.id().0, "swe")?;
        let snowdepth = store.get(face.id().0, "snowdepthavg")?;

        let no_snow = !swe.is_finite() || is_nodata(swe) || swe <= 0.0 || snowdepth <= 0.0;
        if no_snow {
            out.set("drift", 0.0)?;
            out.set("delta_drift_mass", 0.0)?;
            return Ok(());
        }

        let wind = tick
            .met
            .nearest_stations(face.x(), face.y(), 1)
            .first()
            .map(|s| s.get("vw_drift"))
            .transpose()
            .map_err(NhError::from)?;
        let no_wind = match wind {
            Some(v) => !v.is_finite() || is_nodata(v),
            None => true,
        };
        if no_wind {
            out.set("drift", NODATA)?;
            out.set("delta_drift_mass", 0.0)?;
            return Ok(());
        }

        // 只有外部强迫才产生侵蚀；负的强迫量是剥蚀
        let mut mass_erode = match &self.force_variable {
            Some(var) => {
                let forced = store.get(face.id().0, var)?;
                if forced.is_finite() && !is_nodata(forced) && forced.abs() > FORCE_EPS {
                    (-forced).max(0.0)
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        // 不剥蚀超过现有质量
        if mass_erode > swe {
            mass_erode = swe;
        }

        out.set("drift", mass_erode)?;
        out.set("delta_drift_mass", -mass_erode)?;
        Ok(())
    }
}
