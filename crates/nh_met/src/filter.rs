// crates/nh_met/src/filter.rs

//! 逐站点过滤器
//!
//! 过滤器是施加在单个站点当前行上的变换，每时间步运行一次。
//! 文本输入的每个站点可以有自己的过滤器链（例如风速仪高度不同）；
//! 格点后端的过滤器在声明后对每个虚拟站点运行，并可引入派生变量。

use crate::error::MetError;
use crate::station::Station;
use nh_foundation::config::ConfigTree;
use nh_foundation::constants::is_nodata;
use nh_foundation::error::{NhError, NhResult};

/// 站点过滤器契约
pub trait StationFilter: Send + Sync {
    /// 过滤器名称
    fn name(&self) -> &str;

    /// 过滤器引入的派生变量名
    ///
    /// 进入 `list_variables()` 的并集，调度器用它验证依赖。
    fn provides(&self) -> Vec<String> {
        Vec::new()
    }

    /// 对站点当前行施加变换
    fn apply(&self, station: &mut Station) -> Result<(), MetError>;
}

/// 按名字构造过滤器
///
/// 已注册：`scale_wind_speed`、`debias`。
pub fn create_filter(name: &str, cfg: &ConfigTree) -> NhResult<Box<dyn StationFilter>> {
    match name {
        "scale_wind_speed" => Ok(Box::new(ScaleWindSpeed::from_config(cfg)?)),
        "debias" => Ok(Box::new(Debias::from_config(cfg)?)),
        other => Err(NhError::config(format!("unknown station filter '{}'", other))),
    }
}

// ============================================================================
// scale_wind_speed
// ============================================================================

/// 风速高度换算
///
/// 用对数风廓线把仪器高度的风速换算到参考高度：
/// `u_ref = u · ln(z_ref/z0) / ln(z_in/z0)`。
/// 结果写入 `variable`（就地覆盖）。
#[derive(Debug)]
pub struct ScaleWindSpeed {
    /// 被换算的变量名
    variable: String,
    /// 仪器高度 [m]
    z_in: f64,
    /// 参考高度 [m]
    z_out: f64,
    /// 粗糙度长度 [m]
    z0: f64,
}

impl ScaleWindSpeed {
    /// 从配置段构造
    ///
    /// 键：`variable`（默认 `"u"`）、`z_in`（必需）、
    /// `z_out`（默认 50）、`z0`（默认 0.01）。
    pub fn from_config(cfg: &ConfigTree) -> NhResult<Self> {
        let z_in: f64 = cfg.get_required("z_in")?;
        let z0: f64 = cfg.get("z0", 0.01);
        let z_out: f64 = cfg.get("z_out", 50.0);
        if z_in <= z0 || z_out <= z0 {
            return Err(NhError::config(format!(
                "scale_wind_speed: heights ({}, {}) must exceed roughness {}",
                z_in, z_out, z0
            )));
        }
        Ok(Self {
            variable: cfg.get("variable", "u".to_string()),
            z_in,
            z_out,
            z0,
        })
    }
}

impl StationFilter for ScaleWindSpeed {
    fn name(&self) -> &str {
        "scale_wind_speed"
    }

    fn apply(&self, station: &mut Station) -> Result<(), MetError> {
        let u = station.get(&self.variable)?;
        if is_nodata(u) {
            return Ok(());
        }
        let factor = (self.z_out / self.z0).ln() / (self.z_in / self.z0).ln();
        station.set(self.variable.clone(), u * factor);
        Ok(())
    }
}

// ============================================================================
// debias
// ============================================================================

/// 加性偏差订正
///
/// `v' = v + offset`，可选写入新变量名（此时引入派生变量）。
#[derive(Debug)]
pub struct Debias {
    variable: String,
    offset: f64,
    output: Option<String>,
}

impl Debias {
    /// 从配置段构造
    ///
    /// 键：`variable`（必需）、`offset`（必需）、`output`（可选）。
    pub fn from_config(cfg: &ConfigTree) -> NhResult<Self> {
        Ok(Self {
            variable: cfg.get_required("variable")?,
            offset: cfg.get_required("offset")?,
            output: cfg.get_opt("output"),
        })
    }
}

impl StationFilter for Debias {
    fn name(&self) -> &str {
        "debias"
    }

    fn provides(&self) -> Vec<String> {
        self.output.iter().cloned().collect()
    }

    fn apply(&self, station: &mut Station) -> Result<(), MetError> {
        let v = station.get(&self.variable)?;
        let target = self.output.as_ref().unwrap_or(&self.variable).clone();
        if is_nodata(v) {
            station.set(target, v);
            return Ok(());
        }
        station.set(target, v + self.offset);
        Ok(())
    }
}
