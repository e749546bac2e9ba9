// crates/nh_modules/src/lib.rs

//! NivaHydro 模块层
//!
//! 具体模块的集合：
//!
//! - [`interp_met`]: 气象分布模块：把站点观测分布到每个面
//!   （温度递减率、逐月递减率、Dodson–Marks 位温、湿度回归、
//!   Kunkel 露点递减、通用分布器）
//! - [`snow`]: 积雪域模块：重力再分配（全域串行）与
//!   强迫驱动的风吹雪侵蚀
//!
//! [`register_builtin`] 把全部内建模块挂到工厂注册表上；
//! [`build_modules`] 按配置的 `modules` 列表实例化。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod interp_met;
pub mod snow;

use nh_engine::{Module, ModuleRegistry};
use nh_foundation::config::ConfigTree;
use nh_foundation::error::{NhError, NhResult};

/// 登记全部内建模块工厂
pub fn register_builtin(registry: &mut ModuleRegistry) {
    registry.register("dist_tlapse", |cfg| {
        Ok(Box::new(interp_met::dist_tlapse::DistTlapse::from_config(cfg)?) as Box<dyn Module>)
    });
    registry.register("t_monthly_lapse", |cfg| {
        Ok(Box::new(interp_met::t_monthly_lapse::TMonthlyLapse::from_config(cfg)?)
            as Box<dyn Module>)
    });
    registry.register("dodson_nsa_ta", |cfg| {
        Ok(Box::new(interp_met::dodson_nsa_ta::DodsonNsaTa::from_config(cfg)?)
            as Box<dyn Module>)
    });
    registry.register("rh_from_obs", |cfg| {
        Ok(Box::new(interp_met::rh_from_obs::RhFromObs::from_config(cfg)?) as Box<dyn Module>)
    });
    registry.register("kunkel_monthly_td_rh", |cfg| {
        Ok(
            Box::new(interp_met::kunkel_monthly_td_rh::KunkelMonthlyTdRh::from_config(cfg)?)
                as Box<dyn Module>,
        )
    });
    registry.register("dist_met", |cfg| {
        Ok(Box::new(interp_met::dist_met::DistMet::from_config(cfg)?) as Box<dyn Module>)
    });
    registry.register("snow_slide", |cfg| {
        Ok(Box::new(snow::snow_slide::SnowSlide::from_config(cfg)?) as Box<dyn Module>)
    });
    registry.register("snow_drift", |cfg| {
        Ok(Box::new(snow::snow_drift::SnowDrift::from_config(cfg)?) as Box<dyn Module>)
    });
}

/// 按配置实例化模块表
///
/// 配置键 `modules` 是实例名列表；`dist_met.swe` 这类带点的
/// 实例名以点前部分作为登记名，以完整实例名作为私有配置段。
/// 实例化后的模块名必须与列表项一致。
pub fn build_modules(
    registry: &ModuleRegistry,
    cfg: &ConfigTree,
) -> NhResult<Vec<Box<dyn Module>>> {
    let names: Vec<String> = cfg.get("modules", Vec::new());
    if names.is_empty() {
        return Err(NhError::config("config key 'modules' lists no modules"));
    }

    let mut modules = Vec::with_capacity(names.len());
    for entry in &names {
        let base = entry.split_once('.').map_or(entry.as_str(), |(b, _)| b);
        let module = registry.create_from(base, &cfg.section(entry))?;
        if module.name() != entry {
            return Err(NhError::config(format!(
                "module instance '{}' resolved to name '{}'",
                entry,
                module.name()
            )));
        }
        modules.push(module);
    }
    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtin_names() {
        let mut reg = ModuleRegistry::new();
        register_builtin(&mut reg);
        for name in [
            "dist_tlapse",
            "t_monthly_lapse",
            "dodson_nsa_ta",
            "rh_from_obs",
            "kunkel_monthly_td_rh",
            "dist_met",
            "snow_slide",
            "snow_drift",
        ] {
            assert!(reg.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_build_modules_with_instances() {
        let mut reg = ModuleRegistry::new();
        register_builtin(&mut reg);
        let cfg = ConfigTree::from_str(
            r#"{
                "modules": ["dist_tlapse", "dist_met.swe", "snow_slide"],
                "dist_met.swe": { "variable": "swe" }
            }"#,
        )
        .unwrap();
        let modules = build_modules(&reg, &cfg).unwrap();
        let names: Vec<&str> = modules.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["dist_tlapse", "dist_met.swe", "snow_slide"]);
    }

    #[test]
    fn test_build_modules_instance_name_mismatch() {
        let mut reg = ModuleRegistry::new();
        register_builtin(&mut reg);
        // 实例名说 swe，配置段却是 snowdepthavg
        let cfg = ConfigTree::from_str(
            r#"{
                "modules": ["dist_met.swe"],
                "dist_met.swe": { "variable": "snowdepthavg" }
            }"#,
        )
        .unwrap();
        assert!(build_modules(&reg, &cfg).is_err());
    }

    #[test]
    fn test_build_modules_empty_rejected() {
        let reg = ModuleRegistry::new();
        assert!(build_modules(&reg, &ConfigTree::empty()).is_err());
    }
}
