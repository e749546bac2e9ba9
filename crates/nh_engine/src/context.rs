// crates/nh_engine/src/context.rs

//! 引擎全局参数
//!
//! 插值算法与站点搜索半径不走全局单例，
//! 而是作为显式上下文对象在构造与 `run` 中逐层传递。

use nh_foundation::config::ConfigTree;
use nh_foundation::error::NhResult;
use nh_interp::InterpAlgorithm;

/// 引擎上下文
///
/// 所有模块共享的全局参数；模块私有常量走各自的配置段。
#[derive(Debug, Clone, Copy)]
pub struct EngineContext {
    /// 空间插值算法
    pub interp_algorithm: InterpAlgorithm,
    /// 站点搜索半径 [m]
    pub station_search_radius: f64,
}

impl EngineContext {
    /// 从配置树读取
    ///
    /// 键：`interp_algorithm` ∈ {`spline`, `idw`, `nn`}（默认 spline），
    /// `station_search_radius`（米，默认 1000）。
    pub fn from_config(cfg: &ConfigTree) -> NhResult<Self> {
        let name: String = cfg.get("interp_algorithm", "spline".to_string());
        Ok(Self {
            interp_algorithm: InterpAlgorithm::from_name(&name)?,
            station_search_radius: cfg.get("station_search_radius", 1000.0),
        })
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self {
            interp_algorithm: InterpAlgorithm::Spline,
            station_search_radius: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let cfg = ConfigTree::from_str(
            r#"{"interp_algorithm": "idw", "station_search_radius": 2500.0}"#,
        )
        .unwrap();
        let ctx = EngineContext::from_config(&cfg).unwrap();
        assert_eq!(ctx.interp_algorithm, InterpAlgorithm::Idw);
        assert_eq!(ctx.station_search_radius, 2500.0);
    }

    #[test]
    fn test_defaults() {
        let ctx = EngineContext::from_config(&ConfigTree::empty()).unwrap();
        assert_eq!(ctx.interp_algorithm, InterpAlgorithm::Spline);
        assert_eq!(ctx.station_search_radius, 1000.0);
    }

    #[test]
    fn test_bad_algorithm_rejected() {
        let cfg = ConfigTree::from_str(r#"{"interp_algorithm": "kriging"}"#).unwrap();
        assert!(EngineContext::from_config(&cfg).is_err());
    }
}
