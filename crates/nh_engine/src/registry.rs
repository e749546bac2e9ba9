// crates/nh_engine/src/registry.rs

//! 模块工厂注册表
//!
//! 显式的注册表对象，不依赖任何全局单例：
//! 初始化时在名字下登记工厂，按配置实例化。
//!
//! 工厂拿到的是该模块的私有配置段（缺失时为空树），
//! 构造器从中读取模块私有常量。

use crate::module::Module;
use nh_foundation::config::ConfigTree;
use nh_foundation::error::{NhError, NhResult};
use std::collections::HashMap;

/// 模块工厂
pub type ModuleFactory = Box<dyn Fn(&ConfigTree) -> NhResult<Box<dyn Module>> + Send + Sync>;

/// 模块注册中心
#[derive(Default)]
pub struct ModuleRegistry {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    /// 创建空注册表
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 在名字下登记工厂
    ///
    /// 重复登记覆盖旧工厂并记录警告。
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&ConfigTree) -> NhResult<Box<dyn Module>> + Send + Sync + 'static,
    {
        if self
            .factories
            .insert(name.to_string(), Box::new(factory))
            .is_some()
        {
            log::warn!("module factory '{}' re-registered", name);
        }
    }

    /// 按名字实例化模块
    ///
    /// `cfg` 是整棵配置树；工厂收到 `cfg.section(name)`。
    pub fn create(&self, name: &str, cfg: &ConfigTree) -> NhResult<Box<dyn Module>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| NhError::not_found(format!("module '{}'", name)))?;
        factory(&cfg.section(name))
    }

    /// 用给定配置段实例化模块
    ///
    /// 供参数化实例使用（如 `dist_met.swe`）：`base` 是登记名，
    /// `section` 是该实例的私有配置段。
    pub fn create_from(&self, base: &str, section: &ConfigTree) -> NhResult<Box<dyn Module>> {
        let factory = self
            .factories
            .get(base)
            .ok_or_else(|| NhError::not_found(format!("module '{}'", base)))?;
        factory(section)
    }

    /// 已登记的模块名（排序后）
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 是否登记了该名字
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}
