// crates/nh_foundation/src/config.rs

//! 层级配置树
//!
//! 提供类型化的 `get(key, default)` 访问的层级键值配置。
//! 配置文件使用 JSON 表达，内部以 [`serde_json::Value`] 存储，
//! 键可以用 `.` 分隔的路径访问嵌套节点。
//!
//! 未知键只产生警告，不产生错误。
//!
//! # 使用示例
//!
//! ```
//! use nh_foundation::config::ConfigTree;
//!
//! let cfg = ConfigTree::from_str(r#"{
//!     "interp_algorithm": "spline",
//!     "station_search_radius": 1000.0,
//!     "snow_slide": { "avalache_mult": 3178.4 }
//! }"#).unwrap();
//!
//! let radius: f64 = cfg.get("station_search_radius", 500.0);
//! let algo: String = cfg.get("interp_algorithm", "idw".to_string());
//! let mult: f64 = cfg.section("snow_slide").get("avalache_mult", 0.0);
//! assert_eq!(radius, 1000.0);
//! ```

use crate::error::{NhError, NhResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// 层级配置树
///
/// 任何节点都是一棵配置树；[`ConfigTree::section`] 返回子树视图，
/// 对缺失节点返回空树，使模块可以无条件读取自己的私有配置段。
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    root: Value,
}

impl ConfigTree {
    /// 创建空配置树
    #[must_use]
    pub fn empty() -> Self {
        Self {
            root: Value::Object(serde_json::Map::new()),
        }
    }

    /// 从 JSON 字符串解析
    pub fn from_str(text: &str) -> NhResult<Self> {
        let root: Value = serde_json::from_str(text)
            .map_err(|e| NhError::config(format!("JSON parse failed: {}", e)))?;
        if !root.is_object() {
            return Err(NhError::config("top-level config must be an object"));
        }
        Ok(Self { root })
    }

    /// 从 JSON 文件加载
    pub fn from_file(path: &Path) -> NhResult<Self> {
        if !path.exists() {
            return Err(NhError::file_not_found(path));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            NhError::io_with_source(format!("read config {}", path.display()), e)
        })?;
        Self::from_str(&text)
    }

    /// 从已有的 JSON 值构造
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self { root: value }
    }

    /// 按 `.` 分隔的路径查找节点
    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut node = &self.root;
        for part in key.split('.') {
            node = node.as_object()?.get(part)?;
        }
        Some(node)
    }

    /// 检查键是否存在
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// 获取子配置段
    ///
    /// 缺失的段返回空树，因此读取默认值仍然有效。
    #[must_use]
    pub fn section(&self, key: &str) -> ConfigTree {
        match self.lookup(key) {
            Some(v) => Self { root: v.clone() },
            None => Self::empty(),
        }
    }

    /// 类型化读取，缺失或类型不符时返回默认值
    ///
    /// 类型不符会记录一条 `warn` 日志，因为这通常是配置笔误。
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.lookup(key) {
            Some(v) => match serde_json::from_value(v.clone()) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("config key '{}' has unexpected type ({}), using default", key, e);
                    default
                }
            },
            None => default,
        }
    }

    /// 类型化读取，缺失时返回 `None`
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let v = self.lookup(key)?;
        serde_json::from_value(v.clone()).ok()
    }

    /// 类型化读取，缺失或类型不符时返回配置错误
    pub fn get_required<T: DeserializeOwned>(&self, key: &str) -> NhResult<T> {
        let v = self
            .lookup(key)
            .ok_or_else(|| NhError::config(format!("missing required key '{}'", key)))?;
        serde_json::from_value(v.clone())
            .map_err(|e| NhError::config(format!("key '{}': {}", key, e)))
    }

    /// 当前节点的直接子键
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        match self.root.as_object() {
            Some(map) => map.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// 对不在已知列表中的顶层键发出警告
    ///
    /// 未知键不是错误，只提示可能的拼写问题。
    pub fn warn_unknown_keys(&self, known: &[&str]) {
        for key in self.keys() {
            if !known.contains(&key.as_str()) {
                log::warn!("unrecognized config key '{}' (ignored)", key);
            }
        }
    }

    /// 访问底层 JSON 值
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.root
    }
}
