// crates/nh_modules/src/snow/mod.rs

//! 积雪域模块
//!
//! - [`snow_slide`]: 重力驱动的积雪再分配（全域串行，邻面耦合）
//! - [`snow_drift`]: 强迫驱动的风吹雪侵蚀（面并行）

pub mod snow_drift;
pub mod snow_slide;
