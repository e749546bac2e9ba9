// crates/nh_modules/src/interp_met/mod.rs

//! 气象分布模块
//!
//! 把站点观测抬升到可比参考面、空间插值、再降回面高程。
//! 全部为面并行模块。

pub mod dist_met;
pub mod dist_tlapse;
pub mod dodson_nsa_ta;
pub mod kunkel_monthly_td_rh;
pub mod rh_from_obs;
pub mod t_monthly_lapse;
