// crates/nh_met/src/lib.rs

//! NivaHydro 气象层
//!
//! 气象驱动协调器：从多种数据源打开观测，保证每个虚拟站点
//! 在当前时间步携带全部所需变量，而无论源数据类型。
//!
//! - [`station`]: 点观测持有者（只存当前时间步）
//! - [`filter`]: 逐站点过滤器（每时间步对该站当前行运行一次）
//! - [`coordinator`]: [`MetCoordinator`]：统一 ascii / 格点后端，
//!   推进时间、填充站点、提供空间查询
//!
//! 站点集合只由 `next()` 修改，模块侧只读。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod error;
pub mod filter;
pub mod station;

pub use coordinator::{AsciiStationRecord, MetCoordinator};
pub use error::MetError;
pub use filter::StationFilter;
pub use station::Station;
