// crates/nh_io/src/import/mod.rs

//! 数据导入
//!
//! - [`station_ascii`]: ASCII 站点时序文件
//! - [`obs_grid`]: 结构化格点观测文件
//! - [`mesh_json`]: 网格 JSON

pub mod mesh_json;
pub mod obs_grid;
pub mod station_ascii;

pub use mesh_json::load_mesh;
pub use obs_grid::{load_obs_grid, GridObservations};
pub use station_ascii::{load_station_series, StationSeries};
