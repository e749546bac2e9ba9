// apps/nh_cli/src/commands/common.rs

//! 各子命令共享的装配逻辑
//!
//! 配置文件一站式描述整次运行：
//!
//! ```json
//! {
//!     "mesh": "basin.mesh.json",
//!     "met": {
//!         "backend": "ascii",
//!         "utc_offset": 6,
//!         "stations": [
//!             { "id": "ridge", "longitude": -115.2, "latitude": 50.8,
//!               "elevation": 2100.0, "path": "ridge.txt",
//!               "filters": [ { "name": "debias", "variable": "t", "offset": -0.5 } ] }
//!         ]
//!     },
//!     "modules": ["dist_tlapse", "rh_from_obs", "dist_met.swe",
//!                 "dist_met.snowdepthavg", "snow_slide"],
//!     "dist_met.swe": { "variable": "swe" },
//!     "dist_met.snowdepthavg": { "variable": "snowdepthavg" },
//!     "interp_algorithm": "spline",
//!     "station_search_radius": 5000.0,
//!     "subset": { "start": "2020-01-01 00:00:00", "end": "2020-01-03 00:00:00" },
//!     "output": { "interval": 24, "variables": ["t", "rh"], "directory": "out" },
//!     "checkpoint": { "interval": 240, "on_failure": true, "directory": "ck" }
//! }
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use nh_engine::{ModuleRegistry, Simulation};
use nh_foundation::config::ConfigTree;
use nh_io::import::{load_mesh, load_obs_grid};
use nh_mesh::TriMesh;
use nh_met::filter::create_filter;
use nh_met::{AsciiStationRecord, MetCoordinator, StationFilter};
use std::path::{Path, PathBuf};

/// 从配置文件装配完整模拟
pub fn build_simulation(config_path: &Path) -> Result<Simulation> {
    let cfg = ConfigTree::from_file(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let mesh = load_mesh_from(&cfg, config_path)?;
    let met = build_met(&cfg, config_path, &mesh)?;

    let mut registry = ModuleRegistry::new();
    nh_modules::register_builtin(&mut registry);
    let modules = nh_modules::build_modules(&registry, &cfg).context("building module list")?;

    let mut sim =
        Simulation::new(mesh, met, modules, &cfg).context("assembling simulation")?;

    if cfg.has("subset") {
        let start = parse_time(&cfg.get_required::<String>("subset.start")?)?;
        let end = parse_time(&cfg.get_required::<String>("subset.end")?)?;
        sim.subset(start, end).context("applying subset window")?;
    }
    Ok(sim)
}

/// 相对配置文件所在目录解析路径
fn resolve(config_path: &Path, raw: &str) -> PathBuf {
    let p = PathBuf::from(raw);
    if p.is_absolute() {
        p
    } else {
        config_path.parent().unwrap_or(Path::new(".")).join(p)
    }
}

fn load_mesh_from(cfg: &ConfigTree, config_path: &Path) -> Result<TriMesh> {
    let mesh_path: String = cfg.get_required("mesh").context("config key 'mesh'")?;
    let path = resolve(config_path, &mesh_path);
    Ok(load_mesh(&path).with_context(|| format!("loading mesh {}", path.display()))?)
}

fn build_met(cfg: &ConfigTree, config_path: &Path, mesh: &TriMesh) -> Result<MetCoordinator> {
    let met_cfg = cfg.section("met");
    let backend: String = met_cfg.get("backend", "ascii".to_string());
    let projection = mesh.projection();

    match backend.as_str() {
        "ascii" => {
            let utc_offset: i32 = met_cfg.get("utc_offset", 0);
            let stations = met_cfg
                .as_value()
                .get("stations")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            if stations.is_empty() {
                bail!("met.stations lists no stations");
            }

            let mut records = Vec::with_capacity(stations.len());
            for station in stations {
                let tree = ConfigTree::from_value(station);
                let path: String = tree.get_required("path")?;
                records.push(AsciiStationRecord {
                    id: tree.get_required("id")?,
                    longitude: tree.get_required("longitude")?,
                    latitude: tree.get_required("latitude")?,
                    elevation: tree.get_required("elevation")?,
                    path: resolve(config_path, &path),
                    filters: build_filters(&tree)?,
                });
            }
            Ok(MetCoordinator::from_ascii(records, utc_offset, projection)?)
        }
        "grid" => {
            let grid_path: String = met_cfg.get_required("path")?;
            let grid = load_obs_grid(&resolve(config_path, &grid_path))?;
            Ok(MetCoordinator::from_grid(
                grid,
                build_filters(&met_cfg)?,
                projection,
            )?)
        }
        other => bail!("unknown met backend '{}' (expected ascii or grid)", other),
    }
}

fn build_filters(tree: &ConfigTree) -> Result<Vec<Box<dyn StationFilter>>> {
    let entries = tree
        .as_value()
        .get("filters")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let mut filters = Vec::with_capacity(entries.len());
    for entry in entries {
        let section = ConfigTree::from_value(entry);
        let name: String = section.get_required("name")?;
        filters.push(create_filter(&name, &section)?);
    }
    Ok(filters)
}

/// 解析 `YYYY-MM-DD HH:MM:SS` 格式的 UTC 时间
pub fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    Ok(NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("bad timestamp '{}'", text))?
        .and_utc())
}
