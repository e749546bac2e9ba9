// crates/nh_io/src/import/obs_grid.rs

//! 结构化格点观测导入
//!
//! 一个"虚拟站点格网"：2-D 结构化观测点阵列加一条 1-D 时间轴。
//! 坐标以文件原生参考系存储（通常为经纬度），协调器在加载后
//! 统一重投影。时间轴步长即 `dt`，必须均匀。
//!
//! # 文件格式
//!
//! JSON 对象：
//!
//! ```json
//! {
//!     "nx": 2, "ny": 2,
//!     "lon": [[-116.0, -115.9], [-116.0, -115.9]],
//!     "lat": [[50.0, 50.0], [50.1, 50.1]],
//!     "elevation": [[1200.0, 1300.0], [1250.0, 1400.0]],
//!     "times": ["2020-01-01 00:00:00", "2020-01-01 01:00:00"],
//!     "variables": { "t": [[[-8.0, -8.5], [-8.2, -9.0]], ...] }
//! }
//! ```
//!
//! `variables.<name>` 的形状为 `[n_times][ny][nx]`。

use crate::error::ImportError;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use indexmap::IndexMap;
use ndarray::{Array2, Array3};
use serde::Deserialize;
use std::path::Path;

/// 时间戳解析格式
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 磁盘上的格点文件布局
#[derive(Debug, Deserialize)]
struct GridFile {
    nx: usize,
    ny: usize,
    lon: Vec<Vec<f64>>,
    lat: Vec<Vec<f64>>,
    elevation: Vec<Vec<f64>>,
    times: Vec<String>,
    variables: IndexMap<String, Vec<Vec<Vec<f64>>>>,
}

/// 内存中的格点观测
///
/// 每个格点是一个虚拟站点；坐标仍是文件原生参考系，
/// 由气象协调器负责重投影。
#[derive(Debug)]
pub struct GridObservations {
    /// x 方向格点数
    pub nx: usize,
    /// y 方向格点数
    pub ny: usize,
    /// 经度 (ny, nx)
    pub lon: Array2<f64>,
    /// 纬度 (ny, nx)
    pub lat: Array2<f64>,
    /// 高程 (ny, nx)
    pub elevation: Array2<f64>,
    /// 时间轴（UTC，等间隔）
    pub times: Vec<DateTime<Utc>>,
    /// 时间步长
    pub dt: Duration,
    /// 变量立方体 (n_times, ny, nx)，文件出现顺序
    pub variables: IndexMap<String, Array3<f64>>,
}

impl GridObservations {
    /// 虚拟站点数量
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.nx * self.ny
    }

    /// 时间戳对应的时间轴下标
    #[must_use]
    pub fn time_index(&self, t: DateTime<Utc>) -> Option<usize> {
        if self.times.is_empty() || t < self.times[0] {
            return None;
        }
        let steps = (t - self.times[0]).num_seconds() / self.dt.num_seconds();
        let idx = usize::try_from(steps).ok()?;
        (self.times.get(idx) == Some(&t)).then_some(idx)
    }
}

/// 加载格点观测文件
pub fn load_obs_grid(path: &Path) -> Result<GridObservations, ImportError> {
    if !path.exists() {
        return Err(ImportError::MissingFile(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_obs_grid(&content, path)
}

/// 从字符串解析格点观测
pub fn parse_obs_grid(content: &str, path: &Path) -> Result<GridObservations, ImportError> {
    let file: GridFile = serde_json::from_str(content).map_err(|e| ImportError::Format {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let (nx, ny) = (file.nx, file.ny);
    if nx == 0 || ny == 0 {
        return Err(ImportError::Empty(path.to_path_buf()));
    }

    let lon = to_array2(&file.lon, ny, nx, "lon", path)?;
    let lat = to_array2(&file.lat, ny, nx, "lat", path)?;
    let elevation = to_array2(&file.elevation, ny, nx, "elevation", path)?;

    // 时间轴
    if file.times.len() < 2 {
        return Err(ImportError::Format {
            path: path.to_path_buf(),
            message: "time axis needs at least two entries".to_string(),
        });
    }
    let mut times = Vec::with_capacity(file.times.len());
    for (i, s) in file.times.iter().enumerate() {
        let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map_err(|e| {
            ImportError::Format {
                path: path.to_path_buf(),
                message: format!("time[{}] '{}': {}", i, s, e),
            }
        })?;
        times.push(naive.and_utc());
    }
    let dt = times[1] - times[0];
    if dt <= Duration::zero() {
        return Err(ImportError::Format {
            path: path.to_path_buf(),
            message: "time axis must be strictly increasing".to_string(),
        });
    }
    for (i, pair) in times.windows(2).enumerate().skip(1) {
        let found = pair[1] - pair[0];
        if found != dt {
            return Err(ImportError::InconsistentDt {
                path: path.to_path_buf(),
                expected: dt.num_seconds(),
                found: found.num_seconds(),
                row: i + 2,
            });
        }
    }

    // 变量立方体
    let n_times = times.len();
    let mut variables = IndexMap::new();
    for (name, cube) in &file.variables {
        if cube.len() != n_times {
            return Err(ImportError::Format {
                path: path.to_path_buf(),
                message: format!(
                    "variable '{}': expected {} time slices, found {}",
                    name,
                    n_times,
                    cube.len()
                ),
            });
        }
        let mut data = Array3::zeros((n_times, ny, nx));
        for (t, slice) in cube.iter().enumerate() {
            if slice.len() != ny {
                return Err(ImportError::Format {
                    path: path.to_path_buf(),
                    message: format!("variable '{}' slice {}: expected {} rows", name, t, ny),
                });
            }
            for (j, row) in slice.iter().enumerate() {
                if row.len() != nx {
                    return Err(ImportError::Format {
                        path: path.to_path_buf(),
                        message: format!(
                            "variable '{}' slice {} row {}: expected {} cells",
                            name, t, j, nx
                        ),
                    });
                }
                for (i, v) in row.iter().enumerate() {
                    data[(t, j, i)] = *v;
                }
            }
        }
        variables.insert(name.clone(), data);
    }

    Ok(GridObservations {
        nx,
        ny,
        lon,
        lat,
        elevation,
        times,
        dt,
        variables,
    })
}

fn to_array2(
    rows: &[Vec<f64>],
    ny: usize,
    nx: usize,
    name: &str,
    path: &Path,
) -> Result<Array2<f64>, ImportError> {
    if rows.len() != ny {
        return Err(ImportError::Format {
            path: path.to_path_buf(),
            message: format!("'{}': expected {} rows, found {}", name, ny, rows.len()),
        });
    }
    let mut out = Array2::zeros((ny, nx));
    for (j, row) in rows.iter().enumerate() {
        if row.len() != nx {
            return Err(ImportError::Format {
                path: path.to_path_buf(),
                message: format!("'{}' row {}: expected {} cells", name, j, nx),
            });
        }
        for (i, v) in row.iter().enumerate() {
            out[(j, i)] = *v;
        }
    }
    Ok(out)
}
