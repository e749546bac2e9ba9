// crates/nh_met/src/coordinator.rs

//! 气象驱动协调器
//!
//! 两种后端统一在一个契约后面，每次运行恰好激活一种：
//!
//! - **ascii 后端**: 每个配置站点 (id, 经纬度, 高程, 路径, 过滤器链)
//!   把整条时序装入内存；统一窗口取
//!   `[max(各站起点), min(各站终点)]`
//! - **格点后端**: 一个"虚拟站点格网"，预声明的过滤器每时间步
//!   运行一次，可引入派生变量
//!
//! `next()` 把 `current` 前进一个 `dt`，用该步的值重填每个站点
//! 句柄并运行过滤器；越过终点时返回 `false`。
//! 站点位置在加载时重投影到网格参考系；地理网格保持度坐标、
//! 用大圆距离，否则用平面欧氏距离。

use crate::error::MetError;
use crate::filter::StationFilter;
use crate::station::Station;
use chrono::{DateTime, Duration, Utc};
use nh_geo::distance::DistanceMetric;
use nh_geo::geometry::{Point2D, Point3D};
use nh_geo::kdtree::StationKdTree;
use nh_geo::projection::MeshProjection;
use nh_io::import::obs_grid::GridObservations;
use nh_io::import::station_ascii::{load_station_series, StationSeries};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

/// ascii 站点配置记录
pub struct AsciiStationRecord {
    /// 站点 id（唯一）
    pub id: String,
    /// 经度 [度]
    pub longitude: f64,
    /// 纬度 [度]
    pub latitude: f64,
    /// 高程 [m]
    pub elevation: f64,
    /// 时序文件路径
    pub path: PathBuf,
    /// 逐站过滤器链
    pub filters: Vec<Box<dyn StationFilter>>,
}

/// 数据后端
enum Backend {
    Ascii {
        /// 与站点平行的时序
        series: Vec<StationSeries>,
        /// 与站点平行的过滤器链
        filters: Vec<Vec<Box<dyn StationFilter>>>,
    },
    Grid {
        grid: GridObservations,
        /// 与站点平行的格点坐标 (j, i)
        coords: Vec<(usize, usize)>,
        /// 对每个虚拟站点运行的过滤器
        filters: Vec<Box<dyn StationFilter>>,
    },
}

/// 气象驱动协调器
///
/// 对模块可见的站点集合在激活的坐标系下封闭；
/// 站点只由 `next()` 修改，且发生在本 tick 任何模块之前。
pub struct MetCoordinator {
    stations: Vec<Station>,
    backend: Backend,
    index: StationKdTree,
    metric: DistanceMetric,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    current: Option<DateTime<Utc>>,
    dt: Duration,
    variables: BTreeSet<String>,
}

impl std::fmt::Debug for MetCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetCoordinator")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("current", &self.current)
            .field("dt", &self.dt)
            .finish_non_exhaustive()
    }
}

impl MetCoordinator {
    // ------------------------------------------------------------------
    // 构造
    // ------------------------------------------------------------------

    /// 从 ascii 站点文件集合构造
    ///
    /// `utc_offset_hours` 向西为正（UTC-6 的文件配 `6`）。
    ///
    /// # 错误
    ///
    /// 缺文件、步长不一致、统一窗口为空、投影失败，全部在
    /// 初始化阶段致命。
    pub fn from_ascii(
        records: Vec<AsciiStationRecord>,
        utc_offset_hours: i32,
        projection: MeshProjection,
    ) -> Result<Self, MetError> {
        if records.is_empty() {
            return Err(MetError::Internal("no ascii stations configured".to_string()));
        }

        let mut stations = Vec::with_capacity(records.len());
        let mut series = Vec::with_capacity(records.len());
        let mut filters = Vec::with_capacity(records.len());
        let mut seen: HashSet<String> = HashSet::new();
        let mut variables: BTreeSet<String> = BTreeSet::new();

        for record in records {
            if !seen.insert(record.id.clone()) {
                return Err(MetError::Internal(format!(
                    "duplicate station id '{}'",
                    record.id
                )));
            }

            let ts = load_station_series(&record.path, utc_offset_hours)?;
            for v in ts.variables() {
                variables.insert(v.to_string());
            }

            let xy = projection
                .project(record.longitude, record.latitude)
                .map_err(|e| MetError::Projection {
                    station: record.id.clone(),
                    message: e.to_string(),
                })?;
            stations.push(Station::new(
                record.id,
                Point3D::from_xy_z(xy, record.elevation),
            ));
            series.push(ts);
            for f in &record.filters {
                for v in f.provides() {
                    variables.insert(v);
                }
            }
            filters.push(record.filters);
        }

        // 所有站点的 dt 必须一致
        let dt = series[0].dt();
        for (st, ts) in stations.iter().zip(&series) {
            if ts.dt() != dt {
                return Err(MetError::InconsistentDt {
                    station: st.id().to_string(),
                    expected: dt.num_seconds(),
                    found: ts.dt().num_seconds(),
                });
            }
        }

        // 统一窗口 [max(起点), min(终点)]
        let start = series
            .iter()
            .map(StationSeries::start)
            .max()
            .expect("non-empty");
        let end = series
            .iter()
            .map(StationSeries::end)
            .min()
            .expect("non-empty");
        if start > end {
            return Err(MetError::EmptyOverlap {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let metric = projection.metric();
        let index = build_index(&stations, metric);

        Ok(Self {
            stations,
            backend: Backend::Ascii { series, filters },
            index,
            metric,
            start,
            end,
            current: None,
            dt,
            variables,
        })
    }

    /// 从格点观测构造
    ///
    /// 每个格点单元成为一个虚拟站点 `grid_<行>_<列>`；
    /// 时间轴步长即 `dt`。
    pub fn from_grid(
        grid: GridObservations,
        filters: Vec<Box<dyn StationFilter>>,
        projection: MeshProjection,
    ) -> Result<Self, MetError> {
        let mut stations = Vec::with_capacity(grid.n_points());
        let mut coords = Vec::with_capacity(grid.n_points());
        for j in 0..grid.ny {
            for i in 0..grid.nx {
                let id = format!("grid_{}_{}", j, i);
                let xy = projection
                    .project(grid.lon[(j, i)], grid.lat[(j, i)])
                    .map_err(|e| MetError::Projection {
                        station: id.clone(),
                        message: e.to_string(),
                    })?;
                stations.push(Station::new(id, Point3D::from_xy_z(xy, grid.elevation[(j, i)])));
                coords.push((j, i));
            }
        }

        let mut variables: BTreeSet<String> =
            grid.variables.keys().cloned().collect();
        for f in &filters {
            for v in f.provides() {
                variables.insert(v);
            }
        }

        let start = grid.times[0];
        let end = *grid.times.last().expect("validated on import");
        let dt = grid.dt;
        let metric = projection.metric();
        let index = build_index(&stations, metric);

        Ok(Self {
            stations,
            backend: Backend::Grid {
                grid,
                coords,
                filters,
            },
            index,
            metric,
            start,
            end,
            current: None,
            dt,
            variables,
        })
    }

    // ------------------------------------------------------------------
    // 时间推进
    // ------------------------------------------------------------------

    /// 推进一个时间步并重填所有站点
    ///
    /// 返回 `false` 表示迭代结束（下一步将越过终点）。
    /// 要么完整推进要么终止，从不部分填充。
    pub fn next(&mut self) -> Result<bool, MetError> {
        let t = match self.current {
            None => self.start,
            Some(c) => c + self.dt,
        };
        if t > self.end {
            return Ok(false);
        }

        match &self.backend {
            Backend::Ascii { series, filters } => {
                for ((station, ts), chain) in self.stations.iter_mut().zip(series).zip(filters) {
                    let row = ts.row_at(t).ok_or_else(|| {
                        MetError::Internal(format!(
                            "station '{}' has no row at {}",
                            station.id(),
                            t
                        ))
                    })?;
                    for (var, value) in ts.row_values(row) {
                        station.set(var.to_string(), value);
                    }
                    for f in chain {
                        f.apply(station)?;
                    }
                }
            }
            Backend::Grid {
                grid,
                coords,
                filters,
            } => {
                let ti = grid.time_index(t).ok_or_else(|| {
                    MetError::Internal(format!("grid has no time slice at {}", t))
                })?;
                for (station, &(j, i)) in self.stations.iter_mut().zip(coords) {
                    for (var, cube) in &grid.variables {
                        station.set(var.clone(), cube[(ti, j, i)]);
                    }
                    for f in filters {
                        f.apply(station)?;
                    }
                }
            }
        }

        self.current = Some(t);
        Ok(true)
    }

    /// 收窄迭代窗口
    ///
    /// 必须在第一次 `next()` 之前调用；窗口端点必须落在
    /// 原窗口内且与 `dt` 网格对齐。调用后 `current` 复位到
    /// 新窗口起点之前。
    pub fn subset(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), MetError> {
        if self.current.is_some() {
            return Err(MetError::InvalidSubset(
                "subset must be called before the first next()".to_string(),
            ));
        }
        if start > end {
            return Err(MetError::InvalidSubset(format!(
                "start {} after end {}",
                start, end
            )));
        }
        if start < self.start || end > self.end {
            return Err(MetError::InvalidSubset(format!(
                "[{}, {}] outside data range [{}, {}]",
                start, end, self.start, self.end
            )));
        }
        let dt_s = self.dt.num_seconds();
        if (start - self.start).num_seconds() % dt_s != 0
            || (end - start).num_seconds() % dt_s != 0
        {
            return Err(MetError::InvalidSubset(format!(
                "window endpoints not aligned to dt = {}s",
                dt_s
            )));
        }
        self.start = start;
        self.end = end;
        Ok(())
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    /// 搜索半径内的站点（米）
    #[must_use]
    pub fn stations_in_radius(&self, x: f64, y: f64, radius: f64) -> Vec<&Station> {
        self.index
            .query_within_distance(&Point2D::new(x, y), radius)
            .into_iter()
            .map(|i| &self.stations[i])
            .collect()
    }

    /// 最近的 `n` 个站点（忽略高程）
    #[must_use]
    pub fn nearest_stations(&self, x: f64, y: f64, n: usize) -> Vec<&Station> {
        self.index
            .query_nearest(&Point2D::new(x, y), n)
            .into_iter()
            .map(|i| &self.stations[i])
            .collect()
    }

    /// 列出所有（含过滤器派生的）变量名
    #[must_use]
    pub fn list_variables(&self) -> &BTreeSet<String> {
        &self.variables
    }

    /// 移除命名站点并重建空间索引
    pub fn prune(&mut self, ids: &HashSet<String>) -> Result<(), MetError> {
        let keep: Vec<bool> = self
            .stations
            .iter()
            .map(|s| !ids.contains(s.id()))
            .collect();
        if keep.iter().all(|&k| k) {
            return Ok(());
        }
        if keep.iter().all(|&k| !k) {
            return Err(MetError::Internal(
                "prune would remove every station".to_string(),
            ));
        }

        retain_by_mask(&mut self.stations, &keep);
        match &mut self.backend {
            Backend::Ascii { series, filters } => {
                retain_by_mask(series, &keep);
                retain_by_mask(filters, &keep);
                // 变量并集随剩余站点收缩
                self.variables = series
                    .iter()
                    .flat_map(|ts| ts.variables().map(str::to_string))
                    .chain(
                        filters
                            .iter()
                            .flatten()
                            .flat_map(|f| f.provides()),
                    )
                    .collect();
            }
            Backend::Grid { coords, .. } => {
                retain_by_mask(coords, &keep);
            }
        }

        self.index = build_index(&self.stations, self.metric);
        Ok(())
    }

    // ------------------------------------------------------------------
    // 访问器
    // ------------------------------------------------------------------

    /// 站点数量
    #[must_use]
    pub fn n_stations(&self) -> usize {
        self.stations.len()
    }

    /// 按下标取站点
    #[must_use]
    pub fn station(&self, i: usize) -> &Station {
        &self.stations[i]
    }

    /// 全部站点（稳定顺序）
    #[must_use]
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// 窗口起点
    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start
    }

    /// 窗口终点
    #[must_use]
    pub fn end_time(&self) -> DateTime<Utc> {
        self.end
    }

    /// 当前模拟时间（首次 `next()` 之前为窗口起点）
    #[must_use]
    pub fn current_time(&self) -> DateTime<Utc> {
        self.current.unwrap_or(self.start)
    }

    /// 时间步长
    #[must_use]
    pub fn dt(&self) -> Duration {
        self.dt
    }

    /// 窗口内的时间步数（含端点）
    #[must_use]
    pub fn n_timesteps(&self) -> usize {
        let span = (self.end - self.start).num_seconds();
        (span / self.dt.num_seconds()) as usize + 1
    }

    /// 距离度量
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }
}

/// 按掩码保留向量元素
fn retain_by_mask<T>(items: &mut Vec<T>, keep: &[bool]) {
    let mut it = keep.iter();
    items.retain(|_| *it.next().expect("mask length matches"));
}

/// 以站点插入顺序建立空间索引
fn build_index(stations: &[Station], metric: DistanceMetric) -> StationKdTree {
    StationKdTree::build(stations.iter().map(Station::xy).collect(), metric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Debias;
    use nh_foundation::config::ConfigTree;
    use std::io::Write;

    /// 生成一个逐小时站点文件
    fn write_station_file(
        dir: &std::path::Path,
        name: &str,
        start_hour: u32,
        n_rows: usize,
        t0: f64,
    ) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "datetime,t,rh").unwrap();
        for i in 0..n_rows {
            let hour = start_hour as usize + i;
            writeln!(
                f,
                "2020-01-{:02} {:02}:00:00,{},{}",
                1 + hour / 24,
                hour % 24,
                t0 + i as f64,
                70.0
            )
            .unwrap();
        }
        path
    }

    fn record(id: &str, lon: f64, lat: f64, z: f64, path: PathBuf) -> AsciiStationRecord {
        AsciiStationRecord {
            id: id.to_string(),
            longitude: lon,
            latitude: lat,
            elevation: z,
            path,
            filters: Vec::new(),
        }
    }

    fn two_station_coordinator(dir: &std::path::Path) -> MetCoordinator {
        let p1 = write_station_file(dir, "s1.txt", 0, 12, 0.0);
        let p2 = write_station_file(dir, "s2.txt", 2, 12, 100.0);
        MetCoordinator::from_ascii(
            vec![
                record("s1", -115.0, 50.0, 1000.0, p1),
                record("s2", -115.1, 50.1, 1500.0, p2),
            ],
            0,
            MeshProjection::Geographic,
        )
        .unwrap()
    }

    #[test]
    fn test_unified_window() {
        let dir = tempfile::tempdir().unwrap();
        let met = two_station_coordinator(dir.path());
        // s1: 小时 0..11, s2: 小时 2..13 → 统一窗口 [2, 11]
        assert_eq!(met.start_time().format("%H").to_string(), "02");
        assert_eq!(met.end_time().format("%H").to_string(), "11");
        assert_eq!(met.n_timesteps(), 10);
    }

    #[test]
    fn test_next_fills_stations() {
        let dir = tempfile::tempdir().unwrap();
        let mut met = two_station_coordinator(dir.path());
        assert!(met.next().unwrap());
        // s1 在小时 2 的温度为 2.0，s2 为 100.0
        assert_eq!(met.station(0).get("t").unwrap(), 2.0);
        assert_eq!(met.station(1).get("t").unwrap(), 100.0);

        let mut ticks = 1;
        while met.next().unwrap() {
            ticks += 1;
        }
        assert_eq!(ticks, met.n_timesteps());
        // 终止后再调用仍是 false
        assert!(!met.next().unwrap());
    }

    #[test]
    fn test_subset_tick_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut met = two_station_coordinator(dir.path());
        let start = met.start_time() + Duration::hours(2);
        let end = start + Duration::hours(3);
        met.subset(start, end).unwrap();
        assert_eq!(met.n_timesteps(), 4);

        let mut ticks = 0;
        while met.next().unwrap() {
            ticks += 1;
        }
        assert_eq!(ticks, 4);
    }

    #[test]
    fn test_subset_after_next_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut met = two_station_coordinator(dir.path());
        met.next().unwrap();
        let s = met.start_time();
        let e = met.end_time();
        assert!(matches!(
            met.subset(s, e),
            Err(MetError::InvalidSubset(_))
        ));
    }

    #[test]
    fn test_subset_misaligned_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut met = two_station_coordinator(dir.path());
        let s = met.start_time() + Duration::minutes(30);
        let e = met.end_time();
        assert!(met.subset(s, e).is_err());
    }

    #[test]
    fn test_empty_overlap_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = write_station_file(dir.path(), "a.txt", 0, 3, 0.0);
        let p2 = write_station_file(dir.path(), "b.txt", 10, 3, 0.0);
        let err = MetCoordinator::from_ascii(
            vec![
                record("a", -115.0, 50.0, 0.0, p1),
                record("b", -115.0, 50.2, 0.0, p2),
            ],
            0,
            MeshProjection::Geographic,
        )
        .unwrap_err();
        assert!(matches!(err, MetError::EmptyOverlap { .. }));
    }

    #[test]
    fn test_mixed_dt_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = write_station_file(dir.path(), "a.txt", 0, 4, 0.0);
        let p2 = dir.path().join("b.txt");
        std::fs::write(
            &p2,
            "datetime,t\n2020-01-01 00:00:00,1\n2020-01-01 00:30:00,2\n2020-01-01 01:00:00,3\n",
        )
        .unwrap();
        let err = MetCoordinator::from_ascii(
            vec![
                record("a", -115.0, 50.0, 0.0, p1),
                record("b", -115.0, 50.2, 0.0, p2),
            ],
            0,
            MeshProjection::Geographic,
        )
        .unwrap_err();
        assert!(matches!(err, MetError::InconsistentDt { .. }));
    }

    #[test]
    fn test_spatial_queries() {
        let dir = tempfile::tempdir().unwrap();
        let met = two_station_coordinator(dir.path());
        let near = met.nearest_stations(-115.0, 50.0, 1);
        assert_eq!(near[0].id(), "s1");
        // 两站相距约 13 km
        let both = met.stations_in_radius(-115.0, 50.0, 20_000.0);
        assert_eq!(both.len(), 2);
        let one = met.stations_in_radius(-115.0, 50.0, 1_000.0);
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn test_prune_rebuilds_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut met = two_station_coordinator(dir.path());
        let mut ids = HashSet::new();
        ids.insert("s1".to_string());
        met.prune(&ids).unwrap();
        assert_eq!(met.n_stations(), 1);
        let near = met.nearest_stations(-115.0, 50.0, 5);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].id(), "s2");
    }

    #[test]
    fn test_filters_and_derived_variables() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = write_station_file(dir.path(), "s1.txt", 0, 4, 10.0);
        let cfg =
            ConfigTree::from_str(r#"{"variable": "t", "offset": 2.0, "output": "t_adj"}"#).unwrap();
        let mut rec = record("s1", -115.0, 50.0, 1000.0, p1);
        rec.filters.push(Box::new(Debias::from_config(&cfg).unwrap()));

        let mut met =
            MetCoordinator::from_ascii(vec![rec], 0, MeshProjection::Geographic).unwrap();
        assert!(met.list_variables().contains("t_adj"));
        met.next().unwrap();
        assert_eq!(met.station(0).get("t_adj").unwrap(), 12.0);
    }

    #[test]
    fn test_grid_backend() {
        let grid = nh_io::import::obs_grid::parse_obs_grid(
            r#"{
                "nx": 2, "ny": 1,
                "lon": [[-115.0, -114.9]],
                "lat": [[50.0, 50.0]],
                "elevation": [[1000.0, 2000.0]],
                "times": ["2020-01-01 00:00:00", "2020-01-01 01:00:00"],
                "variables": { "t": [[[1.0, 2.0]], [[3.0, 4.0]]] }
            }"#,
            std::path::Path::new("<test>"),
        )
        .unwrap();
        let mut met =
            MetCoordinator::from_grid(grid, Vec::new(), MeshProjection::Geographic).unwrap();
        assert_eq!(met.n_stations(), 2);
        assert_eq!(met.station(1).id(), "grid_0_1");

        met.next().unwrap();
        assert_eq!(met.station(0).get("t").unwrap(), 1.0);
        met.next().unwrap();
        assert_eq!(met.station(1).get("t").unwrap(), 4.0);
        assert!(!met.next().unwrap());
    }
}
