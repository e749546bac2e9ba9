// crates/nh_io/src/import/station_ascii.rs

//! ASCII 站点时序导入
//!
//! 解析空白或逗号分隔的站点观测文件：
//!
//! - 表头命名变量，首列为时间戳列
//! - 时间戳格式 `YYYY-MM-DD HH:MM:SS`，施加配置的 `utc_offset`
//!   （向西为正）后视为 UTC
//! - 相邻行的间距定义时间步长 `dt`，之后每对相邻行必须相等
//! - 缺测单元使用哨兵 `-9999`
//!
//! # 文件示例
//!
//! ```text
//! datetime,t,rh,p
//! 2020-01-01 00:00:00,-8.2,78,0
//! 2020-01-01 01:00:00,-8.7,80,0.2
//! ```

use crate::error::ImportError;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use indexmap::IndexMap;
use std::path::Path;

/// 时间戳解析格式
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 一个站点的完整时序
///
/// 站点文件一次性装入内存；气象协调器逐步取行填充站点句柄。
#[derive(Debug, Clone)]
pub struct StationSeries {
    /// 时间轴（UTC，等间隔）
    times: Vec<DateTime<Utc>>,
    /// 变量列（表头顺序）
    columns: IndexMap<String, Vec<f64>>,
    /// 时间步长
    dt: Duration,
}

impl StationSeries {
    /// 时间步数
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// 是否为空
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// 序列起始时间
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.times[0]
    }

    /// 序列结束时间
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        *self.times.last().expect("non-empty series")
    }

    /// 时间步长
    #[must_use]
    pub fn dt(&self) -> Duration {
        self.dt
    }

    /// 变量名（表头顺序）
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// 是否含有某变量
    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// 时间戳对应的行号
    ///
    /// 只接受恰好落在时间轴上的时间戳。
    #[must_use]
    pub fn row_at(&self, t: DateTime<Utc>) -> Option<usize> {
        if self.times.is_empty() || t < self.start() || t > self.end() {
            return None;
        }
        let offset = t - self.start();
        let steps = offset.num_seconds() / self.dt.num_seconds();
        let row = usize::try_from(steps).ok()?;
        (self.times.get(row) == Some(&t)).then_some(row)
    }

    /// 读取某行某变量的值
    #[must_use]
    pub fn value(&self, variable: &str, row: usize) -> Option<f64> {
        self.columns.get(variable)?.get(row).copied()
    }

    /// 该行所有 (变量, 值) 对
    pub fn row_values(&self, row: usize) -> impl Iterator<Item = (&str, f64)> {
        self.columns
            .iter()
            .filter_map(move |(name, col)| col.get(row).map(|v| (name.as_str(), *v)))
    }
}

/// 从文件加载站点时序
pub fn load_station_series(
    path: &Path,
    utc_offset_hours: i32,
) -> Result<StationSeries, ImportError> {
    if !path.exists() {
        return Err(ImportError::MissingFile(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_station_series(&content, utc_offset_hours, path)
}

/// 从字符串解析站点时序
///
/// `path` 仅用于错误报告。
pub fn parse_station_series(
    content: &str,
    utc_offset_hours: i32,
    path: &Path,
) -> Result<StationSeries, ImportError> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (header_no, header) = lines
        .next()
        .ok_or_else(|| ImportError::Empty(path.to_path_buf()))?;
    let comma = header.contains(',');

    let header_fields: Vec<&str> = if comma {
        header.split(',').map(str::trim).collect()
    } else {
        header.split_whitespace().collect()
    };
    if header_fields.len() < 2 {
        return Err(ImportError::Format {
            path: path.to_path_buf(),
            message: format!(
                "header at line {} must name a timestamp column and at least one variable",
                header_no + 1
            ),
        });
    }
    let variables: Vec<String> = header_fields[1..]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut times: Vec<DateTime<Utc>> = Vec::new();
    let mut columns: IndexMap<String, Vec<f64>> = variables
        .iter()
        .map(|v| (v.clone(), Vec::new()))
        .collect();

    let offset = Duration::hours(i64::from(utc_offset_hours));

    for (line_no, line) in lines {
        let (timestamp, cells): (String, Vec<&str>) = if comma {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            (parts[0].to_string(), parts[1..].to_vec())
        } else {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                return Err(ImportError::Parse {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    message: "row too short for a date and a time token".to_string(),
                });
            }
            (format!("{} {}", parts[0], parts[1]), parts[2..].to_vec())
        };

        if cells.len() != variables.len() {
            return Err(ImportError::Parse {
                path: path.to_path_buf(),
                line: line_no + 1,
                message: format!(
                    "expected {} value cells, found {}",
                    variables.len(),
                    cells.len()
                ),
            });
        }

        let naive = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT).map_err(|e| {
            ImportError::Parse {
                path: path.to_path_buf(),
                line: line_no + 1,
                message: format!("bad timestamp '{}': {}", timestamp, e),
            }
        })?;
        times.push(naive.and_utc() + offset);

        for (var, cell) in variables.iter().zip(&cells) {
            let value: f64 = cell.parse().map_err(|e| ImportError::Parse {
                path: path.to_path_buf(),
                line: line_no + 1,
                message: format!("bad value '{}' for {}: {}", cell, var, e),
            })?;
            columns
                .get_mut(var)
                .expect("column exists by construction")
                .push(value);
        }
    }

    if times.len() < 2 {
        return Err(ImportError::Empty(path.to_path_buf()));
    }

    // dt 由前两行导出，之后每对相邻行都必须一致
    let dt = times[1] - times[0];
    if dt <= Duration::zero() {
        return Err(ImportError::Format {
            path: path.to_path_buf(),
            message: "timestamps must be strictly increasing".to_string(),
        });
    }
    for (row, pair) in times.windows(2).enumerate().skip(1) {
        let found = pair[1] - pair[0];
        if found != dt {
            return Err(ImportError::InconsistentDt {
                path: path.to_path_buf(),
                expected: dt.num_seconds(),
                found: found.num_seconds(),
                row: row + 2,
            });
        }
    }

    Ok(StationSeries { times, columns, dt })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(content: &str, utc_offset: i32) -> Result<StationSeries, ImportError> {
        parse_station_series(content, utc_offset, &PathBuf::from("<test>"))
    }

    const CSV: &str = "datetime,t,rh\n\
        2020-01-01 00:00:00,-8.2,78\n\
        2020-01-01 01:00:00,-8.7,80\n\
        2020-01-01 02:00:00,-9999,81\n";

    #[test]
    fn test_parse_csv() {
        let s = parse(CSV, 0).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.dt(), Duration::hours(1));
        assert_eq!(s.value("t", 0), Some(-8.2));
        assert_eq!(s.value("rh", 1), Some(80.0));
        assert_eq!(s.value("t", 2), Some(-9999.0));
        let vars: Vec<&str> = s.variables().collect();
        assert_eq!(vars, vec!["t", "rh"]);
    }

    #[test]
    fn test_parse_whitespace() {
        let content = "datetime t rh\n\
            2020-01-01 00:00:00 -8.2 78\n\
            2020-01-01 01:00:00 -8.7 80\n";
        let s = parse(content, 0).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.value("rh", 0), Some(78.0));
    }

    #[test]
    fn test_utc_offset_positive_west() {
        // UTC-6 的本地时刻加 6 小时得到 UTC
        let s = parse(CSV, 6).unwrap();
        let expected = NaiveDateTime::parse_from_str("2020-01-01 06:00:00", TIMESTAMP_FORMAT)
            .unwrap()
            .and_utc();
        assert_eq!(s.start(), expected);
    }

    #[test]
    fn test_inconsistent_dt_fails() {
        let content = "datetime,t\n\
            2020-01-01 00:00:00,1\n\
            2020-01-01 01:00:00,2\n\
            2020-01-01 03:00:00,3\n";
        let err = parse(content, 0).unwrap_err();
        assert!(matches!(err, ImportError::InconsistentDt { row: 3, .. }));
    }

    #[test]
    fn test_row_at() {
        let s = parse(CSV, 0).unwrap();
        let t1 = s.start() + Duration::hours(1);
        assert_eq!(s.row_at(t1), Some(1));
        assert_eq!(s.row_at(s.start() + Duration::minutes(30)), None);
        assert_eq!(s.row_at(s.end() + Duration::hours(1)), None);
    }

    #[test]
    fn test_decreasing_rejected() {
        let content = "datetime,t\n\
            2020-01-02 00:00:00,1\n\
            2020-01-01 00:00:00,2\n";
        assert!(parse(content, 0).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_station_series(&PathBuf::from("/no/such/file.txt"), 0).unwrap_err();
        assert!(matches!(err, ImportError::MissingFile(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.txt");
        std::fs::write(&path, CSV).unwrap();
        let s = load_station_series(&path, 0).unwrap();
        assert_eq!(s.len(), 3);
    }
}
