// crates/nh_interp/src/lapse.rs

//! 垂直递减率抬升
//!
//! 把点观测变换到公共垂直参考面（海平面）再降回查询高程，
//! 使不同高程的站点可比。三种递减率来源：
//!
//! - 常数：模块配置或气象输入给定 γ
//! - 逐月表：12 元素表按模拟月份取值
//! - 按时间步拟合：对当前站点集做普通最小二乘，
//!   以时间戳为失效键缓存（每步拟合一次，而不是每面一次）
//!
//! 抬升约定与温度分布模块一致：
//! `lifted = v − γ·(0 − z)`，`lowered = v + γ·(0 − z)`。

use chrono::{DateTime, Utc};
use nh_foundation::error::{NhError, NhResult};
use parking_lot::Mutex;

/// 抬升到海平面
///
/// `lapse` 为递减率 [单位/m]，`z` 为站点高程 [m]。
#[inline]
#[must_use]
pub fn lift(value: f64, lapse: f64, z: f64) -> f64 {
    value - lapse * (0.0 - z)
}

/// 从海平面降回查询高程
#[inline]
#[must_use]
pub fn lower(value: f64, lapse: f64, z: f64) -> f64 {
    value + lapse * (0.0 - z)
}

/// 普通最小二乘拟合 `v = γ·z + c`
///
/// 返回 (γ, c)。求和在单线程内完成，结果与线程数无关。
///
/// # 错误
///
/// 少于 2 个样本时无法定义斜率。
pub fn fit_lapse_ols(samples: &[(f64, f64)]) -> NhResult<(f64, f64)> {
    let n = samples.len();
    if n < 2 {
        return Err(NhError::insufficient_data(format!(
            "lapse fit needs at least 2 samples, got {}",
            n
        )));
    }

    let nf = n as f64;
    let mut sum_z = 0.0;
    let mut sum_v = 0.0;
    for &(z, v) in samples {
        sum_z += z;
        sum_v += v;
    }
    let mean_z = sum_z / nf;
    let mean_v = sum_v / nf;

    let mut cov = 0.0;
    let mut var = 0.0;
    for &(z, v) in samples {
        cov += (z - mean_z) * (v - mean_v);
        var += (z - mean_z) * (z - mean_z);
    }

    // 所有站点同高程时斜率取 0
    if var < 1e-12 {
        return Ok((0.0, mean_v));
    }
    let slope = cov / var;
    Ok((slope, mean_v - slope * mean_z))
}

/// 逐月递减率表
///
/// 12 个元素，按模拟月份 (1..=12) 取值。表是模块私有的，
/// 由模块配置覆盖默认值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyLapseTable {
    rates: [f64; 12],
}

impl MonthlyLapseTable {
    /// 从 12 元素数组创建
    #[must_use]
    pub const fn new(rates: [f64; 12]) -> Self {
        Self { rates }
    }

    /// 从配置向量创建；长度必须为 12
    pub fn from_vec(rates: Vec<f64>) -> NhResult<Self> {
        let arr: [f64; 12] = rates
            .try_into()
            .map_err(|v: Vec<f64>| {
                NhError::config(format!("monthly lapse table needs 12 entries, got {}", v.len()))
            })?;
        Ok(Self::new(arr))
    }

    /// 按月份取递减率 (1..=12)
    ///
    /// # Panics
    ///
    /// 月份超出 1..=12 时 panic；月份来自 chrono，总是合法。
    #[must_use]
    pub fn for_month(&self, month: u32) -> f64 {
        assert!((1..=12).contains(&month), "month {} out of range", month);
        self.rates[(month - 1) as usize]
    }
}

/// 按时间步缓存的递减率
///
/// 一个模块在一个 tick 内跑 N 个面，但回归只应做一次。
/// 缓存值以当前模拟时间为失效键，存放在模块私有状态里。
#[derive(Debug, Default)]
pub struct TimeCachedLapse {
    cached: Mutex<Option<(DateTime<Utc>, f64)>>,
}

impl TimeCachedLapse {
    /// 创建空缓存
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出当前时间步的递减率，必要时调用 `fit` 计算
    ///
    /// 同一时间戳只拟合一次；其余调用直接命中缓存。
    pub fn get_or_fit<F>(&self, now: DateTime<Utc>, fit: F) -> NhResult<f64>
    where
        F: FnOnce() -> NhResult<f64>,
    {
        let mut guard = self.cached.lock();
        if let Some((stamp, value)) = *guard {
            if stamp == now {
                return Ok(value);
            }
        }
        let value = fit()?;
        *guard = Some((now, value));
        Ok(value)
    }

    /// 查看缓存内容（测试用）
    #[must_use]
    pub fn peek(&self) -> Option<(DateTime<Utc>, f64)> {
        *self.cached.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lift_lower_roundtrip() {
        let gamma = 0.0065;
        let v = lift(10.0, gamma, 1500.0);
        assert!((lower(v, gamma, 1500.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_lift_sign_convention() {
        // γ = 0.005, z = 100: 降回时减去 0.5
        let lowered = lower(10.0, 0.005, 100.0);
        assert!((lowered - 9.5).abs() < 1e-12);
    }

    #[test]
    fn test_ols_exact_line() {
        let samples: Vec<(f64, f64)> = (0..5)
            .map(|i| {
                let z = 500.0 * f64::from(i);
                (z, -0.0001 * z + 611.0)
            })
            .collect();
        let (slope, intercept) = fit_lapse_ols(&samples).unwrap();
        assert!((slope + 0.0001).abs() < 1e-12);
        assert!((intercept - 611.0).abs() < 1e-9);
    }

    #[test]
    fn test_ols_flat_elevation() {
        let samples = vec![(1000.0, 5.0), (1000.0, 7.0)];
        let (slope, intercept) = fit_lapse_ols(&samples).unwrap();
        assert_eq!(slope, 0.0);
        assert!((intercept - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_ols_insufficient() {
        assert!(fit_lapse_ols(&[(0.0, 1.0)]).is_err());
    }

    #[test]
    fn test_monthly_table() {
        let mut rates = [0.0; 12];
        rates[0] = 0.0049;
        rates[6] = 0.0043;
        let table = MonthlyLapseTable::new(rates);
        assert_eq!(table.for_month(1), 0.0049);
        assert_eq!(table.for_month(7), 0.0043);
        assert!(MonthlyLapseTable::from_vec(vec![0.0; 11]).is_err());
    }

    #[test]
    fn test_time_cache_fits_once_per_stamp() {
        let cache = TimeCachedLapse::new();
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2020, 1, 1, 1, 0, 0).unwrap();

        let mut calls = 0;
        let v = cache
            .get_or_fit(t0, || {
                calls += 1;
                Ok(1.0)
            })
            .unwrap();
        assert_eq!(v, 1.0);

        // 同一时间戳不再拟合
        let v = cache.get_or_fit(t0, || panic!("must not refit")).unwrap();
        assert_eq!(v, 1.0);
        assert_eq!(calls, 1);

        // 新时间戳使缓存失效
        let v = cache
            .get_or_fit(t1, || {
                calls += 1;
                Ok(2.0)
            })
            .unwrap();
        assert_eq!(v, 2.0);
        assert_eq!(calls, 2);
        assert_eq!(cache.peek(), Some((t1, 2.0)));
    }
}
