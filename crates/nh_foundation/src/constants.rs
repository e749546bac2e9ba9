// crates/nh_foundation/src/constants.rs

//! 共享常量
//!
//! 定义输入文件与变量存储共用的哨兵值等常量。

/// 缺测哨兵值
///
/// ASCII 气象文件中的缺测单元以及模块写入的"无有效结果"均使用此值。
pub const NODATA: f64 = -9999.0;

/// 一天的秒数
pub const SECONDS_PER_DAY: i64 = 86_400;

/// 判断一个值是否为缺测哨兵
///
/// 比较时带一个小容差，避免文本解析引入的舍入问题。
#[inline]
#[must_use]
pub fn is_nodata(v: f64) -> bool {
    !v.is_finite() || (v - NODATA).abs() < 1e-6
}
