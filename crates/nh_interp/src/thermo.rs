// crates/nh_interp/src/thermo.rs

//! 大气热力学
//!
//! - Magnus 分段饱和水汽压（水面 / 冰面两套参数）
//! - 露点与相对湿度互换
//! - Dodson & Marks (1997) 中性稳定算法使用的
//!   海平面位温正反变换（标准大气静力压）

/// Magnus 水面参数
const AW: f64 = 611.21;
const BW: f64 = 17.502;
const CW: f64 = 240.97;

/// Magnus 冰面参数
const AI: f64 = 611.15;
const BI: f64 = 22.452;
const CI: f64 = 272.55;

/// 冻结温度 [°C]
const T_FREEZE: f64 = 0.0;

/// 海平面标准气压 [Pa]
const P0: f64 = 101_325.0;

/// 位温指数 κ = R/cp
const KAPPA: f64 = 0.286;

/// 0 °C 的开尔文温度
const KELVIN: f64 = 273.15;

/// 饱和水汽压 [Pa]
///
/// `t` 为气温 [°C]；0 °C 以上用水面参数，以下用冰面参数。
#[inline]
#[must_use]
pub fn esat(t: f64) -> f64 {
    if t >= T_FREEZE {
        AW * ((BW * t) / (CW + t)).exp()
    } else {
        AI * ((BI * t) / (CI + t)).exp()
    }
}

/// 由气温与相对湿度求实际水汽压 [Pa]
///
/// `rh` 取百分数 [0, 100]。
#[inline]
#[must_use]
pub fn vapour_pressure(t: f64, rh: f64) -> f64 {
    (rh / 100.0) * esat(t)
}

/// 由气温与相对湿度求露点温度 [°C]
///
/// Magnus 公式的解析反演，使用水面参数。
#[must_use]
pub fn dew_point(t: f64, rh: f64) -> f64 {
    let ea = vapour_pressure(t, rh.max(1e-3));
    let x = (ea / AW).ln();
    CW * x / (BW - x)
}

/// 由气温与露点温度恢复相对湿度 [%]（未截断）
#[must_use]
pub fn rh_from_dew_point(t: f64, td: f64) -> f64 {
    100.0 * esat_water(td) / esat(t)
}

/// 水面 Magnus 公式（露点反演使用）
#[inline]
fn esat_water(t: f64) -> f64 {
    AW * ((BW * t) / (CW + t)).exp()
}

/// 标准大气下高程 `z` [m] 处的静力气压 [Pa]
#[inline]
#[must_use]
pub fn pressure_at(z: f64) -> f64 {
    P0 * (1.0 - 2.255_77e-5 * z).powf(5.255_88)
}

/// 气温换算为海平面位温 [°C 输入，K 输出]
///
/// θ = T_k (p0 / p(z))^κ。与 [`temperature_from_potential`]
/// 构成精确往返。
#[must_use]
pub fn potential_temperature(t: f64, z: f64) -> f64 {
    (t + KELVIN) * (P0 / pressure_at(z)).powf(KAPPA)
}

/// 海平面位温在高程 `z` 处还原为气温 [°C]
#[must_use]
pub fn temperature_from_potential(theta: f64, z: f64) -> f64 {
    theta * (pressure_at(z) / P0).powf(KAPPA) - KELVIN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_esat_reference_points() {
        // 0 °C 时两套参数几乎重合于 611 Pa
        assert!((esat(0.0) - AW).abs() < 1.0);
        // 20 °C 约 2.34 kPa
        let e20 = esat(20.0);
        assert!(e20 > 2200.0 && e20 < 2450.0);
        // 冰面值低于水面外推值
        assert!(esat(-15.0) < esat_water(-15.0) + 1.0);
    }

    #[test]
    fn test_esat_piecewise_continuity() {
        let below = esat(-1e-9);
        let above = esat(1e-9);
        assert!((below - above).abs() < 0.5);
    }

    #[test]
    fn test_dew_point_roundtrip() {
        let t = 12.0;
        let rh = 65.0;
        let td = dew_point(t, rh);
        assert!(td < t);
        let rh_back = rh_from_dew_point(t, td);
        assert!((rh_back - rh).abs() < 1e-6);
    }

    #[test]
    fn test_saturated_dew_point_equals_t() {
        let t = 5.0;
        let td = dew_point(t, 100.0);
        assert!((td - t).abs() < 1e-9);
    }

    #[test]
    fn test_pressure_decreases_with_height() {
        assert!((pressure_at(0.0) - P0).abs() < 1e-9);
        let p1500 = pressure_at(1500.0);
        assert!(p1500 < P0 && p1500 > 80_000.0);
    }

    #[test]
    fn test_potential_temperature_roundtrip() {
        let t = -4.5;
        let z = 2100.0;
        let theta = potential_temperature(t, z);
        let back = temperature_from_potential(theta, z);
        assert!((back - t).abs() < 1e-10);
        // 位温高于实际温度（对正高程）
        assert!(theta > t + KELVIN);
    }
}
