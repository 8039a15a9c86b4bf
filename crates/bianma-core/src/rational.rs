//! 有理数类型, 用于时间基 (time_base)、帧率、宽高比等场景.
//!
//! 对标 FFmpeg 的 `AVRational` 与 `av_rescale_q`.

use std::fmt;
use std::str::FromStr;

use crate::error::BianmaError;
use crate::timestamp::NOPTS_VALUE;

/// 有理数, 由分子和分母组成
///
/// 广泛用于表示时间基 (time_base)、帧率、宽高比等.
/// 例如: 时间基 1/90000 表示 90kHz 时钟, 帧率 30000/1001 表示 29.97fps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 创建新的有理数
    ///
    /// # 参数
    /// - `num`: 分子
    /// - `den`: 分母 (不应为 0)
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 零值
    pub const ZERO: Self = Self { num: 0, den: 1 };

    /// 未定义 (分母为 0)
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    /// 判断是否有效 (分母不为 0)
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 是否为正有理数 (可作为帧率或时间基)
    pub const fn is_positive(&self) -> bool {
        self.den != 0 && (self.num > 0) == (self.den > 0) && self.num != 0
    }

    /// 转换为 f64 浮点数
    ///
    /// 如果分母为 0, 返回 `f64::NAN`.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 对有理数进行约分
    pub fn reduce(self) -> Self {
        if self.den == 0 {
            return self;
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs());
        if g == 0 {
            return self;
        }
        let g = g as i32;
        // 保证分母为正
        let sign = if self.den < 0 { -1 } else { 1 };
        Self {
            num: sign * self.num / g,
            den: sign * self.den / g,
        }
    }

    /// 求倒数
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }
}

/// 将 `value` 从时间基 `from` 换算到时间基 `to`
///
/// value * from.num * to.den / (from.den * to.num), 全程 i128 精确计算,
/// 仅在最后一步四舍五入 (0.5 远离零). 两个时间基成整数倍关系时结果精确.
///
/// `NOPTS_VALUE` 原样返回; 任一时间基无效时返回 `NOPTS_VALUE`.
pub fn rescale_q(value: i64, from: Rational, to: Rational) -> i64 {
    if value == NOPTS_VALUE {
        return NOPTS_VALUE;
    }
    let mut num = i128::from(value) * i128::from(from.num) * i128::from(to.den);
    let mut den = i128::from(from.den) * i128::from(to.num);
    if den == 0 || !from.is_valid() {
        return NOPTS_VALUE;
    }
    if den < 0 {
        num = -num;
        den = -den;
    }
    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        -((-num + half) / den)
    };
    rounded.clamp(i128::from(i64::MIN + 1), i128::from(i64::MAX)) as i64
}

impl std::ops::Mul for Rational {
    type Output = Self;

    /// 两个有理数相乘
    fn mul(self, other: Self) -> Self {
        Self {
            num: self.num * other.num,
            den: self.den * other.den,
        }
        .reduce()
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rational {
    type Err = BianmaError;

    /// 解析 "30000/1001" 或 "30" 形式
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|_| BianmaError::InvalidArgument(format!("无法解析有理数: {s}")))
        };
        let r = match s.split_once('/') {
            Some((num, den)) => Self::new(parse(num)?, parse(den)?),
            None => Self::new(parse(s)?, 1),
        };
        if !r.is_valid() {
            return Err(BianmaError::InvalidArgument(format!("分母为 0: {s}")));
        }
        Ok(r)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self { num, den }
    }
}

impl From<i32> for Rational {
    fn from(num: i32) -> Self {
        Self { num, den: 1 }
    }
}

/// 求最大公约数 (欧几里得算法)
fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_basic_creation() {
        let r = Rational::new(1, 30);
        assert_eq!(r.num, 1);
        assert_eq!(r.den, 30);
        assert!(r.is_positive());
        assert!(!Rational::ZERO.is_positive());
    }

    #[test]
    fn test_rational_reduce() {
        let r = Rational::new(30, 60).reduce();
        assert_eq!(r, Rational::new(1, 2));
    }

    #[test]
    fn test_rational_invalid_value() {
        let r = Rational::UNDEFINED;
        assert!(!r.is_valid());
        assert!(r.to_f64().is_nan());
    }

    #[test]
    fn test_rational_display_与解析() {
        let r = Rational::new(30000, 1001);
        assert_eq!(format!("{r}"), "30000/1001");
        assert_eq!("30000/1001".parse::<Rational>().unwrap(), r);
        assert_eq!("25".parse::<Rational>().unwrap(), Rational::new(25, 1));
        assert!("1/0".parse::<Rational>().is_err());
        assert!("abc".parse::<Rational>().is_err());
    }

    #[test]
    fn test_rescale_整数倍精确() {
        let codec_tb = Rational::new(1, 30);
        let stream_tb = Rational::new(1, 90000);
        for pts in 0..1000i64 {
            assert_eq!(rescale_q(pts, codec_tb, stream_tb), pts * 3000);
        }
        // 反方向同样精确
        assert_eq!(rescale_q(9000, stream_tb, codec_tb), 3);
    }

    #[test]
    fn test_rescale_四舍五入() {
        // 1/3 秒 -> 毫秒: 333.33 -> 333
        assert_eq!(rescale_q(1, Rational::new(1, 3), Rational::new(1, 1000)), 333);
        // 2/3 秒 -> 毫秒: 666.67 -> 667
        assert_eq!(rescale_q(2, Rational::new(1, 3), Rational::new(1, 1000)), 667);
        // 正好 0.5 远离零
        assert_eq!(rescale_q(1, Rational::new(1, 2), Rational::new(1, 1)), 1);
        assert_eq!(rescale_q(-1, Rational::new(1, 2), Rational::new(1, 1)), -1);
    }

    #[test]
    fn test_rescale_无效值透传() {
        assert_eq!(
            rescale_q(NOPTS_VALUE, Rational::new(1, 30), Rational::new(1, 1000)),
            NOPTS_VALUE
        );
        assert_eq!(
            rescale_q(5, Rational::new(1, 30), Rational::UNDEFINED),
            NOPTS_VALUE
        );
    }

    #[test]
    fn test_rescale_ntsc_帧率() {
        // 30000/1001 帧率, 第 30000 帧 -> 1001 秒
        let tb = Rational::new(1001, 30000);
        assert_eq!(rescale_q(30000, tb, Rational::new(1, 1)), 1001);
        assert_eq!(rescale_q(1, tb, Rational::new(1, 90000)), 3003);
    }
}
