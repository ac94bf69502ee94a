pub mod cost;
pub mod currency;
pub mod energy;
pub mod power;
pub mod price;

use std::ops::{Div, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exact decimal quantity tagged with its physical dimensions.
///
/// Accumulating in [`Decimal`] keeps long sums of small readings free of floating-point drift.
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::From,
    derive_more::Neg,
    derive_more::Sub,
    derive_more::SubAssign,
    derive_more::Sum,
)]
#[must_use]
pub struct Quantity<const POWER: isize, const TIME: isize, const COST: isize>(pub Decimal);

impl<const POWER: isize, const TIME: isize, const COST: isize> Quantity<POWER, TIME, COST> {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    #[must_use]
    pub fn is_sign_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> From<i32>
    for Quantity<POWER, TIME, COST>
{
    fn from(value: i32) -> Self {
        Self(Decimal::from(value))
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Mul<Decimal>
    for Quantity<POWER, TIME, COST>
{
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Div<Decimal>
    for Quantity<POWER, TIME, COST>
{
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Div<Self>
    for Quantity<POWER, TIME, COST>
{
    type Output = Decimal;

    fn div(self, rhs: Self) -> Self::Output {
        self.0 / rhs.0
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::{Debug, Formatter};

    use super::*;

    pub type Bare = Quantity<0, 0, 0>;

    impl Debug for Bare {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }

    #[test]
    fn test_min() {
        assert_eq!(Bare::from(1).min(Bare::from(2)), Bare::from(1));
        assert_eq!(Bare::from(2).min(Bare::from(1)), Bare::from(1));
    }

    #[test]
    fn test_max() {
        assert_eq!(Bare::from(1).max(Bare::from(2)), Bare::from(2));
        assert_eq!(Bare::from(2).max(Bare::from(1)), Bare::from(2));
    }

    #[test]
    fn test_clamp() {
        assert_eq!(Bare::from(1).clamp(Bare::from(2), Bare::from(3)), Bare::from(2));
        assert_eq!(Bare::from(4).clamp(Bare::from(2), Bare::from(3)), Bare::from(3));
        assert_eq!(Bare::from(2).clamp(Bare::from(1), Bare::from(3)), Bare::from(2));
    }

    #[test]
    fn test_ratio_is_exact() {
        assert_eq!(Bare::from(1) / Bare::from(4), Decimal::new(25, 2));
    }

    #[test]
    fn test_is_sign_negative() {
        assert!(Bare::from(-1).is_sign_negative());
        assert!(!Bare::ZERO.is_sign_negative());
        assert!(!(-Bare::ZERO).is_sign_negative());
    }
}
