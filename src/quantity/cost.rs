use std::fmt::{Debug, Display, Formatter};

use rust_decimal::RoundingStrategy;

use crate::quantity::Quantity;

pub type Cost = Quantity<0, 0, 1>;

/// Cost accrued per hour, for example by a constant power demand.
pub type HourlyCost = Quantity<0, -1, 1>;

impl Cost {
    /// Round to the given number of decimal places, half away from zero.
    ///
    /// Only presentation code should call this: aggregation keeps the exact value.
    pub fn round_dp(self, decimal_places: u32) -> Self {
        Self(self.0.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Debug for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for HourlyCost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}/h", self.0)
    }
}

impl Debug for HourlyCost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/h", self.0)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_round_dp_half_away_from_zero() {
        assert_eq!(Cost::from(Decimal::new(125, 2)).round_dp(1), Cost::from(Decimal::new(13, 1)));
        assert_eq!(Cost::from(Decimal::new(-125, 2)).round_dp(1), Cost::from(Decimal::new(-13, 1)));
        assert_eq!(Cost::from(Decimal::new(1105, 1)).round_dp(0), Cost::from(111));
    }
}
