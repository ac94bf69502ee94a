use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::quantity::cost::Cost;

/// Tariff currencies the core knows how to present.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Jpy,
    Gbp,
    Eur,
    Usd,
}

impl Currency {
    /// [ISO 4217][1] minor unit exponent.
    ///
    /// [1]: https://en.wikipedia.org/wiki/ISO_4217
    #[must_use]
    pub const fn minor_units(self) -> u32 {
        match self {
            Self::Jpy => 0,
            Self::Gbp | Self::Eur | Self::Usd => 2,
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Jpy => "¥",
            Self::Gbp => "£",
            Self::Eur => "€",
            Self::Usd => "$",
        }
    }

    /// Round the cost for presentation.
    pub fn round(self, cost: Cost) -> Cost {
        cost.round_dp(self.minor_units())
    }

    /// Format the cost rounded to the minor unit, with the currency symbol.
    #[must_use]
    pub fn format(self, cost: Cost) -> String {
        let rounded = self.round(cost).0;
        let precision = self.minor_units() as usize;
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
        format!("{sign}{}{:.precision$}", self.symbol(), rounded.abs())
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Self::Jpy => "JPY",
            Self::Gbp => "GBP",
            Self::Eur => "EUR",
            Self::Usd => "USD",
        };
        f.write_str(code)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_format_yen() {
        assert_eq!(Currency::Jpy.format(Cost::from(Decimal::new(1105, 1))), "¥111");
    }

    #[test]
    fn test_format_pounds() {
        assert_eq!(Currency::Gbp.format(Cost::from(Decimal::new(-12345, 3))), "-£12.35");
    }

    #[test]
    fn test_format_pads_minor_units() {
        assert_eq!(Currency::Eur.format(Cost::from(12)), "€12.00");
    }

    #[test]
    fn test_rejects_unknown_code() {
        assert!(serde_json::from_str::<Currency>(r#""XYZ""#).is_err());
        assert_eq!(serde_json::from_str::<Currency>(r#""JPY""#).unwrap(), Currency::Jpy);
    }
}
