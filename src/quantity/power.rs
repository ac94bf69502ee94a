use std::{
    fmt::{Debug, Display, Formatter},
    ops::Mul,
};

use crate::quantity::{Quantity, cost::HourlyCost, price::KilowattHourPrice};

pub type Kilowatts = Quantity<1, 0, 0>;

impl Kilowatts {
    pub fn from_watts(watts: u32) -> Self {
        Self(rust_decimal::Decimal::new(i64::from(watts), 3))
    }
}

impl Display for Kilowatts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} kW", self.0)
    }
}

impl Debug for Kilowatts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}kW", self.0)
    }
}

impl Mul<KilowattHourPrice> for Kilowatts {
    type Output = HourlyCost;

    fn mul(self, rhs: KilowattHourPrice) -> Self::Output {
        HourlyCost::from(self.0 * rhs.0)
    }
}
