use std::{
    fmt::{Debug, Display, Formatter},
    ops::Mul,
};

use crate::quantity::{Quantity, cost::Cost, price::KilowattHourPrice};

pub type KilowattHours = Quantity<1, 1, 0>;

impl Display for KilowattHours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} kWh", self.0)
    }
}

impl Debug for KilowattHours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}kWh", self.0)
    }
}

impl Mul<KilowattHourPrice> for KilowattHours {
    type Output = Cost;

    fn mul(self, rhs: KilowattHourPrice) -> Self::Output {
        Cost::from(self.0 * rhs.0)
    }
}
