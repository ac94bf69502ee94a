use std::fmt::{Debug, Display, Formatter};

use crate::quantity::Quantity;

/// Price of one kilowatt-hour in the tariff currency.
pub type KilowattHourPrice = Quantity<-1, -1, 1>;

impl Display for KilowattHourPrice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/kWh", self.0.normalize())
    }
}

impl Debug for KilowattHourPrice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/kWh", self.0)
    }
}
