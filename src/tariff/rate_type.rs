use std::fmt::{Display, Formatter};

use enumset::{EnumSet, EnumSetType, enum_set};
use serde::{Deserialize, Serialize};

#[derive(Debug, Hash, Ord, PartialOrd, Deserialize, Serialize, EnumSetType)]
#[serde(rename_all = "kebab-case")]
#[enumset(serialize_repr = "list")]
pub enum RateType {
    Peak,

    #[serde(alias = "off_peak", alias = "offpeak")]
    OffPeak,

    /// Extra cheap slot granted by the provider, for example for smart EV charging.
    Dispatch,

    Standard,
}

impl RateType {
    /// Rate types that open a window worth counting down to.
    pub const WINDOWED: EnumSet<Self> = enum_set!(Self::OffPeak | Self::Dispatch);

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Peak => "peak",
            Self::OffPeak => "off-peak",
            Self::Dispatch => "dispatch",
            Self::Standard => "standard",
        }
    }
}

impl Display for RateType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
