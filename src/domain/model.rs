use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the initial-volume table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidRecord {
    #[serde(rename = "Initial_Wells")]
    pub well_location: String,
    /// Raw number as written in the table; its unit comes from configuration.
    #[serde(rename = "Initial_Volume")]
    pub initial_volume: f64,
    #[serde(rename = "Liquid_Name")]
    pub name: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Color")]
    pub color: String,
}

/// One row of the transfer table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    #[serde(rename = "Source_Well")]
    pub source_well: String,
    #[serde(rename = "Destination_Well")]
    pub destination_well: String,
    #[serde(rename = "Transfer_Volume")]
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeUnit {
    #[serde(rename = "uL", alias = "ul", alias = "µL")]
    Microliters,
    #[serde(rename = "mL", alias = "ml")]
    Milliliters,
}

impl VolumeUnit {
    pub fn microliters_per_unit(self) -> f64 {
        match self {
            VolumeUnit::Microliters => 1.0,
            VolumeUnit::Milliliters => 1000.0,
        }
    }
}

impl fmt::Display for VolumeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeUnit::Microliters => write!(f, "uL"),
            VolumeUnit::Milliliters => write!(f, "mL"),
        }
    }
}

/// A liquid volume, always stored in microliters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Volume(f64);

impl Volume {
    pub const ZERO: Volume = Volume(0.0);

    pub fn from_unit(value: f64, unit: VolumeUnit) -> Self {
        Volume(value * unit.microliters_per_unit())
    }

    pub fn microliters(value: f64) -> Self {
        Volume(value)
    }

    pub fn as_microliters(self) -> f64 {
        self.0
    }

    pub fn as_unit(self, unit: VolumeUnit) -> f64 {
        self.0 / unit.microliters_per_unit()
    }
}

impl std::ops::Add for Volume {
    type Output = Volume;

    fn add(self, rhs: Volume) -> Volume {
        Volume(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Volume {
    type Output = Volume;

    fn sub(self, rhs: Volume) -> Volume {
        Volume(self.0 - rhs.0)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} uL", self.0)
    }
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub usize);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle!(
    /// Labware loaded on the deck or on a module.
    LabwareHandle,
    "labware"
);
handle!(ModuleHandle, "module");
handle!(InstrumentHandle, "pipette");
handle!(
    /// A liquid identity issued by the session's liquid registry.
    LiquidHandle,
    "liquid"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mount {
    Left,
    Right,
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mount::Left => write!(f, "left"),
            Mount::Right => write!(f, "right"),
        }
    }
}

/// Deck slots are numbered 1 through 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeckSlot(pub u8);

impl DeckSlot {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 11;
}

impl fmt::Display for DeckSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// Where inside a well the pipette moves to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "anchor", rename_all = "lowercase")]
pub enum WellAnchor {
    /// Relative to the top of the well; negative offsets go down into it.
    Top {
        #[serde(default)]
        offset_mm: f64,
    },
    Bottom {
        #[serde(default)]
        offset_mm: f64,
    },
    /// The instrument's own reference point for the well.
    Default,
}

impl Default for WellAnchor {
    fn default() -> Self {
        WellAnchor::Default
    }
}

impl fmt::Display for WellAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WellAnchor::Top { offset_mm } => write!(f, "top({offset_mm:+} mm)"),
            WellAnchor::Bottom { offset_mm } => write!(f, "bottom({offset_mm:+} mm)"),
            WellAnchor::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub labware: LabwareHandle,
    pub well: String,
    pub anchor: WellAnchor,
}

impl Location {
    pub fn new(labware: LabwareHandle, well: impl Into<String>, anchor: WellAnchor) -> Self {
        Self {
            labware,
            well: well.into(),
            anchor,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] @ {}", self.labware, self.well, self.anchor)
    }
}
