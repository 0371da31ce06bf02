//! Gear categories and meetup spots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::errors::GearError;

/// Category of rentable gear.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Bicycles and e-bikes.
    Bicycles,
    /// Skis and snowboards.
    SkisSnowboards,
    /// Tents, stoves, sleeping bags.
    Camping,
    /// Kayaks, paddleboards.
    WaterSports,
    /// Snowshoes, winter apparel.
    WinterGear,
    /// Ropes, harnesses.
    Climbing,
    /// Garden tools.
    GardenTools,
    /// Hiking gear.
    Hiking,
    /// Cameras and lenses.
    Photography,
}

impl Category {
    /// Every category, in menu order.
    pub const ALL: [Self; 9] = [
        Self::Bicycles,
        Self::SkisSnowboards,
        Self::Camping,
        Self::WaterSports,
        Self::WinterGear,
        Self::Climbing,
        Self::GardenTools,
        Self::Hiking,
        Self::Photography,
    ];

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Bicycles => "Bicycles & E-Bikes",
            Self::SkisSnowboards => "Skis & Snowboards",
            Self::Camping => "Camping Gear",
            Self::WaterSports => "Water Sports",
            Self::WinterGear => "Winter Gear",
            Self::Climbing => "Climbing Equipment",
            Self::GardenTools => "Garden & Tools",
            Self::Hiking => "Hiking Gear",
            Self::Photography => "Photography Equipment",
        }
    }

    /// URL slug used by the browse page.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Bicycles => "bicycles",
            Self::SkisSnowboards => "skis-snowboards",
            Self::Camping => "camping",
            Self::WaterSports => "water-sports",
            Self::WinterGear => "winter-gear",
            Self::Climbing => "climbing",
            Self::GardenTools => "garden",
            Self::Hiking => "hiking",
            Self::Photography => "photography",
        }
    }

    /// Resolve a URL slug.
    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.slug() == slug)
    }

    /// Resolve a display label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    /// Stable storage key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bicycles => "bicycles",
            Self::SkisSnowboards => "skis_snowboards",
            Self::Camping => "camping",
            Self::WaterSports => "water_sports",
            Self::WinterGear => "winter_gear",
            Self::Climbing => "climbing",
            Self::GardenTools => "garden_tools",
            Self::Hiking => "hiking",
            Self::Photography => "photography",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = GearError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == value)
            .ok_or_else(|| GearError::invalid(format!("unknown category: {value}")))
    }
}

/// Public places where renters and owners hand gear over.
pub const MEETUP_SPOTS: [&str; 10] = [
    "Green Lake Park",
    "Gas Works Park",
    "Discovery Park",
    "Alki Beach",
    "University District",
    "Pike Place Market",
    "Capitol Hill Light Rail Station",
    "Northgate Mall",
    "SeaTac Airport",
    "Westlake Center",
];

/// Whether `spot` is one of [`MEETUP_SPOTS`].
#[must_use]
pub fn is_meetup_spot(spot: &str) -> bool {
    MEETUP_SPOTS.contains(&spot)
}
