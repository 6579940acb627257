//! The house entity and its display color mapping.
//!
//! Houses are seeded once out-of-band; this application only ever
//! mutates their point totals (via approval, manual points, or admin
//! edits). The id → color table must match the seeded house rows.

use serde::{Deserialize, Serialize};

use crate::types::HouseId;

/// A team/cohort entity accumulating points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    /// Stable short key, e.g. `"kotuku"`.
    pub id: HouseId,
    /// Display name, e.g. `"Kōtuku"`.
    pub name: String,
    /// Current point total. Policy says ≥ 0 but this is not enforced
    /// client-side; the gateway owns the authoritative value.
    pub points: i64,
}

impl House {
    /// The display color pair for this house, derived from its id.
    pub fn color(&self) -> HouseColor {
        HouseColor::for_house(&self.id)
    }
}

/// Display color assigned to a house.
///
/// Unknown house ids fall back to [`HouseColor::Gray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HouseColor {
    Blue,
    Purple,
    Green,
    Yellow,
    Gray,
}

/// Seeded house ids and their colors.
const HOUSE_COLORS: &[(&str, HouseColor)] = &[
    ("pukeko", HouseColor::Blue),
    ("keruru", HouseColor::Purple),
    ("korimako", HouseColor::Green),
    ("kotuku", HouseColor::Yellow),
];

impl HouseColor {
    /// Look up the color for a house id.
    pub fn for_house(id: &str) -> Self {
        HOUSE_COLORS
            .iter()
            .find(|(house, _)| *house == id)
            .map(|(_, color)| *color)
            .unwrap_or(HouseColor::Gray)
    }

    /// ANSI foreground escape code for terminal rendering.
    pub fn ansi_fg(&self) -> &'static str {
        match self {
            HouseColor::Blue => "\x1b[34m",
            HouseColor::Purple => "\x1b[35m",
            HouseColor::Green => "\x1b[32m",
            HouseColor::Yellow => "\x1b[33m",
            HouseColor::Gray => "\x1b[90m",
        }
    }

    /// ANSI background escape code for terminal rendering.
    pub fn ansi_bg(&self) -> &'static str {
        match self {
            HouseColor::Blue => "\x1b[44m",
            HouseColor::Purple => "\x1b[45m",
            HouseColor::Green => "\x1b[42m",
            HouseColor::Yellow => "\x1b[43m",
            HouseColor::Gray => "\x1b[100m",
        }
    }
}
