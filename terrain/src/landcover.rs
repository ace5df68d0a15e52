//! Land-cover classes and their movement cost multipliers.

use crate::TerrainError;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap};

/// ESA WorldCover class codes.
pub mod esa {
    pub const TREE_COVER: u8 = 10;
    pub const SHRUBLAND: u8 = 20;
    pub const GRASSLAND: u8 = 30;
    pub const CROPLAND: u8 = 40;
    pub const BUILT_UP: u8 = 50;
    pub const BARE: u8 = 60;
    pub const SNOW_ICE: u8 = 70;
    pub const WATER: u8 = 80;
    pub const WETLAND: u8 = 90;
    pub const MANGROVES: u8 = 95;
    pub const MOSS_LICHEN: u8 = 100;
}

/// How a land-cover class affects movement.
///
/// Serialized as a number, or as the string `"impassable"` (`"inf"`
/// is accepted too).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CostRepr", into = "CostRepr")]
pub enum ClassCost {
    /// Scales the slope cost of a cell.
    Multiplier(f64),
    Impassable,
}

impl ClassCost {
    pub fn multiplier(self) -> Option<f64> {
        match self {
            Self::Multiplier(m) => Some(m),
            Self::Impassable => None,
        }
    }

    /// Orders costs from cheapest to impassable.
    pub fn severity(self, other: Self) -> Ordering {
        match (self, other) {
            (Self::Impassable, Self::Impassable) => Ordering::Equal,
            (Self::Impassable, _) => Ordering::Greater,
            (_, Self::Impassable) => Ordering::Less,
            (Self::Multiplier(a), Self::Multiplier(b)) => a.total_cmp(&b),
        }
    }

    fn is_valid(self) -> bool {
        match self {
            Self::Multiplier(m) => m.is_finite() && m >= 0.0,
            Self::Impassable => true,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CostRepr {
    Number(f64),
    Word(String),
}

impl TryFrom<CostRepr> for ClassCost {
    type Error = String;

    fn try_from(repr: CostRepr) -> Result<Self, Self::Error> {
        match repr {
            CostRepr::Number(m) if m.is_finite() && m >= 0.0 => Ok(Self::Multiplier(m)),
            CostRepr::Number(m) => Err(format!("invalid cost multiplier {m}")),
            CostRepr::Word(word) => match word.to_ascii_lowercase().as_str() {
                "impassable" | "inf" => Ok(Self::Impassable),
                _ => Err(format!("unknown cost {word:?}")),
            },
        }
    }
}

impl From<ClassCost> for CostRepr {
    fn from(cost: ClassCost) -> Self {
        match cost {
            ClassCost::Multiplier(m) => Self::Number(m),
            ClassCost::Impassable => Self::Word("impassable".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandCoverClass {
    pub label: String,
    pub cost: ClassCost,
}

impl LandCoverClass {
    pub fn new(label: impl Into<String>, cost: ClassCost) -> Self {
        Self {
            label: label.into(),
            cost,
        }
    }
}

/// Lookup from land-cover class code to cost and label.
///
/// Codes missing from the table use `default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTable {
    classes: BTreeMap<u8, LandCoverClass>,
    default: LandCoverClass,
}

impl CostTable {
    pub fn new(
        classes: BTreeMap<u8, LandCoverClass>,
        default: LandCoverClass,
    ) -> Result<Self, TerrainError> {
        let table = Self { classes, default };
        table.validate()?;
        Ok(table)
    }

    /// The ESA WorldCover 2021 legend. Built-up areas and open water
    /// are impassable.
    pub fn esa_worldcover() -> Self {
        use ClassCost::{Impassable, Multiplier};
        let classes = [
            (esa::TREE_COVER, "tree cover", Multiplier(1.5)),
            (esa::SHRUBLAND, "shrubland", Multiplier(1.3)),
            (esa::GRASSLAND, "grassland", Multiplier(1.0)),
            (esa::CROPLAND, "cropland", Multiplier(1.2)),
            (esa::BUILT_UP, "built-up", Impassable),
            (esa::BARE, "bare / sparse vegetation", Multiplier(1.0)),
            (esa::SNOW_ICE, "snow and ice", Multiplier(2.0)),
            (esa::WATER, "permanent water", Impassable),
            (esa::WETLAND, "herbaceous wetland", Multiplier(3.0)),
            (esa::MANGROVES, "mangroves", Multiplier(4.0)),
            (esa::MOSS_LICHEN, "moss and lichen", Multiplier(1.2)),
        ]
        .into_iter()
        .map(|(code, label, cost)| (code, LandCoverClass::new(label, cost)))
        .collect();
        Self {
            classes,
            default: LandCoverClass::new("unknown", Multiplier(1.0)),
        }
    }

    /// Returns an error for the first class with a negative or
    /// non-finite multiplier.
    pub fn validate(&self) -> Result<(), TerrainError> {
        let default = (&0, &self.default);
        for (&class, entry) in self.classes.iter().chain(std::iter::once(default)) {
            if !entry.cost.is_valid() {
                return Err(TerrainError::CostTable {
                    class,
                    cost: entry.cost.multiplier().unwrap_or(f64::NAN),
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, class: u8) -> &LandCoverClass {
        self.classes.get(&class).unwrap_or(&self.default)
    }

    pub fn cost(&self, class: u8) -> ClassCost {
        self.get(class).cost
    }

    pub fn label(&self, class: u8) -> &str {
        &self.get(class).label
    }

    /// Returns whichever of `a` and `b` is harder to cross, preferring
    /// `a` on ties.
    pub fn worse(&self, a: u8, b: u8) -> u8 {
        match self.cost(b).severity(self.cost(a)) {
            Ordering::Greater => b,
            _ => a,
        }
    }
}

impl Default for CostTable {
    fn default() -> Self {
        Self::esa_worldcover()
    }
}
