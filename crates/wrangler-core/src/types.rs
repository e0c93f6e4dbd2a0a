use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::WranglerError;

pub type ObjectiveId = u32;
pub type ActorId = u32;
pub type ZoneId = u32;
pub type ItemId = u32;

// ---------------------------------------------------------------------------
// ClassJob
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassJob {
    Carpenter,
    Blacksmith,
    Armorer,
    Goldsmith,
    Leatherworker,
    Weaver,
    Alchemist,
    Culinarian,
    Miner,
    Botanist,
    Fisher,
}

impl ClassJob {
    pub fn all() -> &'static [ClassJob] {
        &[
            ClassJob::Carpenter,
            ClassJob::Blacksmith,
            ClassJob::Armorer,
            ClassJob::Goldsmith,
            ClassJob::Leatherworker,
            ClassJob::Weaver,
            ClassJob::Alchemist,
            ClassJob::Culinarian,
            ClassJob::Miner,
            ClassJob::Botanist,
            ClassJob::Fisher,
        ]
    }

    pub fn gatherers() -> &'static [ClassJob] {
        &[ClassJob::Miner, ClassJob::Botanist, ClassJob::Fisher]
    }

    pub fn crafters() -> &'static [ClassJob] {
        &ClassJob::all()[..8]
    }

    pub fn is_gatherer(self) -> bool {
        matches!(self, ClassJob::Miner | ClassJob::Botanist | ClassJob::Fisher)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClassJob::Carpenter => "carpenter",
            ClassJob::Blacksmith => "blacksmith",
            ClassJob::Armorer => "armorer",
            ClassJob::Goldsmith => "goldsmith",
            ClassJob::Leatherworker => "leatherworker",
            ClassJob::Weaver => "weaver",
            ClassJob::Alchemist => "alchemist",
            ClassJob::Culinarian => "culinarian",
            ClassJob::Miner => "miner",
            ClassJob::Botanist => "botanist",
            ClassJob::Fisher => "fisher",
        }
    }

    /// Human-readable name, also the value of the order wire `Type` field
    /// for crafters.
    pub fn display_name(self) -> &'static str {
        match self {
            ClassJob::Carpenter => "Carpenter",
            ClassJob::Blacksmith => "Blacksmith",
            ClassJob::Armorer => "Armorer",
            ClassJob::Goldsmith => "Goldsmith",
            ClassJob::Leatherworker => "Leatherworker",
            ClassJob::Weaver => "Weaver",
            ClassJob::Alchemist => "Alchemist",
            ClassJob::Culinarian => "Culinarian",
            ClassJob::Miner => "Miner",
            ClassJob::Botanist => "Botanist",
            ClassJob::Fisher => "Fisher",
        }
    }

    pub fn order_type(self) -> &'static str {
        if self.is_gatherer() {
            "Gather"
        } else {
            self.display_name()
        }
    }
}

impl fmt::Display for ClassJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for ClassJob {
    type Err = WranglerError;

    /// Case-insensitive; accepts the `ClassJobType.` prefix used in program
    /// conditions (`ClassJobType.Miner`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let name = trimmed
            .strip_prefix("ClassJobType.")
            .unwrap_or(trimmed)
            .to_ascii_lowercase();
        ClassJob::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| WranglerError::UnknownClass(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.z)
    }
}

impl std::str::FromStr for Position {
    type Err = String;

    /// Parses `"x, y, z"` (whitespace optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("expected 'x, y, z', got '{s}'"));
        }
        let mut coords = [0f32; 3];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            *slot = part
                .parse::<f32>()
                .map_err(|e| format!("invalid coordinate '{part}': {e}"))?;
        }
        Ok(Position::new(coords[0], coords[1], coords[2]))
    }
}

// ---------------------------------------------------------------------------
// ItemQuality
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemQuality {
    Any,
    High,
    Normal,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
