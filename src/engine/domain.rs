//! Domain and engine identifiers
//!
//! A `Domain` is what the content side selects; an `EngineId` is the synth
//! that plays it. The mapping is not one-to-one: Marketing borrows the
//! Relationship engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AmbienteError;

/// Identity of one of the six synthesis engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineId {
    Ambient,
    Geometry,
    Medicine,
    Tantra,
    Relationship,
    Tarot,
}

impl EngineId {
    /// All engines, in construction order
    pub const ALL: [EngineId; 6] = [
        EngineId::Ambient,
        EngineId::Geometry,
        EngineId::Medicine,
        EngineId::Tantra,
        EngineId::Relationship,
        EngineId::Tarot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineId::Ambient => "ambient",
            EngineId::Geometry => "geometry",
            EngineId::Medicine => "medicine",
            EngineId::Tantra => "tantra",
            EngineId::Relationship => "relationship",
            EngineId::Tarot => "tarot",
        }
    }

    /// Per-engine salt mixed into the global seed
    pub fn seed_salt(&self) -> u64 {
        match self {
            EngineId::Ambient => 0x9E37_79B9_7F4A_7C15,
            EngineId::Geometry => 0xBF58_476D_1CE4_E5B9,
            EngineId::Medicine => 0x94D0_49BB_1331_11EB,
            EngineId::Tantra => 0xD6E8_FEB8_6659_FD93,
            EngineId::Relationship => 0xA076_1D64_78BD_642F,
            EngineId::Tarot => 0xE703_7ED1_A0B4_28DB,
        }
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Content domain selected by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Home,
    Geometry,
    Medicine,
    Tantra,
    Relationship,
    Marketing,
    Tarot,
}

impl Domain {
    pub const ALL: [Domain; 7] = [
        Domain::Home,
        Domain::Geometry,
        Domain::Medicine,
        Domain::Tantra,
        Domain::Relationship,
        Domain::Marketing,
        Domain::Tarot,
    ];

    /// Engine that plays this domain unless the route table says otherwise
    pub fn default_engine(&self) -> EngineId {
        match self {
            Domain::Home => EngineId::Ambient,
            Domain::Geometry => EngineId::Geometry,
            Domain::Medicine => EngineId::Medicine,
            Domain::Tantra => EngineId::Tantra,
            Domain::Relationship | Domain::Marketing => EngineId::Relationship,
            Domain::Tarot => EngineId::Tarot,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Home => "home",
            Domain::Geometry => "geometry",
            Domain::Medicine => "medicine",
            Domain::Tantra => "tantra",
            Domain::Relationship => "relationship",
            Domain::Marketing => "marketing",
            Domain::Tarot => "tarot",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Domain {
    type Err = AmbienteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "home" | "ambient" => Ok(Domain::Home),
            "geometry" => Ok(Domain::Geometry),
            "medicine" => Ok(Domain::Medicine),
            "tantra" => Ok(Domain::Tantra),
            "relationship" | "relationships" => Ok(Domain::Relationship),
            "marketing" => Ok(Domain::Marketing),
            "tarot" => Ok(Domain::Tarot),
            _ => Err(AmbienteError::UnknownDomain { tag: s.to_string() }),
        }
    }
}
