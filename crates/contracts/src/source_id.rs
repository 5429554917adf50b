//! SourceId - closed set of instrument sources
//!
//! The hub serves exactly three sources: two SPU channels and the PLC.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ContractError, SourceSnapshot};

/// Source identifier.
///
/// Used as the snapshot store slot index and as the block name in the
/// text encoding.
///
/// # Examples
/// ```
/// use contracts::SourceId;
///
/// let id: SourceId = "spu_ch_b".parse().unwrap();
/// assert_eq!(id, SourceId::SpuChB);
/// assert_eq!(id.wire_key(), "SPU_CHB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// SPU channel A (serial)
    SpuChA,
    /// SPU channel B (serial)
    SpuChB,
    /// Reactor PLC (network)
    Plc,
}

impl SourceId {
    /// All sources, in wire order
    pub const ALL: [SourceId; 3] = [SourceId::SpuChA, SourceId::SpuChB, SourceId::Plc];

    /// Dense index (0..3), same order as `ALL`
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::SpuChA => 0,
            Self::SpuChB => 1,
            Self::Plc => 2,
        }
    }

    /// Block name in the text encoding
    pub const fn wire_key(self) -> &'static str {
        match self {
            Self::SpuChA => "SPU_CHA",
            Self::SpuChB => "SPU_CHB",
            Self::Plc => "PLC",
        }
    }

    /// Key used in configuration files
    pub const fn config_key(self) -> &'static str {
        match self {
            Self::SpuChA => "spu_ch_a",
            Self::SpuChB => "spu_ch_b",
            Self::Plc => "plc",
        }
    }

    /// Whether this source produces SPU-shaped snapshots
    pub const fn is_spu(self) -> bool {
        matches!(self, Self::SpuChA | Self::SpuChB)
    }

    /// Check that a snapshot has the shape this source produces
    pub fn accepts(self, snapshot: &SourceSnapshot) -> bool {
        match snapshot {
            SourceSnapshot::Spu(_) => self.is_spu(),
            SourceSnapshot::Plc(_) => !self.is_spu(),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

impl FromStr for SourceId {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceId::ALL
            .into_iter()
            .find(|id| id.config_key().eq_ignore_ascii_case(s) || id.wire_key().eq_ignore_ascii_case(s))
            .ok_or_else(|| ContractError::Other(format!("unknown source '{s}'")))
    }
}
