use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::pci::{PciDevice, RegisterError};

/// Pipeline stage in which a decode failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Physical to normalized address (node and channel selection)
    Node,
    /// Normalized address to rank
    Rank,
    /// Rank address to bank, row and column
    Geometry,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Node => write!(f, "node selection"),
            Stage::Rank => write!(f, "rank selection"),
            Stage::Geometry => write!(f, "geometry decoding"),
        }
    }
}

/// Caller-side contract violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidInput {
    /// The physical address has more than 48 bits
    #[error("physical address {0:#x} has more than 48 bits")]
    AddressTooWide(u64),
    /// No candidate node was given
    #[error("no memory-controller nodes given")]
    NoNodes,
    /// More candidate nodes than the northbridge has DRAM base/limit pairs
    #[error("{0} memory-controller nodes given, at most 8 are supported")]
    TooManyNodes(usize),
}

/// Errors that can occur while decoding a physical address.
///
/// Every stage fails fast; no partially decoded address is ever returned.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input violates the decoder contract
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    /// A configuration register could not be read
    #[error("register read failed during {stage}: {source}")]
    RegisterRead {
        /// Stage that issued the read
        stage: Stage,
        /// Underlying accessor error
        #[source]
        source: RegisterError,
    },
    /// No enabled node's base/limit range contains the address
    #[error("physical address {0:#014x} belongs to no node")]
    NoOwningNode(u64),
    /// No enabled chip select matches the normalized address
    #[error("normalized address {normalized:#014x} matches no rank on {device} channel {channel}")]
    NoMatchingRank {
        /// Normalized address that was looked up
        normalized: u64,
        /// Node that owns the address
        device: PciDevice,
        /// Channel that owns the address
        channel: u8,
    },
    /// The DRAM address map uses a mode other than `0b111`
    #[error("DRAM address map mode {mode:#06b} on {device} channel {channel} is not supported")]
    UnsupportedAddressMap {
        /// Mode read from the address map register
        mode: u8,
        /// Node that owns the address
        device: PciDevice,
        /// Channel that owns the address
        channel: u8,
    },
}

impl DecodeError {
    /// Returns the stage in which the error occurred, if it is tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            DecodeError::InvalidInput(_) => None,
            DecodeError::RegisterRead { stage, .. } => Some(*stage),
            DecodeError::NoOwningNode(_) => Some(Stage::Node),
            DecodeError::NoMatchingRank { .. } => Some(Stage::Rank),
            DecodeError::UnsupportedAddressMap { .. } => Some(Stage::Geometry),
        }
    }
}
