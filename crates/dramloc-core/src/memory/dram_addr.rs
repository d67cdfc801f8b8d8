use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::decode::{Geometry, NodeResolution, RankResolution};

/// DRAM address with node, channel, rank, bank, row, and column components.
///
/// Represents the physical organization of a memory address in DRAM,
/// decoded from a physical address using the northbridge configuration.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub struct DramAddr {
    /// Node id of the memory controller
    pub node: usize,
    /// Channel (DCT) within the node
    pub channel: usize,
    /// Rank (chip select) within the channel
    pub rank: usize,
    /// Bank number
    pub bank: usize,
    /// Row number
    pub row: usize,
    /// Column number
    pub col: usize,
}

impl Display for DramAddr {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        write!(
            fmt,
            "(node {}, channel {}, rank {}, bank {}, row {}, col {})",
            self.node, self.channel, self.rank, self.bank, self.row, self.col
        )
    }
}

impl DramAddr {
    /// Creates a new DRAM address.
    ///
    /// # Arguments
    ///
    /// * `node` - Node id
    /// * `channel` - Channel number
    /// * `rank` - Rank number
    /// * `bank` - Bank number
    /// * `row` - Row number
    /// * `col` - Column number
    pub fn new(
        node: usize,
        channel: usize,
        rank: usize,
        bank: usize,
        row: usize,
        col: usize,
    ) -> Self {
        DramAddr {
            node,
            channel,
            rank,
            bank,
            row,
            col,
        }
    }

    /// Assembles a DRAM address from the results of the three decoding stages.
    pub fn from_stages(node: &NodeResolution, rank: &RankResolution, geometry: &Geometry) -> Self {
        DramAddr {
            node: node.node as usize,
            channel: node.channel as usize,
            rank: rank.rank as usize,
            bank: geometry.bank as usize,
            row: geometry.row as usize,
            col: geometry.col as usize,
        }
    }
}
