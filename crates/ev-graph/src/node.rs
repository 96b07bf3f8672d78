use std::collections::BTreeSet;

use ev_core::Xy;

use crate::chain::ChainId;

/// Topologically significant pixel and the chains that meet there.
///
/// A closed loop contributes its id once even though both chain ends sit on
/// the anchor node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub position: Xy,
    pub chains: BTreeSet<ChainId>,
}

impl Node {
    pub fn new(position: Xy) -> Self {
        Self {
            position,
            chains: BTreeSet::new(),
        }
    }

    pub fn degree(&self) -> usize {
        self.chains.len()
    }
}
