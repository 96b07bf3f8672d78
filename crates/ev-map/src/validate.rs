use core::fmt;
use std::collections::BTreeSet;

use ev_core::Xy;
use ev_graph::ChainId;

use crate::pixelmap::PixelMap;

/// A broken structural invariant of a [`PixelMap`].
///
/// These are programmer errors, not recoverable conditions: edits and
/// rebuilds must leave the grid flags, the node registry and the chain
/// collection in agreement. [`validate`] reports the first counterexample it
/// finds, in deterministic scan order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsistencyError {
    NodeFlagOffEdge { at: Xy },
    NodeKeyMismatch { key: Xy, stored: Xy },
    PredicateFailed { at: Xy, count: u8 },
    RegisteredSingleton { at: Xy },
    RegisteredBristle { at: Xy },
    BadNeighbourCount { at: Xy, total: u8, plain: u8 },
    UnregisteredEndpoint { chain: ChainId, at: Xy },
    MissingIncidence { chain: ChainId, at: Xy },
    StaleIncidence { at: Xy, chain: ChainId },
    RegisteredNotFlagged { at: Xy },
    UnregisteredDataNode { at: Xy },
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeFlagOffEdge { at } => {
                write!(f, "NODE flag without EDGE at ({}, {})", at.x, at.y)
            }
            Self::NodeKeyMismatch { key, stored } => write!(
                f,
                "node registered at ({}, {}) stores position ({}, {})",
                key.x, key.y, stored.x, stored.y
            ),
            Self::PredicateFailed { at, count } => write!(
                f,
                "node at ({}, {}) has {count} edge neighbours and is not a loop anchor",
                at.x, at.y
            ),
            Self::RegisteredSingleton { at } => {
                write!(f, "singleton at ({}, {}) is registered as a node", at.x, at.y)
            }
            Self::RegisteredBristle { at } => write!(
                f,
                "node at ({}, {}) is a bristle: its only edge neighbour is a node",
                at.x, at.y
            ),
            Self::BadNeighbourCount { at, total, plain } => write!(
                f,
                "corridor pixel at ({}, {}) has {total} edge neighbours, {plain} besides nodes",
                at.x, at.y
            ),
            Self::UnregisteredEndpoint { chain, at } => {
                write!(f, "{chain} ends at unregistered pixel ({}, {})", at.x, at.y)
            }
            Self::MissingIncidence { chain, at } => {
                write!(f, "node at ({}, {}) does not list incident {chain}", at.x, at.y)
            }
            Self::StaleIncidence { at, chain } => {
                write!(f, "node at ({}, {}) references missing {chain}", at.x, at.y)
            }
            Self::RegisteredNotFlagged { at } => {
                write!(f, "registered node at ({}, {}) lost its grid flag", at.x, at.y)
            }
            Self::UnregisteredDataNode { at } => write!(
                f,
                "classified node at ({}, {}) is neither registered nor a singleton",
                at.x, at.y
            ),
        }
    }
}

impl std::error::Error for ConsistencyError {}

/// Runs every structural check and reports the first counterexample.
pub fn validate(map: &PixelMap) -> Result<(), ConsistencyError> {
    node_flags_are_edges(map)?;
    registry_keys_agree(map)?;
    flagged_cells_satisfy_predicate(map)?;
    no_registered_singletons(map)?;
    no_registered_bristles(map)?;
    corridor_cells_have_two_links(map)?;
    chain_endpoints_are_attached(map)?;
    incident_sets_reference_live_chains(map)?;
    flags_and_registry_agree(map)?;
    Ok(())
}

/// Panics on an inconsistent map in debug builds; free in release.
pub fn debug_validate(map: &PixelMap) {
    if cfg!(debug_assertions) {
        if let Err(e) = validate(map) {
            panic!("pixel map inconsistent: {e}");
        }
    }
}

fn node_flags_are_edges(map: &PixelMap) -> Result<(), ConsistencyError> {
    let grid = map.grid();
    for p in grid.positions() {
        if grid.is_node(p) && !grid.is_edge(p) {
            return Err(ConsistencyError::NodeFlagOffEdge { at: p });
        }
    }
    Ok(())
}

fn registry_keys_agree(map: &PixelMap) -> Result<(), ConsistencyError> {
    for (&key, node) in &map.nodes {
        if node.position != key {
            return Err(ConsistencyError::NodeKeyMismatch {
                key,
                stored: node.position,
            });
        }
    }
    Ok(())
}

/// Every NODE-flagged cell has edge-neighbour count != 2, except the anchor
/// pixel of a closed loop, which sits between its own two ends.
fn flagged_cells_satisfy_predicate(map: &PixelMap) -> Result<(), ConsistencyError> {
    let grid = map.grid();
    let anchors: BTreeSet<Xy> = map
        .chains
        .values()
        .filter(|c| c.is_loop())
        .map(|c| c.first_pixel())
        .collect();

    for p in grid.positions() {
        if !grid.is_node(p) || anchors.contains(&p) {
            continue;
        }
        let count = grid.count_edge_neighbours(p);
        if count == 2 {
            return Err(ConsistencyError::PredicateFailed { at: p, count });
        }
    }
    Ok(())
}

fn no_registered_singletons(map: &PixelMap) -> Result<(), ConsistencyError> {
    let grid = map.grid();
    for &p in map.nodes.keys() {
        if grid.count_edge_neighbours(p) == 0 {
            return Err(ConsistencyError::RegisteredSingleton { at: p });
        }
    }
    Ok(())
}

fn no_registered_bristles(map: &PixelMap) -> Result<(), ConsistencyError> {
    let grid = map.grid();
    for &p in map.nodes.keys() {
        let mut nb = grid.edge_neighbours(p);
        let Some((_, only)) = nb.next() else {
            continue;
        };
        if nb.next().is_none() && grid.is_node(only) {
            return Err(ConsistencyError::RegisteredBristle { at: p });
        }
    }
    Ok(())
}

/// A non-node EDGE cell must look like corridor interior: exactly two edge
/// neighbours in total, or exactly two once node neighbours are set aside.
fn corridor_cells_have_two_links(map: &PixelMap) -> Result<(), ConsistencyError> {
    let grid = map.grid();
    for p in grid.positions() {
        if !grid.is_edge(p) || grid.is_node(p) {
            continue;
        }
        let total = grid.count_edge_neighbours(p);
        let plain = grid.edge_neighbours(p).filter(|&(_, q)| !grid.is_node(q)).count() as u8;
        if total != 2 && plain != 2 {
            return Err(ConsistencyError::BadNeighbourCount { at: p, total, plain });
        }
    }
    Ok(())
}

fn chain_endpoints_are_attached(map: &PixelMap) -> Result<(), ConsistencyError> {
    for (&id, chain) in &map.chains {
        let (a, b) = chain.endpoints();
        for at in [a, b] {
            let Some(node) = map.nodes.get(&at) else {
                return Err(ConsistencyError::UnregisteredEndpoint { chain: id, at });
            };
            if !node.chains.contains(&id) {
                return Err(ConsistencyError::MissingIncidence { chain: id, at });
            }
        }
    }
    Ok(())
}

fn incident_sets_reference_live_chains(map: &PixelMap) -> Result<(), ConsistencyError> {
    for (&at, node) in &map.nodes {
        for &chain in &node.chains {
            if !map.chains.contains_key(&chain) {
                return Err(ConsistencyError::StaleIncidence { at, chain });
            }
        }
    }
    Ok(())
}

/// Registered nodes carry the grid flag; flagged cells are registered unless
/// they are singletons.
fn flags_and_registry_agree(map: &PixelMap) -> Result<(), ConsistencyError> {
    let grid = map.grid();
    for &p in map.nodes.keys() {
        if !grid.is_node(p) {
            return Err(ConsistencyError::RegisteredNotFlagged { at: p });
        }
    }
    for p in grid.positions() {
        if grid.is_node(p)
            && grid.count_edge_neighbours(p) > 0
            && !map.nodes.contains_key(&p)
        {
            return Err(ConsistencyError::UnregisteredDataNode { at: p });
        }
    }
    Ok(())
}
