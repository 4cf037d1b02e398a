use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::event::{Event, EventNode};

/// How the representative of each cluster is chosen after combining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepresentativeOrder {
    /// Promote the member with the strictly greatest magnitude.
    #[default]
    ByGreatestMagnitude,
    /// Promote the member with the strictly earliest occurrence time.
    ByEarliestDate,
    /// Keep the anchor chosen while combining.
    Unordered,
}

impl fmt::Display for RepresentativeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepresentativeOrder::ByGreatestMagnitude => write!(f, "magnitude"),
            RepresentativeOrder::ByEarliestDate => write!(f, "date"),
            RepresentativeOrder::Unordered => write!(f, "unordered"),
        }
    }
}

impl FromStr for RepresentativeOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "magnitude" | "greatest_magnitude" => Ok(RepresentativeOrder::ByGreatestMagnitude),
            "date" | "earliest_date" => Ok(RepresentativeOrder::ByEarliestDate),
            "unordered" | "none" => Ok(RepresentativeOrder::Unordered),
            other => Err(format!("unknown representative order: {}", other)),
        }
    }
}

/// Applies the representative policy to every node.
pub fn normalize(nodes: Vec<EventNode>, order: RepresentativeOrder) -> Vec<EventNode> {
    match order {
        RepresentativeOrder::Unordered => nodes,
        RepresentativeOrder::ByGreatestMagnitude => nodes
            .into_iter()
            .map(|node| promote(node, |candidate, current| candidate.magnitude > current.magnitude))
            .collect(),
        RepresentativeOrder::ByEarliestDate => nodes
            .into_iter()
            .map(|node| promote(node, |candidate, current| candidate.time < current.time))
            .collect(),
    }
}

/// Promotes the best member of a cluster to representative.
///
/// `beats(candidate, current)` must be a strict comparison: a child only
/// displaces the anchor (or an earlier child) when it is strictly better, so
/// ties keep the earlier member. A displaced anchor is appended after the
/// remaining children. Children sharing the representative's code, and
/// repeated child codes, are dropped.
fn promote<F>(node: EventNode, beats: F) -> EventNode
where
    F: Fn(&Event, &Event) -> bool,
{
    if !node.is_cluster() {
        return node;
    }
    let (anchor, mut children) = node.into_parts();

    let mut best: Option<usize> = None;
    for (index, child) in children.iter().enumerate() {
        let current = best.map_or(&anchor, |b| &children[b]);
        if beats(child, current) {
            best = Some(index);
        }
    }

    let representative = match best {
        Some(index) => {
            let promoted = children.remove(index);
            children.push(anchor);
            promoted
        }
        None => anchor,
    };

    let mut seen: HashSet<String> = HashSet::with_capacity(children.len() + 1);
    seen.insert(representative.key().to_string());
    children.retain(|child| seen.insert(child.key().to_string()));

    EventNode::with_children(representative, children)
}
