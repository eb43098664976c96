use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tracing::warn;

/// The fixed rank order used when a classification has to be rebuilt from
/// the flat per-taxon rank columns.
pub const CLASSIFICATION_RANKS: [&str; 15] = [
    "kingdom",
    "phylum",
    "subphylum",
    "class",
    "order",
    "suborder",
    "superfamily",
    "family",
    "subfamily",
    "tribe",
    "subtribe",
    "genus",
    "subgenus",
    "section",
    "species",
];

/// One taxon in the in-memory hierarchy of a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub id: String,
    pub parent_id: String,
    pub rank: String,
    pub canonical_name: String,
    pub taxonomic_status: String,
}

pub type Hierarchy = HashMap<String, Node>;

/// A flat rank value with its companion id column.
#[derive(Debug, Clone, Default)]
pub struct FlatEntry {
    pub name: String,
    pub id: String,
}

/// Rank name to flat entry, taken from the taxon row's `col__<rank>` /
/// `sf__<rank>_id` columns.
pub type FlatClassification = HashMap<String, FlatEntry>;

/// The three pipe-joined classification strings of a record. All three
/// always have the same arity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Breadcrumbs {
    pub names: String,
    pub ranks: String,
    pub ids: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anomaly {
    Circular,
    MissingParent,
}

// Anomalies come from upstream data errors and can repeat across millions of
// rows; the registry makes sure each one is logged a single time per run.
static BAD_NODES: Lazy<Mutex<HashMap<String, Anomaly>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn register_bad_node(id: &str, anomaly: Anomaly) {
    let mut bad = BAD_NODES.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if bad.insert(id.to_string(), anomaly).is_none() {
        match anomaly {
            Anomaly::Circular => warn!(id, "taxon is part of a parent cycle, classification truncated"),
            Anomaly::MissingParent => warn!(id, "parent taxon is not in the hierarchy, classification truncated"),
        }
    }
}

/// Clears the anomaly registry. Called once at the start of a run.
pub fn reset_bad_nodes() {
    let mut bad = BAD_NODES.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    bad.clear();
}

/// Resolves the classification strings for a record.
///
/// Walks the parent chain from `id` to the root, guarding against cycles and
/// missing parents. A chain shorter than two nodes is rebuilt from the flat
/// rank columns; `prefer_flat` skips the walk entirely.
pub fn resolve(id: &str, hierarchy: &Hierarchy, flat: &FlatClassification, prefer_flat: bool) -> Breadcrumbs {
    let mut chain: Vec<&Node> = Vec::new();

    if !prefer_flat {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = id;

        loop {
            if visited.contains(current) {
                register_bad_node(current, Anomaly::Circular);
                break;
            }

            let Some(node) = hierarchy.get(current) else {
                if current != id {
                    register_bad_node(current, Anomaly::MissingParent);
                }
                break;
            };

            visited.insert(current);
            chain.push(node);

            if node.parent_id.is_empty() {
                break;
            }
            current = &node.parent_id;
        }

        // walked from the record upwards, the root goes first
        chain.reverse();
    }

    if chain.len() >= 2 {
        return join(chain.iter().map(|node| (&node.canonical_name, &node.rank, &node.id)));
    }

    // too little hierarchy to be useful, rebuild from the flat columns and
    // keep whatever was walked at the end of the chain
    let mut nodes: Vec<(&String, &String, &String)> = Vec::new();
    let mut synthetic: Vec<(String, String, String)> = Vec::new();

    for rank in CLASSIFICATION_RANKS {
        if let Some(entry) = flat.get(rank) {
            if !entry.name.is_empty() {
                synthetic.push((entry.name.clone(), rank.to_string(), entry.id.clone()));
            }
        }
    }

    for (name, rank, id) in &synthetic {
        nodes.push((name, rank, id));
    }
    for node in &chain {
        nodes.push((&node.canonical_name, &node.rank, &node.id));
    }

    join(nodes.into_iter())
}

fn join<'a, I>(nodes: I) -> Breadcrumbs
where
    I: Iterator<Item = (&'a String, &'a String, &'a String)>,
{
    let mut names: Vec<&str> = Vec::new();
    let mut ranks: Vec<&str> = Vec::new();
    let mut ids: Vec<&str> = Vec::new();

    for (name, rank, id) in nodes {
        names.push(name);
        ranks.push(rank);
        ids.push(id);
    }

    Breadcrumbs {
        names: names.join("|"),
        ranks: ranks.join("|"),
        ids: ids.join("|"),
    }
}
