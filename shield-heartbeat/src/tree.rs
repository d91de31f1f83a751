//! Nested count trees
//!
//! A tree is a string-keyed mapping of mappings that ends in integer counts.
//! The batch is viewed in two orientations:
//! - date-major: `date -> survey -> status -> count`
//! - survey-major: `survey -> date -> status -> count`
//!
//! Writes go through [`CountTree::set`], which creates missing intermediate
//! levels on the way down.

use crate::aggregator::CountTable;
use serde::{Deserialize, Serialize};
use shield_common::LATEST_SENTINEL;
use std::collections::BTreeMap;

/// A node: either a mapping of child nodes or a leaf count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountTree {
    Leaf(u64),
    Branch(BTreeMap<String, CountTree>),
}

impl Default for CountTree {
    fn default() -> Self {
        CountTree::Branch(BTreeMap::new())
    }
}

impl CountTree {
    /// Empty branch
    pub fn new() -> Self {
        Self::default()
    }

    /// Child under `key`, created empty when absent
    ///
    /// A leaf standing where a branch is needed is replaced by an empty
    /// branch; the later write wins.
    pub fn child_mut(&mut self, key: &str) -> &mut CountTree {
        if let CountTree::Leaf(_) = self {
            *self = CountTree::new();
        }
        match self {
            CountTree::Branch(children) => children.entry(key.to_string()).or_default(),
            CountTree::Leaf(_) => unreachable!("leaf replaced by branch above"),
        }
    }

    /// Write `value` at `path`, creating intermediate levels
    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: u64) {
        let mut node = self;
        for key in path {
            node = node.child_mut(key.as_ref());
        }
        *node = CountTree::Leaf(value);
    }

    pub fn child(&self, key: &str) -> Option<&CountTree> {
        match self {
            CountTree::Branch(children) => children.get(key),
            CountTree::Leaf(_) => None,
        }
    }

    /// Child under `key`, or an empty tree when absent
    pub fn child_or_empty(&self, key: &str) -> CountTree {
        self.child(key).cloned().unwrap_or_default()
    }

    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&CountTree> {
        path.iter()
            .try_fold(self, |node, key| node.child(key.as_ref()))
    }

    /// Leaf count at `path`, if the path ends in a leaf
    pub fn leaf<S: AsRef<str>>(&self, path: &[S]) -> Option<u64> {
        match self.get(path)? {
            CountTree::Leaf(value) => Some(*value),
            CountTree::Branch(_) => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let children = match self {
            CountTree::Branch(children) => Some(children),
            CountTree::Leaf(_) => None,
        };
        children.into_iter().flat_map(|c| c.keys().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CountTree::Branch(children) => children.is_empty(),
            CountTree::Leaf(_) => false,
        }
    }

    /// Every leaf as `(path, value)`, depth first in key order
    pub fn leaves(&self) -> Vec<(Vec<String>, u64)> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        collect_leaves(self, &mut path, &mut out);
        out
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            CountTree::Leaf(_) => 1,
            CountTree::Branch(children) => children.values().map(CountTree::leaf_count).sum(),
        }
    }

    /// Longest key path to a leaf; 0 for a bare leaf or an empty tree
    pub fn depth(&self) -> usize {
        match self {
            CountTree::Leaf(_) => 0,
            CountTree::Branch(children) => children
                .values()
                .map(|child| child.depth() + 1)
                .max()
                .unwrap_or(0),
        }
    }
}

fn collect_leaves(node: &CountTree, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, u64)>) {
    match node {
        CountTree::Leaf(value) => out.push((path.clone(), *value)),
        CountTree::Branch(children) => {
            for (key, child) in children {
                path.push(key.clone());
                collect_leaves(child, path, out);
                path.pop();
            }
        }
    }
}

/// Both orientations of one batch, plus its latest submission date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTrees {
    pub date_major: CountTree,
    pub survey_major: CountTree,
    /// Greatest submission date in the batch, or the all-zero sentinel
    pub latest: String,
}

impl BatchTrees {
    /// Whether any real date was seen
    pub fn has_latest(&self) -> bool {
        self.latest != LATEST_SENTINEL
    }

    /// Date-major subtree for the latest date; empty for an empty batch
    pub fn latest_tree(&self) -> CountTree {
        self.date_major.child_or_empty(&self.latest)
    }
}

/// Build date-major and survey-major trees from a count table
pub fn build_trees(table: &CountTable) -> BatchTrees {
    let mut date_major = CountTree::new();
    let mut survey_major = CountTree::new();
    let mut latest = LATEST_SENTINEL.to_string();

    for (key, count) in table.iter() {
        if key.submission_date > latest {
            latest = key.submission_date.clone();
        }
        date_major.set(&[&key.submission_date, &key.survey_id, &key.status], count);
        survey_major.set(&[&key.survey_id, &key.submission_date, &key.status], count);
    }

    BatchTrees {
        date_major,
        survey_major,
        latest,
    }
}
