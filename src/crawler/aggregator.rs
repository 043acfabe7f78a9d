//! Crawl tree and result flattening
//!
//! The controller records every node it processes in a [`CrawlTree`], an
//! arena whose edges point from a page to the links it was reached through.
//! [`flatten`] turns the tree into the ordered [`CrawlResult`] handed back
//! to callers: each node's own record first, then its descendants in link
//! discovery order.

use super::extractor::PageData;
use serde::{Deserialize, Serialize};

/// One page in the final output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRecord {
    pub url: String,
    pub data: PageData,
}

/// Ordered crawl output; URLs are unique
pub type CrawlResult = Vec<CrawlRecord>;

/// Index of a node in a [`CrawlTree`]
pub type NodeId = usize;

/// A URL the controller began processing
#[derive(Debug, Clone)]
pub struct CrawlNode {
    pub url: String,
    pub depth: u32,
    /// Extracted data; `None` when the node failed
    pub data: Option<PageData>,
    children: Vec<NodeId>,
}

impl CrawlNode {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena of crawl nodes
#[derive(Debug, Clone, Default)]
pub struct CrawlTree {
    nodes: Vec<CrawlNode>,
    roots: Vec<NodeId>,
}

impl CrawlTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node under `parent`, after any existing siblings
    pub fn add(&mut self, parent: Option<NodeId>, url: impl Into<String>, depth: u32) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(CrawlNode {
            url: url.into(),
            depth,
            data: None,
            children: Vec::new(),
        });

        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Stores the extracted data for a node
    ///
    /// Data is written once; later calls leave the first value in place.
    pub fn complete(&mut self, id: NodeId, data: PageData) {
        if let Some(node) = self.nodes.get_mut(id) {
            if node.data.is_none() {
                node.data = Some(data);
            }
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&CrawlNode> {
        self.nodes.get(id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deepest depth of any node that produced data
    pub fn max_completed_depth(&self) -> Option<u32> {
        self.nodes
            .iter()
            .filter(|n| n.data.is_some())
            .map(|n| n.depth)
            .max()
    }
}

/// Flattens a crawl tree into pre-order records
///
/// Nodes without data contribute no record; their descendants, if any, are
/// still emitted in place.
pub fn flatten(tree: &CrawlTree) -> CrawlResult {
    let mut records = Vec::with_capacity(tree.len());
    let mut stack: Vec<NodeId> = tree.roots.iter().rev().copied().collect();

    while let Some(id) = stack.pop() {
        let Some(node) = tree.node(id) else {
            continue;
        };

        if let Some(data) = &node.data {
            records.push(CrawlRecord {
                url: node.url.clone(),
                data: data.clone(),
            });
        }

        stack.extend(node.children.iter().rev());
    }

    records
}
