//! One level of the table tree

use std::sync::Arc;

use crate::sstable::SSTable;

/// A table together with its creation index inside a level
#[derive(Debug, Clone)]
pub struct TableNode {
    pub index: u64,
    pub table: Arc<SSTable>,
}

/// Tables of one level, ascending by creation index
#[derive(Debug, Default)]
pub(crate) struct Level {
    nodes: Vec<TableNode>,
    next_index: u64,
}

impl Level {
    /// Hand out the next creation index
    pub fn allocate(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Place a node keeping ascending index order
    pub fn insert(&mut self, node: TableNode) {
        self.next_index = self.next_index.max(node.index + 1);
        let at = self.nodes.partition_point(|n| n.index < node.index);
        self.nodes.insert(at, node);
    }

    /// Detach the nodes whose index is in `indices`
    pub fn remove(&mut self, indices: &[u64]) -> Vec<TableNode> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.nodes)
            .into_iter()
            .partition(|n| indices.contains(&n.index));
        self.nodes = kept;
        removed
    }

    /// Oldest first
    pub fn nodes(&self) -> &[TableNode] {
        &self.nodes
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &TableNode> {
        self.nodes.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Cumulative on-disk size of the level
    pub fn size(&self) -> u64 {
        self.nodes.iter().map(|n| n.table.file_size()).sum()
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }
}
