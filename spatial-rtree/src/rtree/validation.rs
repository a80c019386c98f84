//! Structural audit of a stored tree.

use std::collections::HashMap;

use super::rtree_impl::{RTree, RTreeInner, TreeState};
use super::rtree_node::Node;
use super::rtree_types::SpatialResult;
use crate::region::Region;

// ============================================================================
// Validation Report
// ============================================================================

/// Result of a structural audit.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Nodes loaded during the audit
    pub nodes_checked: u64,
    /// One message per violation found
    pub errors: Vec<String>,
    pub is_valid: bool,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            nodes_checked: 0,
            errors: Vec::new(),
            is_valid: true,
        }
    }

    fn fail(&mut self, message: String) {
        self.errors.push(message);
        self.is_valid = false;
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RTreeInner {
    /// Walks the whole tree checking that:
    /// - the root sits at level `tree_height - 1`
    /// - every node box equals the union of its entry boxes
    /// - every parent entry box equals the child's node box
    /// - children sit exactly one level below their parent
    /// - per-level node counts, the node total and the data count match the
    ///   recorded statistics
    fn check_integrity(&self, state: &TreeState) -> SpatialResult<ValidationReport> {
        let mut report = ValidationReport::new();
        let root = self.read_node(state.root_id)?;
        report.nodes_checked += 1;

        if root.level + 1 != state.tree_height {
            report.fail(format!(
                "Invalid tree height: root level {}, recorded height {}",
                root.level, state.tree_height
            ));
            return Ok(report);
        }

        let mut level_counts: HashMap<u32, u32> = HashMap::new();
        let mut data_count = 0u64;
        let mut stack: Vec<(Region, Node)> = vec![(root.region().clone(), root)];

        while let Some((parent_region, node)) = stack.pop() {
            *level_counts.entry(node.level).or_insert(0) += 1;

            let union = Region::combined_region(
                self.config.dimension,
                node.entries().iter().map(|e| e.region()),
            );
            if &union != node.region() {
                report.fail(format!(
                    "Invalid parent information: node {} stores {} but its entries span {}",
                    node.identifier, node.region(), union
                ));
            } else if union != parent_region {
                report.fail(format!(
                    "Error in parent: entry for node {} holds {} but the node spans {}",
                    node.identifier, parent_region, union
                ));
            }

            if node.is_leaf() {
                data_count += node.children_count() as u64;
                continue;
            }

            for entry in node.entries() {
                let child = self.read_node(entry.identifier())?;
                report.nodes_checked += 1;
                if child.level + 1 != node.level {
                    report.fail(format!(
                        "Node {} at level {} has child {} at level {}",
                        node.identifier, node.level, child.identifier, child.level
                    ));
                }
                stack.push((entry.region().clone(), child));
            }
        }

        for level in 0..state.tree_height {
            let found = level_counts.get(&level).copied().unwrap_or(0);
            let recorded = state.level_count(level);
            if found != recorded {
                report.fail(format!(
                    "Invalid statistics: level {} has {} nodes, recorded {}",
                    level, found, recorded
                ));
            }
        }

        let recorded_total: u64 = state.nodes_in_level.iter().map(|&c| c as u64).sum();
        if recorded_total != state.node_count {
            report.fail(format!(
                "Invalid statistics: levels hold {} nodes, node count is {}",
                recorded_total, state.node_count
            ));
        }

        if data_count != state.data_count {
            report.fail(format!(
                "Invalid statistics: leaves hold {} entries, data count is {}",
                data_count, state.data_count
            ));
        }

        Ok(report)
    }
}

impl RTree {
    /// Audits the tree structure and statistics.
    pub fn check_integrity(&self) -> SpatialResult<ValidationReport> {
        let state = self.inner.state.read();
        self.inner.check_integrity(&state)
    }

    /// Audits the tree, logging every violation. Returns true when none
    /// was found.
    pub fn is_index_valid(&self) -> SpatialResult<bool> {
        let report = self.check_integrity()?;
        for error in &report.errors {
            log::error!("{}", error);
        }
        Ok(report.is_valid)
    }
}
