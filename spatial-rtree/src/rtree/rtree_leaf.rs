//! Leaf behavior: splitting data pages, deleting entries and condensing the
//! tree afterwards.

use super::rtree_impl::TreeWriter;
use super::rtree_node::{materialize, Entry, Node, OverflowTable};
use super::rtree_types::{DataId, PageId, SpatialError, SpatialResult};
use crate::region::Region;

impl TreeWriter<'_> {
    /// Materializes the two halves of a leaf split, payloads included.
    pub(crate) fn split_leaf(
        &mut self,
        node: &Node,
        entries: Vec<Entry>,
        group1: &[usize],
        group2: &[usize],
    ) -> SpatialResult<(Node, Node)> {
        let mut slots: Vec<Option<Entry>> = entries.into_iter().map(Some).collect();
        let left = materialize(node, &mut slots, group1, true)?;
        let right = materialize(node, &mut slots, group2, true)?;
        Ok((left, right))
    }

    /// Removes the entry matching `id` and `region` from `leaf`, then
    /// condenses the tree along `path` and reinserts the entries of every
    /// node that fell under the minimum load.
    pub(crate) fn delete_data(
        &mut self,
        mut leaf: Node,
        region: &Region,
        id: DataId,
        path: &mut Vec<PageId>,
    ) -> SpatialResult<()> {
        let index = leaf
            .entries
            .iter()
            .position(|e| e.identifier == id && &e.region == region)
            .ok_or_else(|| {
                SpatialError::InvalidState(format!(
                    "Leaf {} has no entry {} for {}",
                    leaf.identifier, id, region
                ))
            })?;

        leaf.delete_entry(index)?;
        self.write_node(&mut leaf)?;

        let mut to_reinsert = Vec::new();
        self.condense_tree(leaf, &mut to_reinsert, path)?;

        // Last eliminated node first, so higher levels are restored before
        // the leaves that hang below them.
        while let Some(node) = to_reinsert.pop() {
            self.delete_node(&node)?;
            let level = node.level;
            log::trace!(
                "Reinserting {} entries of condensed node {} at level {}",
                node.entries.len(),
                node.identifier,
                level
            );
            for entry in node.entries {
                let mut overflow = OverflowTable::new(self.state.tree_height as usize);
                self.insert_data_at_level(entry, level, &mut overflow)?;
            }
        }
        Ok(())
    }

    /// Walks from `node` up to the root. Underfull nodes are unlinked from
    /// their parent and queued on `to_reinsert`; the rest get their parent
    /// entry refreshed. A root index left with a single child is collapsed.
    fn condense_tree(
        &mut self,
        node: Node,
        to_reinsert: &mut Vec<Node>,
        path: &mut Vec<PageId>,
    ) -> SpatialResult<()> {
        let mut node = node;
        while let Some(parent_id) = path.pop() {
            let mut parent = self.tree.read_node(parent_id)?;
            let index = parent.child_index(node.identifier)?;

            if node.children_count() < self.tree.config.minimum_load(node.capacity) {
                parent.delete_entry(index)?;
                to_reinsert.push(node);
            } else {
                parent.entries[index].region = node.node_mbr.clone();
                parent.recompute_mbr();
            }

            self.write_node(&mut parent)?;
            node = parent;
        }

        if node.is_index() && node.children_count() == 1 {
            self.collapse_root(&node)?;
        }
        Ok(())
    }

    /// Moves the only child of the root into the root page and drops one level.
    fn collapse_root(&mut self, root: &Node) -> SpatialResult<()> {
        let child_id = root.entries[0].identifier;
        let mut child = self.tree.read_node(child_id)?;

        self.delete_node(&child)?;
        child.identifier = self.state.root_id;
        self.write_node(&mut child)?;

        self.state.nodes_in_level.pop();
        self.state.tree_height -= 1;
        // The child's level count was decremented by the delete above but
        // the child lives on as the root.
        let restored = self.state.level_count(child.level) + 1;
        self.state.set_level_count(child.level, restored);

        log::debug!(
            "Collapsed root into child {}, tree height is now {}",
            child_id,
            self.state.tree_height
        );
        Ok(())
    }
}
