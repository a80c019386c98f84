//! Index node behavior: subtree selection, ancestor adjustment and leaf lookup.

use super::rtree_constants::EPSILON;
use super::rtree_impl::{RTreeInner, TreeWriter};
use super::rtree_node::{materialize, Entry, Node, OverflowTable};
use super::rtree_types::{DataId, PageId, RTreeVariant, SpatialError, SpatialResult};
use crate::region::Region;

impl RTreeInner {
    /// Descends from `node` to the node at `level` that should receive
    /// `region`, pushing every visited ancestor onto `path`.
    pub(crate) fn choose_subtree(
        &self,
        node: Node,
        region: &Region,
        level: u32,
        path: &mut Vec<PageId>,
    ) -> SpatialResult<Node> {
        let mut node = node;
        while node.level > level {
            path.push(node.identifier);

            let child = match self.config.variant {
                RTreeVariant::RStar if node.level == 1 => {
                    find_least_overlap(&node, region, self.config.near_minimum_overlap_factor)
                }
                _ => find_least_enlargement(&node, region),
            };
            let child = child.ok_or_else(|| {
                SpatialError::InvalidState(format!("Index node {} has no children", node.identifier))
            })?;

            node = self.read_node(node.entries[child].identifier)?;
        }

        if node.level != level {
            return Err(SpatialError::InvalidState(format!(
                "Cannot reach level {} below node {} at level {}",
                level, node.identifier, node.level
            )));
        }
        Ok(node)
    }

    /// Finds the leaf holding the entry with identifier `id` and exactly
    /// `region`. On success `path` holds the leaf's ancestors.
    pub(crate) fn find_leaf(
        &self,
        node: Node,
        region: &Region,
        id: DataId,
        path: &mut Vec<PageId>,
    ) -> SpatialResult<Option<Node>> {
        if node.is_leaf() {
            let found = node
                .entries
                .iter()
                .any(|e| e.identifier == id && &e.region == region);
            return Ok(found.then_some(node));
        }

        path.push(node.identifier);
        for entry in &node.entries {
            if entry.region.contains(region) {
                let child = self.read_node(entry.identifier)?;
                if let Some(leaf) = self.find_leaf(child, region, id, path)? {
                    return Ok(Some(leaf));
                }
            }
        }
        path.pop();
        Ok(None)
    }
}

/// Child whose box grows least when enlarged to cover `region`; ties go to
/// the child with the smaller area.
pub(crate) fn find_least_enlargement(node: &Node, region: &Region) -> Option<usize> {
    let mut best = None;
    let mut least_enlargement = f64::INFINITY;
    let mut best_area = f64::INFINITY;

    for (i, entry) in node.entries.iter().enumerate() {
        let area = entry.region.area();
        let enlargement = entry.region.combine(region).area() - area;

        if best.is_none()
            || enlargement < least_enlargement
            || (enlargement == least_enlargement && area < best_area)
        {
            least_enlargement = enlargement;
            best_area = area;
            best = Some(i);
        }
    }
    best
}

struct OverlapCandidate {
    index: usize,
    combined: Region,
    original_area: f64,
    enlargement: f64,
}

/// R*-Tree selection above the leaves: the child whose enlargement adds the
/// least overlap with its siblings. Only the `near_minimum_overlap_factor`
/// children with the smallest enlargement are scored.
pub(crate) fn find_least_overlap(
    node: &Node,
    region: &Region,
    near_minimum_overlap_factor: usize,
) -> Option<usize> {
    let mut candidates: Vec<OverlapCandidate> = node
        .entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let combined = entry.region.combine(region);
            let original_area = entry.region.area();
            let enlargement = combined.area() - original_area;
            OverlapCandidate {
                index,
                combined,
                original_area,
                enlargement,
            }
        })
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let mut best = 0;
    let mut least_enlargement = f64::INFINITY;
    for (pos, candidate) in candidates.iter().enumerate() {
        if candidate.enlargement < least_enlargement {
            least_enlargement = candidate.enlargement;
            best = pos;
        } else if candidate.enlargement == least_enlargement
            && candidate.original_area < candidates[best].original_area
        {
            best = pos;
        }
    }

    // Overlap scoring runs unless the least enlargement is exactly EPSILON.
    if least_enlargement < EPSILON || least_enlargement > EPSILON {
        let iterations = if candidates.len() > near_minimum_overlap_factor {
            candidates.sort_by(|a, b| {
                a.enlargement
                    .partial_cmp(&b.enlargement)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            near_minimum_overlap_factor
        } else {
            candidates.len()
        };

        let mut least_overlap = f64::INFINITY;
        for pos in 0..iterations {
            let candidate = &candidates[pos];
            let original = &node.entries[candidate.index].region;

            let overlap_delta: f64 = node
                .entries
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != candidate.index)
                .map(|(_, other)| {
                    let grown = candidate.combined.intersecting_area(&other.region);
                    if grown != 0.0 {
                        grown - original.intersecting_area(&other.region)
                    } else {
                        0.0
                    }
                })
                .sum();

            if overlap_delta < least_overlap {
                least_overlap = overlap_delta;
                best = pos;
            } else if overlap_delta == least_overlap {
                let current = &candidates[best];
                if candidate.enlargement == current.enlargement {
                    if candidate.original_area < current.original_area {
                        best = pos;
                    }
                } else if candidate.enlargement < current.enlargement {
                    best = pos;
                }
            }
        }
    }

    Some(candidates[best].index)
}

/// Stores `child_region` as the box of entry `index` and recomputes the node
/// box when it may have changed. Returns whether it was recomputed.
fn update_child_region(node: &mut Node, index: usize, child_region: &Region) -> bool {
    let recalculate =
        !node.node_mbr.contains(child_region) || node.node_mbr.touches(&node.entries[index].region);
    node.entries[index].region = child_region.clone();
    if recalculate {
        node.recompute_mbr();
    }
    recalculate
}

impl TreeWriter<'_> {
    /// Propagates the new box of `child` into `node` and up the ancestors
    /// remaining on `path`, for as long as boxes keep changing.
    pub(crate) fn adjust_tree(
        &mut self,
        mut node: Node,
        child: &Node,
        path: &mut Vec<PageId>,
    ) -> SpatialResult<()> {
        self.tree.counters.record_adjustment();

        let index = node.child_index(child.identifier)?;
        let recalculate = update_child_region(&mut node, index, &child.node_mbr);
        self.write_node(&mut node)?;

        if recalculate {
            if let Some(parent_id) = path.pop() {
                let parent = self.tree.read_node(parent_id)?;
                self.adjust_tree(parent, &node, path)?;
            }
        }
        Ok(())
    }

    /// Records a split of one child of `node`: `left` replaced the old child
    /// in place and `right` is inserted as a new entry, which may split
    /// `node` in turn.
    pub(crate) fn adjust_tree_pair(
        &mut self,
        mut node: Node,
        left: &Node,
        right: &Node,
        path: &mut Vec<PageId>,
        overflow: &mut OverflowTable,
    ) -> SpatialResult<()> {
        self.tree.counters.record_adjustment();

        let index = node.child_index(left.identifier)?;
        let recalculate = update_child_region(&mut node, index, &left.node_mbr);

        let entry = Entry::child(right.node_mbr.clone(), right.identifier);
        let adjusted = self.insert_data(&mut node, entry, path, overflow)?;

        if !adjusted && recalculate {
            if let Some(parent_id) = path.pop() {
                let parent = self.tree.read_node(parent_id)?;
                self.adjust_tree(parent, &node, path)?;
            }
        }
        Ok(())
    }

    /// Materializes the two halves of an index node split. Payloads are
    /// dropped since index entries never carry any.
    pub(crate) fn split_index(
        &mut self,
        node: &Node,
        entries: Vec<Entry>,
        group1: &[usize],
        group2: &[usize],
    ) -> SpatialResult<(Node, Node)> {
        let mut slots: Vec<Option<Entry>> = entries.into_iter().map(Some).collect();
        let left = materialize(node, &mut slots, group1, false)?;
        let right = materialize(node, &mut slots, group2, false)?;
        Ok((left, right))
    }
}
