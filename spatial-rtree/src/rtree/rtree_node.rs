//! Node model shared by leaves and index nodes.
//!
//! A node is a bounded array of entries plus the union of their boxes. Leaves
//! (level 0) hold caller data; index nodes hold child page identifiers. The
//! grouping algorithms used when a node overflows live here too, as pure
//! functions over the overflowing entry list.

use bytes::BufMut;
use std::cmp::Ordering;

use super::rtree_config::RTreeConfig;
use super::rtree_constants::{NEW_PAGE, PERSISTENT_INDEX, PERSISTENT_LEAF};
use super::rtree_impl::TreeWriter;
use super::rtree_types::{
    Data, PageId, RTreeVariant, SpatialEntry, SpatialError, SpatialResult, WireReader,
};
use crate::region::Region;

// ============================================================================
// Entries and Nodes
// ============================================================================

/// One slot of a node: a box, an identifier and optional payload bytes.
///
/// In a leaf the identifier is the caller's record id. In an index node it
/// is the page identifier of a child and the payload is always absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub(crate) region: Region,
    pub(crate) identifier: i32,
    pub(crate) payload: Option<Vec<u8>>,
}

impl Entry {
    pub fn new(region: Region, identifier: i32, payload: Option<Vec<u8>>) -> Self {
        Self {
            region,
            identifier,
            payload,
        }
    }

    pub(crate) fn child(region: Region, identifier: PageId) -> Self {
        Self::new(region, identifier, None)
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn identifier(&self) -> i32 {
        self.identifier
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }
}

impl SpatialEntry for Entry {
    fn identifier(&self) -> i32 {
        self.identifier
    }

    fn region(&self) -> &Region {
        &self.region
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Index,
}

/// A tree node as loaded from, or about to be written to, storage.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) identifier: PageId,
    pub(crate) level: u32,
    pub(crate) capacity: usize,
    pub(crate) entries: Vec<Entry>,
    pub(crate) node_mbr: Region,
    pub(crate) total_data_length: usize,
}

impl Node {
    fn with_capacity(level: u32, capacity: usize, dimension: usize) -> Self {
        Self {
            identifier: NEW_PAGE,
            level,
            capacity,
            entries: Vec::new(),
            node_mbr: Region::empty(dimension),
            total_data_length: 0,
        }
    }

    pub(crate) fn new_leaf(config: &RTreeConfig) -> Self {
        Self::with_capacity(0, config.leaf_capacity, config.dimension)
    }

    pub(crate) fn new_index(level: u32, config: &RTreeConfig) -> Self {
        Self::with_capacity(level, config.index_capacity, config.dimension)
    }

    /// An empty node of the same kind and level.
    fn sibling(&self) -> Self {
        Self::with_capacity(self.level, self.capacity, self.node_mbr.dimension())
    }

    pub fn identifier(&self) -> PageId {
        self.identifier
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn kind(&self) -> NodeKind {
        if self.level == 0 {
            NodeKind::Leaf
        } else {
            NodeKind::Index
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind() == NodeKind::Leaf
    }

    pub fn is_index(&self) -> bool {
        self.kind() == NodeKind::Index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn children_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn child_identifier(&self, index: usize) -> Option<i32> {
        self.entries.get(index).map(|e| e.identifier)
    }

    pub fn child_region(&self, index: usize) -> Option<&Region> {
        self.entries.get(index).map(|e| &e.region)
    }

    /// Union of all entry boxes; the empty region when there are none.
    pub fn region(&self) -> &Region {
        &self.node_mbr
    }

    pub fn total_data_length(&self) -> usize {
        self.total_data_length
    }

    /// Position of the entry pointing at child page `id`.
    pub(crate) fn child_index(&self, id: PageId) -> SpatialResult<usize> {
        self.entries
            .iter()
            .position(|e| e.identifier == id)
            .ok_or_else(|| {
                SpatialError::InvalidState(format!(
                    "Node {} has no entry for child {}",
                    self.identifier, id
                ))
            })
    }

    pub(crate) fn insert_entry(&mut self, entry: Entry) -> SpatialResult<()> {
        if self.entries.len() >= self.capacity {
            return Err(SpatialError::InvalidState(format!(
                "Node {} is full ({} entries)",
                self.identifier, self.capacity
            )));
        }
        if let Some(payload) = &entry.payload {
            self.total_data_length += payload.len();
        }
        self.node_mbr.expand(&entry.region);
        self.entries.push(entry);
        Ok(())
    }

    /// Removes the entry at `index` by swapping the last entry into its
    /// slot. The node box is recomputed only when the removed box touched it.
    pub(crate) fn delete_entry(&mut self, index: usize) -> SpatialResult<Entry> {
        if index >= self.entries.len() {
            return Err(SpatialError::InvalidState(format!(
                "Node {} has no entry at index {}",
                self.identifier, index
            )));
        }
        let removed = self.entries.swap_remove(index);
        if let Some(payload) = &removed.payload {
            self.total_data_length -= payload.len();
        }

        if self.entries.is_empty() {
            self.node_mbr = Region::empty(self.node_mbr.dimension());
        } else if self.node_mbr.touches(&removed.region) {
            self.recompute_mbr();
        }
        Ok(removed)
    }

    pub(crate) fn recompute_mbr(&mut self) {
        self.node_mbr =
            Region::combined_region(self.node_mbr.dimension(), self.entries.iter().map(|e| &e.region));
    }

    // ========================================================================
    // Wire Format
    // ========================================================================

    /// Serializes the node: type, level, child count, then per child the
    /// interleaved low/high coordinates, identifier and length-prefixed payload.
    pub(crate) fn store(&self) -> Vec<u8> {
        let dimension = self.node_mbr.dimension();
        let mut buf =
            Vec::with_capacity(12 + self.entries.len() * (16 * dimension + 8) + self.total_data_length);

        buf.put_i32(match self.kind() {
            NodeKind::Leaf => PERSISTENT_LEAF,
            NodeKind::Index => PERSISTENT_INDEX,
        });
        buf.put_i32(self.level as i32);
        buf.put_i32(self.entries.len() as i32);

        for entry in &self.entries {
            for axis in 0..dimension {
                buf.put_f64(entry.region.low()[axis]);
                buf.put_f64(entry.region.high()[axis]);
            }
            buf.put_i32(entry.identifier);
            match &entry.payload {
                Some(payload) => {
                    buf.put_i32(payload.len() as i32);
                    buf.put_slice(payload);
                }
                None => buf.put_i32(0),
            }
        }
        buf
    }

    pub(crate) fn load(identifier: PageId, bytes: &[u8], config: &RTreeConfig) -> SpatialResult<Node> {
        let mut reader = WireReader::new(bytes);
        let node_type = reader.get_i32()?;
        let level = reader.get_count()? as u32;

        let consistent = match node_type {
            PERSISTENT_LEAF => level == 0,
            PERSISTENT_INDEX => level > 0,
            _ => false,
        };
        if !consistent {
            return Err(SpatialError::Serialization(format!(
                "Page {} holds node type {} at level {}",
                identifier, node_type, level
            )));
        }

        let count = reader.get_count()?;
        let capacity = config.capacity_for_level(level);
        if count > capacity {
            return Err(SpatialError::Serialization(format!(
                "Page {} holds {} entries, capacity is {}",
                identifier, count, capacity
            )));
        }

        // Every entry carries its coordinates, an id and a payload length.
        let dimension = config.dimension;
        reader.ensure(count.saturating_mul(16 * dimension + 8))?;

        let mut node = Node::with_capacity(level, capacity, dimension);
        node.identifier = identifier;
        node.entries.reserve(count);
        for _ in 0..count {
            let mut low = Vec::with_capacity(dimension);
            let mut high = Vec::with_capacity(dimension);
            for _ in 0..dimension {
                low.push(reader.get_f64()?);
                high.push(reader.get_f64()?);
            }
            let id = reader.get_i32()?;
            let length = reader.get_count()?;
            let payload = if length > 0 {
                Some(reader.get_bytes(length)?)
            } else {
                None
            };
            node.insert_entry(Entry::new(Region::from_raw(low, high), id, payload))?;
        }
        Ok(node)
    }
}

impl SpatialEntry for Node {
    fn identifier(&self) -> i32 {
        self.identifier
    }

    fn region(&self) -> &Region {
        &self.node_mbr
    }
}

// ============================================================================
// Overflow Table
// ============================================================================

/// Per-level "forced reinsertion already happened" flags for one top-level
/// insertion. Grows on demand so a root split mid-insertion stays in range.
#[derive(Debug, Default)]
pub(crate) struct OverflowTable(Vec<bool>);

impl OverflowTable {
    pub fn new(levels: usize) -> Self {
        Self(vec![false; levels])
    }

    pub fn is_set(&self, level: u32) -> bool {
        self.0.get(level as usize).copied().unwrap_or(false)
    }

    pub fn set(&mut self, level: u32) {
        let level = level as usize;
        if self.0.len() <= level {
            self.0.resize(level + 1, false);
        }
        self.0[level] = true;
    }
}

// ============================================================================
// Grouping Algorithms
// ============================================================================

fn compare_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn group_region(dimension: usize, entries: &[Entry], members: &[usize]) -> Region {
    Region::combined_region(dimension, members.iter().map(|&i| &entries[i].region))
}

/// Picks the two entries that start the two split groups.
///
/// Linear and R*: per axis, the entry with the greatest low side and the one
/// with the least high side, separation normalized by the axis span; the
/// best-separated axis wins. Quadratic: the pair wasting the most area when
/// boxed together.
pub(crate) fn pick_seeds(entries: &[Entry], variant: RTreeVariant) -> (usize, usize) {
    let n = entries.len();
    let mut seeds = (0, 0);

    match variant {
        RTreeVariant::Linear | RTreeVariant::RStar => {
            let dimension = entries[0].region.dimension();
            let mut separation = f64::NEG_INFINITY;

            for axis in 0..dimension {
                let low = |i: usize| entries[i].region.low()[axis];
                let high = |i: usize| entries[i].region.high()[axis];

                let mut least_lower = low(0);
                let mut greatest_upper = high(0);
                let mut greatest_lower = 0;
                let mut least_upper = 0;

                for i in 1..n {
                    if low(i) > low(greatest_lower) {
                        greatest_lower = i;
                    }
                    if high(i) < high(least_upper) {
                        least_upper = i;
                    }
                    least_lower = least_lower.min(low(i));
                    greatest_upper = greatest_upper.max(high(i));
                }

                let mut width = greatest_upper - least_lower;
                if width <= 0.0 {
                    width = 1.0;
                }

                let normalized = (low(greatest_lower) - high(least_upper)) / width;
                if normalized > separation {
                    seeds = (least_upper, greatest_lower);
                    separation = normalized;
                }
            }

            if seeds.0 == seeds.1 {
                seeds.1 = if seeds.1 != n - 1 { seeds.1 + 1 } else { seeds.1 - 1 };
            }
        }
        RTreeVariant::Quadratic => {
            let mut inefficiency = f64::NEG_INFINITY;
            for i in 0..n - 1 {
                let area = entries[i].region.area();
                for j in i + 1..n {
                    let combined = entries[i].region.combine(&entries[j].region);
                    let waste = combined.area() - area - entries[j].region.area();
                    if waste > inefficiency {
                        inefficiency = waste;
                        seeds = (i, j);
                    }
                }
            }
        }
    }
    seeds
}

/// Linear/quadratic grouping of an overflowing entry list.
pub(crate) fn rtree_split(
    entries: &[Entry],
    config: &RTreeConfig,
    capacity: usize,
) -> (Vec<usize>, Vec<usize>) {
    let n = entries.len();
    let minimum_load = config.minimum_load(capacity) as isize;

    let (seed1, seed2) = pick_seeds(entries, config.variant);
    let mut assigned = vec![false; n];
    assigned[seed1] = true;
    assigned[seed2] = true;

    let mut group1 = vec![seed1];
    let mut group2 = vec![seed2];
    let mut mbr1 = entries[seed1].region.clone();
    let mut mbr2 = entries[seed2].region.clone();
    let mut remaining = n - 2;

    while remaining > 0 {
        let forced = if minimum_load - group1.len() as isize == remaining as isize {
            Some(&mut group1)
        } else if minimum_load - group2.len() as isize == remaining as isize {
            Some(&mut group2)
        } else {
            None
        };

        if let Some(group) = forced {
            for (i, taken) in assigned.iter_mut().enumerate() {
                if !*taken {
                    group.push(i);
                    *taken = true;
                }
            }
            break;
        }

        let area1 = mbr1.area();
        let area2 = mbr2.area();
        let mut selected = None;
        let mut cost1 = 0.0;
        let mut cost2 = 0.0;
        let mut max_difference = f64::NEG_INFINITY;

        for i in (0..n).filter(|&i| !assigned[i]) {
            let d1 = mbr1.combine(&entries[i].region).area() - area1;
            let d2 = mbr2.combine(&entries[i].region).area() - area2;
            let difference = (d1 - d2).abs();

            if difference > max_difference || selected.is_none() {
                max_difference = difference;
                cost1 = d1;
                cost2 = d2;
                selected = Some(i);
                // Any entry will do for the linear split.
                if config.variant != RTreeVariant::Quadratic {
                    break;
                }
            }
        }

        let Some(selected) = selected else { break };

        let to_first = if cost1 != cost2 {
            cost1 < cost2
        } else if area1 != area2 {
            area1 < area2
        } else {
            group1.len() <= group2.len()
        };

        if to_first {
            group1.push(selected);
            mbr1.expand(&entries[selected].region);
        } else {
            group2.push(selected);
            mbr2.expand(&entries[selected].region);
        }
        assigned[selected] = true;
        remaining -= 1;
    }

    (group1, group2)
}

/// R*-Tree grouping: choose the split axis by total margin, then the split
/// point on that axis by overlap and area.
pub(crate) fn rstar_split(entries: &[Entry], config: &RTreeConfig) -> (Vec<usize>, Vec<usize>) {
    let n = entries.len();
    let dimension = entries[0].region.dimension();
    let node_spf = (n as f64 * config.split_distribution_factor).floor() as usize;
    let split_distribution = (n + 2).saturating_sub(2 * node_spf);

    // Sizes of the first group; both groups must stay non-empty.
    let sizes: Vec<usize> = (1..=split_distribution)
        .map(|k| node_spf + k - 1)
        .filter(|&l| l >= 1 && l < n)
        .collect();
    let sizes = if sizes.is_empty() { vec![n / 2] } else { sizes };

    let margin_sum = |order: &[usize]| -> f64 {
        sizes
            .iter()
            .map(|&l| {
                group_region(dimension, entries, &order[..l]).margin()
                    + group_region(dimension, entries, &order[l..]).margin()
            })
            .sum()
    };

    let mut by_low: Vec<usize> = (0..n).collect();
    let mut by_high: Vec<usize> = (0..n).collect();
    let mut minimum_margin = f64::INFINITY;
    let mut split_axis = 0;
    let mut sort_by_low = true;

    for axis in 0..dimension {
        by_low.sort_by(|&a, &b| compare_f64(entries[a].region.low()[axis], entries[b].region.low()[axis]));
        by_high.sort_by(|&a, &b| compare_f64(entries[a].region.high()[axis], entries[b].region.high()[axis]));

        let margin_low = margin_sum(&by_low);
        let margin_high = margin_sum(&by_high);
        let margin = margin_low.min(margin_high);

        if margin < minimum_margin {
            minimum_margin = margin;
            split_axis = axis;
            sort_by_low = margin_low < margin_high;
        }
    }

    let mut order = by_low;
    if sort_by_low {
        order.sort_by(|&a, &b| {
            compare_f64(entries[a].region.low()[split_axis], entries[b].region.low()[split_axis])
        });
    } else {
        order.sort_by(|&a, &b| {
            compare_f64(entries[a].region.high()[split_axis], entries[b].region.high()[split_axis])
        });
    }

    let mut least_overlap = f64::INFINITY;
    let mut least_area = f64::INFINITY;
    let mut split_at = sizes[0];

    for &l in &sizes {
        let first = group_region(dimension, entries, &order[..l]);
        let second = group_region(dimension, entries, &order[l..]);
        let overlap = first.intersecting_area(&second);
        let area = first.area() + second.area();

        if overlap < least_overlap {
            split_at = l;
            least_overlap = overlap;
            least_area = area;
        } else if overlap == least_overlap && area < least_area {
            split_at = l;
            least_area = area;
        }
    }

    (order[..split_at].to_vec(), order[split_at..].to_vec())
}

/// Partitions an overflowing entry list for forced reinsertion.
///
/// Entries are ranked by squared distance between their center and
/// `center`. The farthest `floor(n * reinsert_factor)` (at least one) are
/// returned first, closest of them first; the rest are kept.
pub(crate) fn reinsert_partition(
    entries: &[Entry],
    center: &[f64],
    reinsert_factor: f64,
) -> (Vec<usize>, Vec<usize>) {
    let n = entries.len();
    let mut ranked: Vec<(usize, f64)> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let distance = e
                .region
                .center()
                .iter()
                .zip(center)
                .map(|(c, nc)| (nc - c) * (nc - c))
                .sum::<f64>();
            (i, distance)
        })
        .collect();
    ranked.sort_by(|a, b| compare_f64(a.1, b.1));

    let count = ((n as f64 * reinsert_factor).floor() as usize).clamp(1, n - 1);
    let keep = ranked[..n - count].iter().map(|&(i, _)| i).collect();
    let reinsert = ranked[n - count..].iter().map(|&(i, _)| i).collect();
    (reinsert, keep)
}

// ============================================================================
// Insertion
// ============================================================================

impl TreeWriter<'_> {
    /// Inserts `entry` into `node`, which subtree selection chose at the
    /// entry's target level. `path` holds the ancestors of `node`.
    ///
    /// Returns true when the ancestor chain has already been adjusted.
    pub(crate) fn insert_data(
        &mut self,
        node: &mut Node,
        entry: Entry,
        path: &mut Vec<PageId>,
        overflow: &mut OverflowTable,
    ) -> SpatialResult<bool> {
        if node.children_count() < node.capacity {
            let contained = node.node_mbr.contains(&entry.region);
            node.insert_entry(entry)?;
            self.write_node(node)?;

            if !contained {
                if let Some(parent_id) = path.pop() {
                    let parent = self.tree.read_node(parent_id)?;
                    self.adjust_tree(parent, node, path)?;
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        if self.tree.config.variant == RTreeVariant::RStar
            && !path.is_empty()
            && !overflow.is_set(node.level)
        {
            overflow.set(node.level);
            let reinsert = self.reinsert_data(node, entry)?;

            // Adjust the ancestors for the shrunk node before reinserting,
            // so no ancestor is updated by two insertions at once.
            if let Some(parent_id) = path.pop() {
                let parent = self.tree.read_node(parent_id)?;
                self.adjust_tree(parent, node, path)?;
            }

            for entry in reinsert {
                self.insert_data_at_level(entry, node.level, overflow)?;
            }
            return Ok(true);
        }

        let (mut left, mut right) = self.split(node, entry)?;
        match path.pop() {
            None => {
                let level = node.level;
                self.write_node(&mut left)?;
                self.write_node(&mut right)?;

                let mut root = Node::new_index(level + 1, &self.tree.config);
                root.identifier = self.state.root_id;
                root.insert_entry(Entry::child(left.node_mbr.clone(), left.identifier))?;
                root.insert_entry(Entry::child(right.node_mbr.clone(), right.identifier))?;
                self.write_node(&mut root)?;

                self.state.set_level_count(level, 2);
                self.state.set_level_count(level + 1, 1);
                self.state.tree_height = level + 2;
                log::debug!("Root split, tree height is now {}", self.state.tree_height);
            }
            Some(parent_id) => {
                left.identifier = node.identifier;
                self.write_node(&mut left)?;
                self.write_node(&mut right)?;

                let parent = self.tree.read_node(parent_id)?;
                self.adjust_tree_pair(parent, &left, &right, path, overflow)?;
            }
        }
        Ok(true)
    }

    /// Keeps the entries closest to the node center, persists the node and
    /// returns the evicted entries.
    fn reinsert_data(&mut self, node: &mut Node, entry: Entry) -> SpatialResult<Vec<Entry>> {
        let center = node.node_mbr.center();
        let mut entries = std::mem::take(&mut node.entries);
        entries.push(entry);

        let (reinsert, keep) =
            reinsert_partition(&entries, &center, self.tree.config.reinsert_factor);
        log::trace!(
            "Forced reinsertion at level {}: {} kept, {} evicted",
            node.level,
            keep.len(),
            reinsert.len()
        );

        let mut slots: Vec<Option<Entry>> = entries.into_iter().map(Some).collect();
        node.total_data_length = 0;
        node.node_mbr = Region::empty(node.node_mbr.dimension());
        for i in keep {
            node.insert_entry(take_slot(&mut slots, i)?)?;
        }
        self.write_node(node)?;

        reinsert
            .into_iter()
            .map(|i| take_slot(&mut slots, i))
            .collect()
    }

    /// Splits an overflowing node into two fresh, unstored nodes.
    pub(crate) fn split(&mut self, node: &Node, entry: Entry) -> SpatialResult<(Node, Node)> {
        self.tree.counters.record_split();

        let mut entries = node.entries.clone();
        entries.push(entry);
        let (group1, group2) = match self.tree.config.variant {
            RTreeVariant::Linear | RTreeVariant::Quadratic => {
                rtree_split(&entries, &self.tree.config, node.capacity)
            }
            RTreeVariant::RStar => rstar_split(&entries, &self.tree.config),
        };
        log::trace!(
            "Splitting node {} at level {} into {} + {}",
            node.identifier,
            node.level,
            group1.len(),
            group2.len()
        );

        match node.kind() {
            NodeKind::Leaf => self.split_leaf(node, entries, &group1, &group2),
            NodeKind::Index => self.split_index(node, entries, &group1, &group2),
        }
    }

    /// Inserts an entry top-down at `level`, starting from the root.
    pub(crate) fn insert_data_at_level(
        &mut self,
        entry: Entry,
        level: u32,
        overflow: &mut OverflowTable,
    ) -> SpatialResult<()> {
        let mut path = Vec::new();
        let root = self.tree.read_node(self.state.root_id)?;
        let mut node = self.tree.choose_subtree(root, &entry.region, level, &mut path)?;
        self.insert_data(&mut node, entry, &mut path, overflow)?;
        Ok(())
    }
}

pub(crate) fn take_slot(slots: &mut [Option<Entry>], index: usize) -> SpatialResult<Entry> {
    slots
        .get_mut(index)
        .and_then(Option::take)
        .ok_or_else(|| SpatialError::InvalidState(format!("Entry {} assigned twice", index)))
}

/// Fills a fresh sibling of `template` with the entries named by `group`.
pub(crate) fn materialize(
    template: &Node,
    slots: &mut [Option<Entry>],
    group: &[usize],
    keep_payload: bool,
) -> SpatialResult<Node> {
    let mut node = template.sibling();
    for &i in group {
        let mut entry = take_slot(slots, i)?;
        if !keep_payload {
            entry.payload = None;
        }
        node.insert_entry(entry)?;
    }
    Ok(node)
}

impl From<&Entry> for Data {
    fn from(entry: &Entry) -> Self {
        Data::new(entry.identifier, entry.region.clone(), entry.payload.clone())
    }
}
