//! Range, nearest-neighbor and caller-driven traversals.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::rtree_impl::{RTree, RTreeInner};
use super::rtree_node::{Entry, Node};
use super::rtree_types::{Data, DataId, PageId, SpatialEntry, SpatialError, SpatialResult};
use crate::geometry::{Point, Shape};
use crate::region::Region;

/// Receives query results.
pub trait Visitor {
    /// Called for every node the query loads.
    fn visit_node(&mut self, _node: &Node) {}

    /// Called for every matching data entry.
    fn visit_data(&mut self, data: &Data);
}

impl Visitor for Vec<DataId> {
    fn visit_data(&mut self, data: &Data) {
        self.push(data.identifier());
    }
}

impl Visitor for Vec<Data> {
    fn visit_data(&mut self, data: &Data) {
        self.push(data.clone());
    }
}

/// Distance used to order nearest-neighbor candidates. Must be a lower
/// bound for everything inside the entry's box.
pub trait NearestNeighborComparator {
    fn minimum_distance(&self, query: &dyn Shape, entry: &dyn SpatialEntry) -> f64;
}

impl<F> NearestNeighborComparator for F
where
    F: Fn(&dyn Shape, &dyn SpatialEntry) -> f64,
{
    fn minimum_distance(&self, query: &dyn Shape, entry: &dyn SpatialEntry) -> f64 {
        self(query, entry)
    }
}

/// Distance between the query shape and the entry's box.
#[derive(Debug, Default, Clone, Copy)]
pub struct MinimumDistanceComparator;

impl NearestNeighborComparator for MinimumDistanceComparator {
    fn minimum_distance(&self, query: &dyn Shape, entry: &dyn SpatialEntry) -> f64 {
        query.minimum_distance(entry.region())
    }
}

/// Caller-driven descent: given the node just loaded, return the page to
/// load next, or `None` to stop.
pub trait QueryStrategy {
    fn next_entry(&mut self, node: &Node) -> Option<PageId>;
}

impl<F> QueryStrategy for F
where
    F: FnMut(&Node) -> Option<PageId>,
{
    fn next_entry(&mut self, node: &Node) -> Option<PageId> {
        self(node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeQueryKind {
    Containment,
    Intersection,
}

/// A reference to a subtree, scored without loading it.
struct ChildRef {
    identifier: PageId,
    region: Region,
}

impl SpatialEntry for ChildRef {
    fn identifier(&self) -> i32 {
        self.identifier
    }

    fn region(&self) -> &Region {
        &self.region
    }
}

enum Candidate {
    Subtree(ChildRef),
    Data(Data),
}

impl Candidate {
    fn from_entry(node: &Node, entry: &Entry) -> Self {
        if node.is_leaf() {
            Candidate::Data(Data::from(entry))
        } else {
            Candidate::Subtree(ChildRef {
                identifier: entry.identifier,
                region: entry.region.clone(),
            })
        }
    }

    fn as_entry(&self) -> &dyn SpatialEntry {
        match self {
            Candidate::Subtree(child) => child,
            Candidate::Data(data) => data,
        }
    }
}

/// Priority queue item; the heap pops the smallest distance first, in
/// insertion order among equal distances.
struct QueueItem {
    distance: f64,
    sequence: u64,
    candidate: Candidate,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl RTreeInner {
    fn range_query(
        &self,
        root_id: PageId,
        kind: RangeQueryKind,
        query: &dyn Shape,
        visitor: &mut dyn Visitor,
    ) -> SpatialResult<()> {
        let root = self.read_node(root_id)?;
        let mut stack = Vec::new();
        if root.children_count() > 0 && query.intersects_region(root.region()) {
            stack.push(root);
        }

        while let Some(node) = stack.pop() {
            visitor.visit_node(&node);

            if node.is_leaf() {
                for entry in node.entries() {
                    let hit = match kind {
                        RangeQueryKind::Containment => query.contains_region(&entry.region),
                        RangeQueryKind::Intersection => query.intersects_region(&entry.region),
                    };
                    if hit {
                        visitor.visit_data(&Data::from(entry));
                        self.counters.record_query_result();
                    }
                }
            } else {
                for entry in node.entries() {
                    if query.intersects_region(&entry.region) {
                        stack.push(self.read_node(entry.identifier)?);
                    }
                }
            }
        }
        Ok(())
    }

    /// Best-first search. Subtrees are loaded only when they reach the head
    /// of the queue, so a small `k` touches few pages.
    fn nearest_neighbor_query(
        &self,
        root_id: PageId,
        k: usize,
        query: &dyn Shape,
        visitor: &mut dyn Visitor,
        comparator: &dyn NearestNeighborComparator,
    ) -> SpatialResult<()> {
        if k == 0 {
            return Ok(());
        }

        let mut queue = BinaryHeap::new();
        let mut sequence = 0u64;
        queue.push(QueueItem {
            distance: 0.0,
            sequence,
            candidate: Candidate::Subtree(ChildRef {
                identifier: root_id,
                region: Region::empty(self.config.dimension),
            }),
        });

        let mut count = 0usize;
        let mut knearest = 0.0;

        while let Some(item) = queue.pop() {
            match item.candidate {
                Candidate::Subtree(child) => {
                    let node = self.read_node(child.identifier)?;
                    visitor.visit_node(&node);

                    for entry in node.entries() {
                        let candidate = Candidate::from_entry(&node, entry);
                        let distance = comparator.minimum_distance(query, candidate.as_entry());
                        sequence += 1;
                        queue.push(QueueItem {
                            distance,
                            sequence,
                            candidate,
                        });
                    }
                }
                Candidate::Data(data) => {
                    // Keep reporting entries tied with the k-th distance.
                    if count >= k && item.distance > knearest {
                        break;
                    }
                    visitor.visit_data(&data);
                    self.counters.record_query_result();
                    count += 1;
                    knearest = item.distance;
                }
            }
        }
        Ok(())
    }
}

impl RTree {
    /// Reports every entry whose box intersects `query`.
    pub fn intersection_query(&self, query: &dyn Shape, visitor: &mut dyn Visitor) -> SpatialResult<()> {
        self.inner.check_dimension(query, "intersection_query")?;
        let state = self.inner.state.read();
        self.inner
            .range_query(state.root_id, RangeQueryKind::Intersection, query, visitor)
    }

    /// Reports every entry whose box lies inside `query`.
    pub fn containment_query(&self, query: &dyn Shape, visitor: &mut dyn Visitor) -> SpatialResult<()> {
        self.inner.check_dimension(query, "containment_query")?;
        let state = self.inner.state.read();
        self.inner
            .range_query(state.root_id, RangeQueryKind::Containment, query, visitor)
    }

    /// Reports every entry whose box contains `point`.
    pub fn point_location_query(&self, point: &Point, visitor: &mut dyn Visitor) -> SpatialResult<()> {
        self.intersection_query(point, visitor)
    }

    /// Reports the `k` entries closest to `query`, nearest first, plus any
    /// entries tied with the k-th distance.
    pub fn nearest_neighbor_query(
        &self,
        k: usize,
        query: &dyn Shape,
        visitor: &mut dyn Visitor,
    ) -> SpatialResult<()> {
        self.nearest_neighbor_query_with(k, query, visitor, &MinimumDistanceComparator)
    }

    /// Nearest-neighbor search ordered by a caller-supplied distance.
    pub fn nearest_neighbor_query_with(
        &self,
        k: usize,
        query: &dyn Shape,
        visitor: &mut dyn Visitor,
        comparator: &dyn NearestNeighborComparator,
    ) -> SpatialResult<()> {
        self.inner.check_dimension(query, "nearest_neighbor_query")?;
        let state = self.inner.state.read();
        self.inner
            .nearest_neighbor_query(state.root_id, k, query, visitor, comparator)
    }

    /// Starts at the root and lets `strategy` pick each next page to load.
    pub fn query_strategy(&self, strategy: &mut dyn QueryStrategy) -> SpatialResult<()> {
        let state = self.inner.state.read();
        let mut next = state.root_id;
        loop {
            let node = self.inner.read_node(next)?;
            match strategy.next_entry(&node) {
                Some(id) => next = id,
                None => return Ok(()),
            }
        }
    }

    /// Bounding box of all data, read from the root page.
    pub fn bounds(&self) -> SpatialResult<Region> {
        let state = self.inner.state.read();
        let root = self.inner.read_node(state.root_id)?;
        if root.children_count() == 0 {
            return Err(SpatialError::InvalidState("The tree is empty".to_string()));
        }
        Ok(root.region().clone())
    }
}
