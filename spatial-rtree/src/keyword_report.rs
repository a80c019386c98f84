//! Keyword frequency report over a region.
//!
//! Leaf payloads are read as comma-separated text, `"<low>,<high>,..."`.
//! The first field names the low corner of the entry's box and the second
//! the high corner; a keyword is counted when its corner lies inside the
//! report region.

use std::collections::HashMap;

use crate::region::Region;
use crate::rtree::RTree;
use crate::rtree::rtree_types::SpatialResult;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordReport {
    pub counts: HashMap<String, usize>,
    /// Keywords by descending count, ties in ascending keyword order
    pub ranked: Vec<(String, usize)>,
}

impl KeywordReport {
    pub fn from_counts(counts: HashMap<String, usize>) -> Self {
        let mut ranked: Vec<(String, usize)> =
            counts.iter().map(|(k, &v)| (k.clone(), v)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Self { counts, ranked }
    }

    /// The `n` most frequent keywords.
    pub fn top(&self, n: usize) -> &[(String, usize)] {
        &self.ranked[..n.min(self.ranked.len())]
    }
}

impl RTree {
    pub fn keyword_report(&self, region: &Region) -> SpatialResult<KeywordReport> {
        self.inner.check_dimension(region, "keyword_report")?;
        let state = self.inner.state.read();

        let mut counts: HashMap<String, usize> = HashMap::new();
        let root = self.inner.read_node(state.root_id)?;
        let mut stack = Vec::new();
        if root.is_leaf() || root.region().intersects(region) {
            stack.push(root);
        }

        while let Some(node) = stack.pop() {
            if node.is_index() {
                for entry in node.entries() {
                    if entry.region().intersects(region) {
                        stack.push(self.inner.read_node(entry.identifier())?);
                    }
                }
                continue;
            }

            for entry in node.entries() {
                let Some(payload) = entry.payload() else {
                    continue;
                };
                let text = String::from_utf8_lossy(payload);
                let mut fields = text.split(',');
                let low_keyword = fields.next();
                let high_keyword = fields.next();

                if region.contains_point(entry.region().low()) {
                    if let Some(keyword) = low_keyword {
                        *counts.entry(keyword.to_string()).or_insert(0) += 1;
                    }
                }
                if region.contains_point(entry.region().high()) {
                    if let Some(keyword) = high_keyword {
                        *counts.entry(keyword.to_string()).or_insert(0) += 1;
                    }
                }
            }
        }

        Ok(KeywordReport::from_counts(counts))
    }
}
