//! Per-frame overlap and interaction graph.
//!
//! Nodes are the track ids detected in the frame. Every overlapping pair is
//! recorded; an overlapping pair whose z metrics are same-plane becomes an
//! interacting pair and a graph edge. Connected components of two or more ids
//! are reported as groups.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::detect::{PersonMap, TrackId};
use crate::geometry::overlaps;
use crate::zplane::ZPlaneEstimator;

/// Unordered pair of distinct track ids, stored as `(min, max)`.
///
/// Serialized as `[a, b]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey(TrackId, TrackId);

impl PairKey {
    /// Canonical key for `a` and `b`, or `None` when they are the same id.
    pub fn new(a: TrackId, b: TrackId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self(a, b)),
            std::cmp::Ordering::Greater => Some(Self(b, a)),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> TrackId {
        self.0
    }

    pub fn second(&self) -> TrackId {
        self.1
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.0 == id || self.1 == id
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// Overlap and interaction results for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameGraph {
    pub overlapping_pairs: BTreeSet<PairKey>,
    pub interacting_pairs: BTreeSet<PairKey>,
    /// Connected components with at least two ids, members ascending,
    /// ordered by smallest member.
    pub groups: Vec<Vec<TrackId>>,
}

impl FrameGraph {
    /// Test every unordered pair of persons for overlap and same-plane.
    ///
    /// Ids missing from `z_metrics` count as 0 and never interact.
    pub fn build(
        persons: &PersonMap,
        z_metrics: &BTreeMap<TrackId, f32>,
        estimator: &ZPlaneEstimator,
    ) -> Self {
        if persons.len() < 2 {
            return Self::default();
        }

        let mut graph = PairGraph::new(persons.keys().copied());
        let mut overlapping_pairs = BTreeSet::new();
        let mut interacting_pairs = BTreeSet::new();

        let people: Vec<_> = persons.values().collect();
        for (i, p1) in people.iter().enumerate() {
            for p2 in &people[i + 1..] {
                if !overlaps(&p1.bbox, &p2.bbox) {
                    continue;
                }
                let Some(pair) = PairKey::new(p1.id, p2.id) else {
                    continue;
                };
                overlapping_pairs.insert(pair);

                let z1 = z_metrics.get(&p1.id).copied().unwrap_or(0.0);
                let z2 = z_metrics.get(&p2.id).copied().unwrap_or(0.0);
                if estimator.same_plane(z1, z2) {
                    interacting_pairs.insert(pair);
                    graph.add_edge(pair);
                }
            }
        }

        Self {
            overlapping_pairs,
            interacting_pairs,
            groups: graph.groups(),
        }
    }
}

/// Undirected graph over track ids with union-find components.
#[derive(Clone, Debug, Default)]
pub struct PairGraph {
    nodes: Vec<TrackId>,
    index: BTreeMap<TrackId, usize>,
    parent: Vec<usize>,
    edges: BTreeSet<PairKey>,
}

impl PairGraph {
    pub fn new(ids: impl IntoIterator<Item = TrackId>) -> Self {
        let mut graph = Self::default();
        for id in ids {
            graph.add_node(id);
        }
        graph
    }

    pub fn add_node(&mut self, id: TrackId) -> usize {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(id);
        self.parent.push(idx);
        self.index.insert(id, idx);
        idx
    }

    /// Adds an edge, creating missing endpoints.
    pub fn add_edge(&mut self, pair: PairKey) {
        let a = self.add_node(pair.first());
        let b = self.add_node(pair.second());
        if self.edges.insert(pair) {
            let ra = self.find(a);
            let rb = self.find(b);
            if ra != rb {
                self.parent[ra.max(rb)] = ra.min(rb);
            }
        }
    }

    pub fn edges(&self) -> impl Iterator<Item = &PairKey> {
        self.edges.iter()
    }

    /// All connected components, including isolated nodes.
    pub fn connected_components(&self) -> Vec<Vec<TrackId>> {
        let mut roots = self.parent.clone();
        let mut by_root: BTreeMap<usize, Vec<TrackId>> = BTreeMap::new();
        for idx in 0..self.nodes.len() {
            let root = find_compress(&mut roots, idx);
            by_root.entry(root).or_default().push(self.nodes[idx]);
        }
        let mut components: Vec<Vec<TrackId>> = by_root
            .into_values()
            .map(|mut ids| {
                ids.sort_unstable();
                ids
            })
            .collect();
        components.sort_by_key(|ids| ids[0]);
        components
    }

    /// Components with at least two members.
    pub fn groups(&self) -> Vec<Vec<TrackId>> {
        self.connected_components()
            .into_iter()
            .filter(|ids| ids.len() >= 2)
            .collect()
    }

    fn find(&mut self, idx: usize) -> usize {
        find_compress(&mut self.parent, idx)
    }
}

fn find_compress(parent: &mut [usize], idx: usize) -> usize {
    let mut root = idx;
    while parent[root] != root {
        root = parent[root];
    }
    let mut cur = idx;
    while parent[cur] != root {
        let next = parent[cur];
        parent[cur] = root;
        cur = next;
    }
    root
}
