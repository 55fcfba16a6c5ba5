//! Community detection strategies

use crate::cluster::Partition;
use crate::graph::HaplotypeGraph;

/// Strategy that splits a haplotype graph into disjoint clusters.
///
/// Implementations must be deterministic: the same graph always yields
/// the same [`Partition`].
pub trait CommunityDetection: Send + Sync {
    /// Partition every vertex of `graph`
    fn detect(&self, graph: &HaplotypeGraph) -> Partition;

    /// Short name used in log messages
    fn name(&self) -> &'static str;
}

/// Union-Find over vertex ids, used to group connected components
pub struct DisjointSets {
    /// Parent pointers (parent[i] = parent of node i)
    parent: Vec<u32>,

    /// Size of each set, valid at roots
    size: Vec<u32>,
}

impl DisjointSets {
    /// Create a new DisjointSets data structure with singleton sets
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
            size: vec![1; size],
        }
    }

    /// Find the root of the set containing x with path compression
    pub fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }

        // Path compression
        let mut node = x;
        while self.parent[node as usize] != root {
            let next = self.parent[node as usize];
            self.parent[node as usize] = root;
            node = next;
        }

        root
    }

    /// Union the sets containing x and y, returning the new root
    pub fn union(&mut self, x: u32, y: u32) -> u32 {
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x == root_y {
            return root_x;
        }

        // Union by size: attach smaller tree under root of larger tree
        let (big, small) = if self.size[root_x as usize] >= self.size[root_y as usize] {
            (root_x, root_y)
        } else {
            (root_y, root_x)
        };
        self.parent[small as usize] = big;
        self.size[big as usize] += self.size[small as usize];

        big
    }

    /// Get the size of the set containing x
    pub fn size(&mut self, x: u32) -> u32 {
        let root = self.find(x);
        self.size[root as usize]
    }

    /// Partition formed by the current sets
    pub fn into_partition(mut self) -> Partition {
        let roots: Vec<usize> = (0..self.parent.len() as u32)
            .map(|x| self.find(x) as usize)
            .collect();
        Partition::from_labels(&roots)
    }
}

/// One cluster per connected component
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectedComponents;

impl CommunityDetection for ConnectedComponents {
    fn detect(&self, graph: &HaplotypeGraph) -> Partition {
        let mut sets = DisjointSets::new(graph.node_count);
        for (u, v, _) in graph.edges() {
            sets.union(u, v);
        }
        sets.into_partition()
    }

    fn name(&self) -> &'static str {
        "connected-components"
    }
}
