use crate::mapping::{NodeId, NodeMapping};
use isobar_grid::{Grid, GridError, Shape};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Invalid shape: {0}")]
    InvalidShape(String),
    #[error("Node mapping is not a bijection: {0}")]
    BrokenMapping(String),
    #[error("Grid error: {0}")]
    Grid(GridError),
}

impl From<GridError> for GraphError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::InvalidShape(msg) => GraphError::InvalidShape(msg),
            other => GraphError::Grid(other),
        }
    }
}

/// Adjacency rule used by [`GraphBuilder`].
///
/// # Rule
/// Each node links to its `neighbors` nearest nodes by squared Euclidean
/// distance in node-lattice coordinates, ties broken by lexicographic order of
/// the neighbor's coordinate. Candidates are limited to the smallest ball that
/// holds `neighbors` lattice offsets, so nodes near the boundary may end up
/// with fewer. The directed picks are then symmetrized.
///
/// `neighbors = None` picks the face neighbors (`2 · ndim`). An empty `tile`
/// means one node per cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdjacencyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighbors: Option<usize>,
    #[serde(default)]
    pub tile: Vec<usize>,
}

impl AdjacencyConfig {
    pub fn with_neighbors(mut self, k: usize) -> Self {
        self.neighbors = Some(k);
        self
    }

    pub fn with_tile(mut self, tile: &[usize]) -> Self {
        self.tile = tile.to_vec();
        self
    }

    fn neighbors_for(&self, ndim: usize) -> usize {
        self.neighbors.unwrap_or(2 * ndim)
    }
}

/// Normalization applied to node values when seeding features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub std: f64,
}

impl FeatureStats {
    /// Population mean/std of `values`. A zero or non-finite spread
    /// normalizes with `std = 1`.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self { mean: 0.0, std: 1.0 };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let std = var.sqrt();
        let std = if std.is_finite() && std > 0.0 { std } else { 1.0 };
        let mean = if mean.is_finite() { mean } else { 0.0 };
        Self { mean, std }
    }

    #[inline]
    pub fn normalize(&self, v: f64) -> f64 {
        (v - self.mean) / self.std
    }

    #[inline]
    pub fn denormalize(&self, v: f64) -> f64 {
        v * self.std + self.mean
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Mean of the finite cell values in the node's tile (0 if there are none).
    pub value: f64,
    /// `[normalized value, normalized centre coordinate per dimension]`
    pub features: Vec<f32>,
}

/// Undirected edge, stored once with `source < target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    /// Absolute difference of the endpoints' node values.
    pub weight: f32,
}

#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    adj_offsets: Vec<usize>,
    adj: Vec<NodeId>,
    stats: FeatureStats,
    lattice: Shape,
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn stats(&self) -> FeatureStats {
        self.stats
    }

    pub fn lattice(&self) -> &Shape {
        &self.lattice
    }

    /// Sorted neighbors of `node` (both directions of every edge).
    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.adj[self.adj_offsets[node]..self.adj_offsets[node + 1]]
    }

    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }

    /// Whether every adjacency entry has its reverse.
    pub fn is_symmetric(&self) -> bool {
        (0..self.num_nodes()).all(|a| self.neighbors(a).iter().all(|&b| self.has_edge(b, a)))
    }
}

/// Converts a dense grid into a [`Graph`] plus its [`NodeMapping`].
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    config: AdjacencyConfig,
}

impl GraphBuilder {
    pub fn new(config: AdjacencyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdjacencyConfig {
        &self.config
    }

    /// Node mapping for a grid of `shape` under this builder's tiling. The
    /// decompression side uses this to rebuild the bijection from a header.
    pub fn mapping_for(&self, shape: &Shape) -> Result<NodeMapping, GraphError> {
        NodeMapping::new(shape, &self.config.tile)
    }

    /// Build the graph for `grid`.
    ///
    /// # Algorithm
    /// 1. Partition cells into tiles; one node per tile, row-major ids
    /// 2. Node value = mean of the tile's finite cells
    /// 3. Features = normalized value and normalized tile centre
    /// 4. k-NN over lattice offsets (see [`AdjacencyConfig`]), symmetrized
    pub fn build(&self, grid: &Grid) -> Result<(Graph, NodeMapping), GraphError> {
        let mapping = self.mapping_for(grid.shape())?;
        let lattice = mapping.lattice().clone();
        let values = grid.values();

        let node_values: Vec<f64> = (0..mapping.num_nodes())
            .into_par_iter()
            .map(|node| {
                let (sum, count) = mapping
                    .cells_of(node)
                    .iter()
                    .map(|&c| values[c])
                    .filter(|v| v.is_finite())
                    .fold((0.0f64, 0usize), |(s, n), v| (s + v, n + 1));
                if count == 0 {
                    0.0
                } else {
                    sum / count as f64
                }
            })
            .collect();

        let stats = FeatureStats::from_values(&node_values);
        let extents: Vec<f64> = grid
            .dims()
            .iter()
            .map(|&d| (d.saturating_sub(1)).max(1) as f64)
            .collect();

        let nodes: Vec<Node> = node_values
            .par_iter()
            .enumerate()
            .map(|(id, &value)| {
                let mut features = Vec::with_capacity(1 + extents.len());
                features.push(stats.normalize(value) as f32);
                for (c, e) in mapping.node_centre(id).iter().zip(&extents) {
                    features.push((c / e) as f32);
                }
                Node { id, value, features }
            })
            .collect();

        let k = self.config.neighbors_for(lattice.ndim());
        let offsets = neighbor_offsets(lattice.ndim(), k);
        let picks: Vec<Vec<NodeId>> = (0..lattice.len())
            .into_par_iter()
            .map(|node| nearest_neighbors(&lattice, node, &offsets, k))
            .collect();

        let mut pairs: Vec<(NodeId, NodeId)> = picks
            .iter()
            .enumerate()
            .flat_map(|(a, nbrs)| nbrs.iter().map(move |&b| (a.min(b), a.max(b))))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();

        let edges: Vec<Edge> = pairs
            .iter()
            .map(|&(source, target)| Edge {
                source,
                target,
                weight: (node_values[source] - node_values[target]).abs() as f32,
            })
            .collect();

        let (adj_offsets, adj) = build_adjacency(lattice.len(), &pairs);

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            k,
            tile = ?mapping.tile(),
            "built grid graph"
        );

        Ok((
            Graph {
                nodes,
                edges,
                adj_offsets,
                adj,
                stats,
                lattice,
            },
            mapping,
        ))
    }
}

/// Lattice offsets inside the smallest ball holding at least `k` non-zero
/// offsets, ordered by (squared length, lexicographic offset).
pub(crate) fn neighbor_offsets(ndim: usize, k: usize) -> Vec<Vec<isize>> {
    if k == 0 || ndim == 0 {
        return Vec::new();
    }
    let mut radius: isize = 1;
    loop {
        let mut all = box_offsets(ndim, radius);
        all.sort_by(|a, b| norm2(a).cmp(&norm2(b)).then_with(|| a.cmp(b)));
        if all.len() >= k {
            let kth = norm2(&all[k - 1]);
            // The box contains the whole ball of squared radius r² only up to r².
            if kth <= (radius * radius) as usize {
                all.retain(|o| norm2(o) <= kth);
                return all;
            }
        }
        radius += 1;
    }
}

fn box_offsets(ndim: usize, radius: isize) -> Vec<Vec<isize>> {
    let side = (2 * radius + 1) as usize;
    let total = side.pow(ndim as u32);
    let mut out = Vec::with_capacity(total.saturating_sub(1));
    for mut i in 0..total {
        let mut o = vec![0isize; ndim];
        for axis in (0..ndim).rev() {
            o[axis] = (i % side) as isize - radius;
            i /= side;
        }
        if o.iter().any(|&x| x != 0) {
            out.push(o);
        }
    }
    out
}

#[inline]
fn norm2(o: &[isize]) -> usize {
    o.iter().map(|&x| (x * x) as usize).sum()
}

fn nearest_neighbors(lattice: &Shape, node: NodeId, offsets: &[Vec<isize>], k: usize) -> Vec<NodeId> {
    let dims = lattice.dims();
    let mut coord = vec![0usize; dims.len()];
    lattice.coord_into(node, &mut coord);

    let mut out = Vec::with_capacity(k);
    for off in offsets {
        if out.len() == k {
            break;
        }
        let mut idx = 0usize;
        let mut inside = true;
        for ((&c, &o), (&d, &s)) in coord.iter().zip(off).zip(dims.iter().zip(lattice.strides())) {
            let n = c as isize + o;
            if n < 0 || n as usize >= d {
                inside = false;
                break;
            }
            idx += n as usize * s;
        }
        if inside {
            out.push(idx);
        }
    }
    out
}

fn build_adjacency(num_nodes: usize, pairs: &[(NodeId, NodeId)]) -> (Vec<usize>, Vec<NodeId>) {
    let mut degree = vec![0usize; num_nodes];
    for &(a, b) in pairs {
        degree[a] += 1;
        degree[b] += 1;
    }
    let mut offsets = Vec::with_capacity(num_nodes + 1);
    offsets.push(0);
    for d in &degree {
        let last = offsets[offsets.len() - 1];
        offsets.push(last + d);
    }
    let mut cursor = offsets[..num_nodes].to_vec();
    let mut adj = vec![0; offsets[num_nodes]];
    for &(a, b) in pairs {
        adj[cursor[a]] = b;
        cursor[a] += 1;
        adj[cursor[b]] = a;
        cursor[b] += 1;
    }
    for node in 0..num_nodes {
        adj[offsets[node]..offsets[node + 1]].sort_unstable();
    }
    (offsets, adj)
}
