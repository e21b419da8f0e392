use crate::graph::GraphError;
use isobar_grid::Shape;

/// Stable node identifier: the row-major index of the node in its lattice.
pub type NodeId = usize;

/// Explicit node ↔ cell bijection produced by [`GraphBuilder`](crate::GraphBuilder).
///
/// The grid is partitioned into tiles of `tile` cells per dimension (edge
/// tiles may be partial). Each tile is one node, and nodes are numbered in
/// row-major order over the node lattice. Two tables are kept:
/// - `cell_to_node`: for every cell, the node that owns it
/// - `node_offsets` / `node_cells`: for every node, its cells (CSR layout,
///   cells in increasing row-major order)
///
/// With unit tiles the mapping is the identity and every node is one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMapping {
    shape: Shape,
    tile: Vec<usize>,
    lattice: Shape,
    cell_to_node: Vec<NodeId>,
    node_offsets: Vec<usize>,
    node_cells: Vec<usize>,
}

impl NodeMapping {
    /// Build the mapping for `shape` tiled by `tile`. An empty `tile` means
    /// one node per cell.
    pub fn new(shape: &Shape, tile: &[usize]) -> Result<Self, GraphError> {
        let tile: Vec<usize> = if tile.is_empty() {
            vec![1; shape.ndim()]
        } else {
            tile.to_vec()
        };
        if tile.len() != shape.ndim() {
            return Err(GraphError::InvalidShape(format!(
                "tile rank {} does not match grid rank {}",
                tile.len(),
                shape.ndim()
            )));
        }
        if tile.iter().any(|&t| t == 0) {
            return Err(GraphError::InvalidShape(format!("tile {:?} has a zero extent", tile)));
        }

        let lattice_dims: Vec<usize> = shape
            .dims()
            .iter()
            .zip(&tile)
            .map(|(&d, &t)| d.div_ceil(t))
            .collect();
        let lattice = Shape::new(&lattice_dims)?;

        let ndim = shape.ndim();
        let mut coord = vec![0usize; ndim];
        let mut cell_to_node = Vec::with_capacity(shape.len());
        let mut counts = vec![0usize; lattice.len()];
        for cell in 0..shape.len() {
            shape.coord_into(cell, &mut coord);
            let node: usize = coord
                .iter()
                .zip(&tile)
                .zip(lattice.strides())
                .map(|((&c, &t), &s)| (c / t) * s)
                .sum();
            counts[node] += 1;
            cell_to_node.push(node);
        }

        let mut node_offsets = Vec::with_capacity(lattice.len() + 1);
        node_offsets.push(0);
        for &c in &counts {
            let last = node_offsets[node_offsets.len() - 1];
            node_offsets.push(last + c);
        }

        // Cells are visited in increasing order, so each node's slice ends up sorted.
        let mut cursor = node_offsets[..lattice.len()].to_vec();
        let mut node_cells = vec![0usize; shape.len()];
        for (cell, &node) in cell_to_node.iter().enumerate() {
            node_cells[cursor[node]] = cell;
            cursor[node] += 1;
        }

        Ok(Self {
            shape: shape.clone(),
            tile,
            lattice,
            cell_to_node,
            node_offsets,
            node_cells,
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn tile(&self) -> &[usize] {
        &self.tile
    }

    /// The node lattice: one entry per node, row-major.
    pub fn lattice(&self) -> &Shape {
        &self.lattice
    }

    pub fn num_nodes(&self) -> usize {
        self.lattice.len()
    }

    pub fn num_cells(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn node_of(&self, cell: usize) -> NodeId {
        self.cell_to_node[cell]
    }

    pub fn cell_to_node(&self) -> &[NodeId] {
        &self.cell_to_node
    }

    #[inline]
    pub fn cells_of(&self, node: NodeId) -> &[usize] {
        &self.node_cells[self.node_offsets[node]..self.node_offsets[node + 1]]
    }

    /// Centre of a node's tile in cell coordinates.
    pub fn node_centre(&self, node: NodeId) -> Vec<f64> {
        let mut coord = vec![0usize; self.lattice.ndim()];
        self.lattice.coord_into(node, &mut coord);
        coord
            .iter()
            .zip(&self.tile)
            .zip(self.shape.dims())
            .map(|((&c, &t), &d)| {
                let start = c * t;
                let end = (start + t).min(d);
                (start + end - 1) as f64 / 2.0
            })
            .collect()
    }

    /// Check that the two tables describe the same partition: every cell is
    /// owned by exactly one node and listed under that node exactly once.
    pub fn verify(&self) -> Result<(), GraphError> {
        let mut seen = vec![false; self.num_cells()];
        for node in 0..self.num_nodes() {
            for &cell in self.cells_of(node) {
                if cell >= seen.len() || seen[cell] || self.cell_to_node[cell] != node {
                    return Err(GraphError::BrokenMapping(format!(
                        "cell {} listed inconsistently under node {}",
                        cell, node
                    )));
                }
                seen[cell] = true;
            }
        }
        if let Some(cell) = seen.iter().position(|&s| !s) {
            return Err(GraphError::BrokenMapping(format!("cell {} has no node", cell)));
        }
        Ok(())
    }
}
