use isobar_core::{AdjacencyConfig, GraphBuilder, GridReconstructor, NodeValues};
use isobar_grid::{DType, Grid};
use proptest::prelude::*;

fn grid_strategy() -> impl Strategy<Value = Grid> {
    prop::collection::vec(1usize..7, 1..4).prop_flat_map(|dims| {
        let n: usize = dims.iter().product();
        prop::collection::vec(-100.0f64..100.0, n)
            .prop_map(move |data| Grid::from_f64(&dims, &data).unwrap())
    })
}

// Property 1: reconstructing from node ids restores every cell exactly once
proptest! {
    #[test]
    fn prop_bijection_integrity(grid in grid_strategy(), tile_edge in 1usize..4) {
        let tile = vec![tile_edge; grid.shape().ndim()];
        let builder = GraphBuilder::new(AdjacencyConfig::default().with_tile(&tile));
        let (graph, mapping) = builder.build(&grid).unwrap();

        prop_assert_eq!(graph.num_nodes(), mapping.num_nodes());
        prop_assert!(mapping.verify().is_ok());

        let ids = NodeValues::from_dense((0..mapping.num_nodes()).map(|n| n as f64).collect());
        let out = GridReconstructor::new(&mapping).reconstruct(&ids, DType::F64).unwrap();
        prop_assert_eq!(out.len(), grid.len());

        let mut per_node = vec![0usize; mapping.num_nodes()];
        for (cell, &v) in out.values().iter().enumerate() {
            let node = v as usize;
            prop_assert_eq!(node, mapping.node_of(cell));
            per_node[node] += 1;
        }
        for node in 0..mapping.num_nodes() {
            prop_assert_eq!(per_node[node], mapping.cells_of(node).len());
        }
    }
}

// Property 2: unit tiles give one node per cell and the edge set is symmetric
proptest! {
    #[test]
    fn prop_graph_symmetric(grid in grid_strategy(), k in 0usize..10) {
        let builder = GraphBuilder::new(AdjacencyConfig::default().with_neighbors(k));
        let (graph, _) = builder.build(&grid).unwrap();

        prop_assert_eq!(graph.num_nodes(), grid.len());
        prop_assert!(graph.is_symmetric());
        for e in graph.edges() {
            prop_assert!(e.source < e.target);
            prop_assert!(e.weight >= 0.0);
        }
    }
}

// Property 3: construction is deterministic
proptest! {
    #[test]
    fn prop_build_deterministic(grid in grid_strategy()) {
        let builder = GraphBuilder::default();
        let (a, _) = builder.build(&grid).unwrap();
        let (b, _) = builder.build(&grid).unwrap();

        prop_assert_eq!(a.edges(), b.edges());
        prop_assert_eq!(a.nodes(), b.nodes());
    }
}

#[test]
fn test_zero_dimension_rejected() {
    // A zero extent never reaches the builder: the grid itself refuses it.
    assert!(Grid::from_f64(&[3, 0], &[]).is_err());
}
