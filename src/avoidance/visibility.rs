//! Visibility road map over obstacle bounding polygons.
//!
//! Nodes are the start, the goal and every bounding polygon vertex pushed
//! slightly outward. Two nodes are linked when the segment between them
//! crosses no bounding polygon edge. The shortest path is searched with A*
//! using the euclidean distance to the goal as heuristic.

use nalgebra as na;
use petgraph::{
    algo::astar,
    graph::{NodeIndex, UnGraph},
};
use tracing::trace;

use super::engine::PathSolver;
use crate::{
    context::TableBounds,
    obstacle::{Obstacle, Vertex},
};

pub struct VisibilityRoadMap {
    table: TableBounds,
    /// nodes further than this from the start are ignored, the goal excepted
    max_distance: f64,
    /// outward push applied to polygon vertices so they sit outside the polygon
    expand_distance: f64,
    obstacles: Vec<Obstacle>,
}

impl VisibilityRoadMap {
    pub fn new(table: TableBounds, max_distance: f64, expand_distance: f64) -> Self {
        Self {
            table,
            max_distance,
            expand_distance,
            obstacles: vec![],
        }
    }

    pub fn set_table(&mut self, table: TableBounds) {
        self.table = table;
    }

    fn segment_free(&self, a: &Vertex, b: &Vertex, ignored: &[usize]) -> bool {
        !self
            .obstacles
            .iter()
            .enumerate()
            .filter(|(index, _)| !ignored.contains(index))
            .any(|(_, obstacle)| obstacle.intersects_segment(a, b))
    }

    fn expanded_vertices(&self, obstacle: &Obstacle) -> Vec<Vertex> {
        let count = obstacle.bounding_box.len() as f64;
        let centroid = obstacle
            .bounding_box
            .iter()
            .fold(na::Vector2::zeros(), |sum, v| sum + v.point().coords)
            / count;
        obstacle
            .bounding_box
            .iter()
            .map(|vertex| {
                let direction = vertex.point().coords - centroid;
                let norm = direction.norm();
                if norm <= f64::EPSILON {
                    return *vertex;
                }
                Vertex::from(vertex.point() + direction / norm * self.expand_distance)
            })
            .collect()
    }
}

impl PathSolver for VisibilityRoadMap {
    fn set_obstacles(&mut self, obstacles: &[Obstacle]) {
        self.obstacles = obstacles.to_vec();
    }

    fn check_recompute(&self, start: &Vertex, goal: &Vertex) -> bool {
        !self.segment_free(start, goal, &[])
    }

    fn solve(&self, start: &Vertex, goal: &Vertex) -> Option<Vec<Vertex>> {
        // obstacles the robot already stands in must not trap it
        let ignored: Vec<usize> = self
            .obstacles
            .iter()
            .enumerate()
            .filter(|(_, o)| o.bounding_box_contains(start))
            .map(|(index, _)| index)
            .collect();

        let mut graph: UnGraph<Vertex, f64> = UnGraph::new_undirected();
        let start_index = graph.add_node(*start);
        let goal_index = graph.add_node(*goal);

        for (index, obstacle) in self.obstacles.iter().enumerate() {
            if ignored.contains(&index) {
                continue;
            }
            for vertex in self.expanded_vertices(obstacle) {
                if !self.table.contains(&vertex) {
                    continue;
                }
                if na::distance(&vertex.point(), &start.point()) > self.max_distance {
                    continue;
                }
                if self
                    .obstacles
                    .iter()
                    .any(|other| other.bounding_box_contains(&vertex))
                {
                    continue;
                }
                graph.add_node(vertex);
            }
        }

        let nodes: Vec<NodeIndex> = graph.node_indices().collect();
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                let (va, vb) = (graph[*a], graph[*b]);
                if self.segment_free(&va, &vb, &ignored) {
                    graph.add_edge(*a, *b, na::distance(&va.point(), &vb.point()));
                }
            }
        }
        trace!(
            "Visibility graph has {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        let goal_point = goal.point();
        let (_, path) = astar(
            &graph,
            start_index,
            |node| node == goal_index,
            |edge| *edge.weight(),
            |node| na::distance(&graph[node].point(), &goal_point),
        )?;
        Some(path.into_iter().map(|node| graph[node]).collect())
    }
}
