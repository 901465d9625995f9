use crate::engine::Point;
use crate::error::{AdventureError, Result};
use crate::stage::{NodeId, RenderSurface};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

// =============================================================================
// GRID PATHFINDING
// =============================================================================
//
// The room is searched on a coarse grid laid over the canvas. Nothing is
// precomputed: every cell is checked against the render surface when the
// search reaches it, so moving items change the result straight away.
//
//   ┌─────┬─────┬─────┐
//   │ ↖   │  ↑  │   ↗ │    8 neighbours, one grid step each
//   ├─────┼─────┼─────┤
//   │ ←   │  ●  │   → │    ● walkable = floor under it and nothing else
//   ├─────┼─────┼─────┤      (except the excluded nodes)
//   │ ↙   │  ↓  │   ↘ │
//   └─────┴─────┴─────┘
//
// Cells are expanded first in, first out. A cell's distance is raised to
// `current + step` when a neighbour reaches it, never lowered, and cells
// that were already expanded keep theirs. The path is read backwards from
// the end by always moving to the neighbour with the smallest distance.

pub const DEFAULT_NODE_DISTANCE: f64 = 100.0;
pub const DEFAULT_MAX_NODES: usize = 10_000;

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Grid step in pixels
    pub node_distance: f64,
    /// Cells to expand before giving up
    pub max_nodes: usize,
}

impl Default for PathConfig {
    fn default() -> Self {
        PathConfig {
            node_distance: DEFAULT_NODE_DISTANCE,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

type Cell = (i64, i64);

fn to_cell(point: Point, step: f64) -> Cell {
    (
        (point.x / step).floor() as i64,
        (point.y / step).floor() as i64,
    )
}

fn to_point(cell: Cell, step: f64) -> Point {
    Point::new(cell.0 as f64 * step, cell.1 as f64 * step)
}

fn neighbours(cell: Cell) -> impl Iterator<Item = Cell> {
    NEIGHBOURS
        .iter()
        .map(move |(dx, dy)| (cell.0 + dx, cell.1 + dy))
}

/// The floor is under `point` and every other node there is excluded
pub fn is_walkable(
    surface: &dyn RenderSurface,
    floor: NodeId,
    point: Point,
    excluded: &[NodeId],
) -> bool {
    let objects = surface.objects_at_point(point);
    objects.contains(&floor)
        && objects
            .iter()
            .all(|id| *id == floor || excluded.contains(id))
}

/// Waypoints from `start` (not included) to `end` (included), snapped to the
/// grid. Empty when both fall into the same cell.
pub fn find_path(
    surface: &dyn RenderSurface,
    floor: NodeId,
    start: Point,
    end: Point,
    excluded: &[NodeId],
    config: &PathConfig,
) -> Result<Vec<Point>> {
    let step = config.node_distance;
    if step.is_nan() || step <= 0.0 {
        return Err(AdventureError::configuration(format!(
            "path node distance must be positive, got {step}"
        )));
    }
    let no_path = || AdventureError::NoPathFound {
        from: (start.x, start.y),
        to: (end.x, end.y),
    };

    let start_cell = to_cell(start, step);
    let end_cell = to_cell(end, step);
    if start_cell == end_cell {
        return Ok(Vec::new());
    }

    let mut distances: HashMap<Cell, f64> = HashMap::from([(start_cell, 0.0)]);
    let mut visited: HashSet<Cell> = HashSet::new();
    let mut queued: HashSet<Cell> = HashSet::new();
    let mut to_visit: VecDeque<Cell> = VecDeque::new();
    let mut current = start_cell;
    let mut expanded = 0;

    while current != end_cell {
        expanded += 1;
        if expanded > config.max_nodes {
            log::warn!(
                "Gave up looking for a path after {} nodes",
                config.max_nodes
            );
            return Err(no_path());
        }
        visited.insert(current);
        let current_distance = distances.get(&current).copied().unwrap_or_default();

        for next in neighbours(current) {
            // expanded cells keep their distance, the start has to stay at 0
            // for the backtrack to end there
            if visited.contains(&next) {
                continue;
            }
            if !is_walkable(surface, floor, to_point(next, step), excluded) {
                continue;
            }
            if queued.insert(next) {
                to_visit.push_back(next);
            }
            let reached = current_distance + step;
            let distance = distances.entry(next).or_insert(reached);
            *distance = distance.max(reached);
        }

        current = to_visit.pop_front().ok_or_else(no_path)?;
    }

    backtrack(&distances, start_cell, end_cell)
        .map(|cells| cells.into_iter().map(|cell| to_point(cell, step)).collect())
        .ok_or_else(no_path)
}

/// Walk down the distance map from `end` to `start`
fn backtrack(distances: &HashMap<Cell, f64>, start: Cell, end: Cell) -> Option<Vec<Cell>> {
    let mut path = VecDeque::new();
    let mut current = end;
    // every step lands on a strictly smaller distance, so this is an upper bound
    for _ in 0..distances.len() {
        if current == start {
            return Some(path.into());
        }
        path.push_front(current);
        current = neighbours(current)
            .filter_map(|cell| distances.get(&cell).map(|distance| (cell, *distance)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(cell, _)| cell)?;
    }
    (current == start).then(|| path.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Size;
    use crate::stage::{RenderNode, Stage};

    const FLOOR: NodeId = NodeId::new(0);

    fn room() -> Stage {
        let mut stage = Stage::new();
        stage.add_node(&RenderNode::shape(
            FLOOR,
            vec![
                Point::new(0.0, 0.0),
                Point::new(1000.0, 0.0),
                Point::new(1000.0, 1000.0),
                Point::new(0.0, 1000.0),
            ],
            "rgba(255, 255, 255, 0.21)",
        ));
        stage
    }

    fn block(stage: &mut Stage, id: u32, position: Point, size: Size) -> NodeId {
        let mut node = RenderNode::bitmap(NodeId::new(id), "crate.png", size);
        node.position = position;
        stage.add_node(&node);
        node.id
    }

    fn assert_connected(start: Point, path: &[Point], step: f64) {
        let mut previous = to_cell(start, step);
        for point in path {
            let cell = to_cell(*point, step);
            assert!(
                (cell.0 - previous.0).abs() <= 1 && (cell.1 - previous.1).abs() <= 1,
                "{previous:?} -> {cell:?} is not a single step"
            );
            assert_ne!(cell, previous);
            previous = cell;
        }
    }

    #[test]
    fn same_cell_is_an_empty_path() {
        let stage = room();
        let path = find_path(
            &stage,
            FLOOR,
            Point::new(150.0, 150.0),
            Point::new(199.0, 120.0),
            &[],
            &PathConfig::default(),
        );
        assert_eq!(path, Ok(Vec::new()));
    }

    #[test]
    fn open_floor_path_ends_on_the_snapped_target() {
        let stage = room();
        let start = Point::new(150.0, 150.0);
        let path = find_path(
            &stage,
            FLOOR,
            start,
            Point::new(460.0, 170.0),
            &[],
            &PathConfig::default(),
        )
        .unwrap();
        assert_eq!(path.last(), Some(&Point::new(400.0, 100.0)));
        assert!(!path.contains(&Point::new(100.0, 100.0)));
        assert_connected(start, &path, DEFAULT_NODE_DISTANCE);
    }

    #[test]
    fn routes_around_obstacles() {
        let mut stage = room();
        let wall = block(
            &mut stage,
            1,
            Point::new(400.0, 0.0),
            Size::new(200.0, 700.0),
        );
        let start = Point::new(150.0, 150.0);
        let path = find_path(
            &stage,
            FLOOR,
            start,
            Point::new(850.0, 150.0),
            &[],
            &PathConfig::default(),
        )
        .unwrap();

        assert_eq!(path.last(), Some(&Point::new(800.0, 100.0)));
        assert_connected(start, &path, DEFAULT_NODE_DISTANCE);
        for point in &path {
            assert!(
                !stage.objects_at_point(*point).contains(&wall),
                "{point:?} is inside the wall"
            );
        }
        assert!(path.iter().any(|point| point.y >= 700.0));
    }

    #[test]
    fn excluded_nodes_are_not_obstacles() {
        let mut stage = room();
        let wall = block(
            &mut stage,
            1,
            Point::new(400.0, 0.0),
            Size::new(200.0, 1000.0),
        );
        let start = Point::new(150.0, 150.0);
        let end = Point::new(850.0, 150.0);

        let blocked = find_path(&stage, FLOOR, start, end, &[], &PathConfig::default());
        assert_eq!(
            blocked,
            Err(AdventureError::NoPathFound {
                from: (150.0, 150.0),
                to: (850.0, 150.0)
            })
        );

        let path = find_path(&stage, FLOOR, start, end, &[wall], &PathConfig::default()).unwrap();
        assert_eq!(path.last(), Some(&Point::new(800.0, 100.0)));
        assert_connected(start, &path, DEFAULT_NODE_DISTANCE);
    }

    #[test]
    fn enclosed_start_has_no_path() {
        let mut stage = room();
        block(
            &mut stage,
            1,
            Point::new(0.0, 0.0),
            Size::new(300.0, 300.0),
        );
        let result = find_path(
            &stage,
            FLOOR,
            Point::new(150.0, 150.0),
            Point::new(850.0, 850.0),
            &[],
            &PathConfig::default(),
        );
        assert!(matches!(result, Err(AdventureError::NoPathFound { .. })));
    }

    #[test]
    fn targets_off_the_floor_have_no_path() {
        let stage = room();
        let result = find_path(
            &stage,
            FLOOR,
            Point::new(150.0, 150.0),
            Point::new(1500.0, 150.0),
            &[],
            &PathConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn node_limit_stops_the_search() {
        let stage = room();
        let config = PathConfig {
            max_nodes: 1,
            ..PathConfig::default()
        };
        let result = find_path(
            &stage,
            FLOOR,
            Point::new(50.0, 50.0),
            Point::new(950.0, 950.0),
            &[],
            &config,
        );
        assert!(matches!(result, Err(AdventureError::NoPathFound { .. })));
    }

    #[test]
    fn finer_grids_snap_to_their_own_step() {
        let stage = room();
        let config = PathConfig {
            node_distance: 50.0,
            ..PathConfig::default()
        };
        let start = Point::new(120.0, 120.0);
        let path = find_path(&stage, FLOOR, start, Point::new(330.0, 120.0), &[], &config).unwrap();
        assert_eq!(path.last(), Some(&Point::new(300.0, 100.0)));
        assert_connected(start, &path, 50.0);

        let zero = PathConfig {
            node_distance: 0.0,
            ..PathConfig::default()
        };
        assert!(matches!(
            find_path(&stage, FLOOR, start, Point::new(330.0, 120.0), &[], &zero),
            Err(AdventureError::Configuration(_))
        ));
    }
}
