//! Display list the game draws from and the hit testing the core relies on.
//!
//! Entities own their `RenderNode` and push a copy to the surface whenever
//! it changes. The surface keeps the copies in paint order, bottom first.
//!
//! ┌──────────── Stage (paint order) ────────────┐
//! │ 0  background        Bitmap                 │
//! │ 1  floor             Shape (polygon)        │
//! │ 2  items / NPCs      Bitmap / Sprite        │
//! │ 3  player            Sprite                 │
//! │ 4  walk marker       Bitmap                 │ ◄── objects_at_point walks
//! └─────────────────────────────────────────────┘     top to bottom
use crate::engine::{Point, Rect, Renderer, Size};
use std::collections::HashMap;
use web_sys::HtmlImageElement;

/// Loaded images by source path
pub type ImageStore = HashMap<String, HtmlImageElement>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(raw: u32) -> Self {
        NodeId(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Bitmap { image: String },
    Sprite { image: String, frame: Rect },
    Shape { points: Vec<Point>, fill: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Transform origin. With a negative `scale_x` the node extends to the
    /// left of it.
    pub position: Point,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Intrinsic size before scaling. Shapes take theirs from their points.
    pub size: Size,
    pub visible: bool,
}

impl RenderNode {
    pub fn bitmap(id: NodeId, image: impl Into<String>, size: Size) -> Self {
        RenderNode {
            id,
            kind: NodeKind::Bitmap {
                image: image.into(),
            },
            position: Point::default(),
            scale_x: 1.0,
            scale_y: 1.0,
            size,
            visible: true,
        }
    }

    pub fn sprite(id: NodeId, image: impl Into<String>, frame: Rect) -> Self {
        RenderNode {
            id,
            kind: NodeKind::Sprite {
                image: image.into(),
                frame,
            },
            position: Point::default(),
            scale_x: 1.0,
            scale_y: 1.0,
            size: frame.size,
            visible: true,
        }
    }

    pub fn shape(id: NodeId, points: Vec<Point>, fill: impl Into<String>) -> Self {
        let width = points.iter().map(|p| p.x).fold(0.0, f64::max);
        let height = points.iter().map(|p| p.y).fold(0.0, f64::max);
        RenderNode {
            id,
            kind: NodeKind::Shape {
                points,
                fill: fill.into(),
            },
            position: Point::default(),
            scale_x: 1.0,
            scale_y: 1.0,
            size: Size::new(width, height),
            visible: true,
        }
    }

    /// Screen space bounding box
    pub fn bounds(&self) -> Rect {
        let width = self.size.width * self.scale_x;
        let height = self.size.height * self.scale_y;
        Rect::new(
            Point::new(
                self.position.x.min(self.position.x + width),
                self.position.y.min(self.position.y + height),
            ),
            Size::new(width.abs(), height.abs()),
        )
    }

    /// Point of the polygon in screen space
    pub fn transformed_points(&self) -> Vec<Point> {
        match &self.kind {
            NodeKind::Shape { points, .. } => points
                .iter()
                .map(|p| {
                    Point::new(
                        self.position.x + p.x * self.scale_x,
                        self.position.y + p.y * self.scale_y,
                    )
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn hit_test(&self, point: Point) -> bool {
        if !self.visible {
            return false;
        }
        match &self.kind {
            NodeKind::Shape { .. } => polygon_contains(&self.transformed_points(), point),
            NodeKind::Bitmap { .. } | NodeKind::Sprite { .. } => self.bounds().contains(point),
        }
    }
}

/// Even-odd ray cast, the same fill rule the canvas uses for the floor
pub fn polygon_contains(polygon: &[Point], point: Point) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > point.y) != (b.y > point.y)
            && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// What the core needs from the display list
pub trait RenderSurface {
    /// Visible nodes under `point`, topmost first
    fn objects_at_point(&self, point: Point) -> Vec<NodeId>;
    /// Attach on top of everything, or move an attached node to the top
    fn add_node(&mut self, node: &RenderNode);
    /// Refresh an attached node in place; ignored when not attached
    fn update_node(&mut self, node: &RenderNode);
    fn remove_node(&mut self, id: NodeId);
    fn has_node(&self, id: NodeId) -> bool;
}

#[derive(Debug, Default)]
pub struct Stage {
    children: Vec<RenderNode>,
}

impl Stage {
    pub fn new() -> Self {
        Stage {
            children: Vec::new(),
        }
    }

    pub fn nodes(&self) -> &[RenderNode] {
        &self.children
    }

    pub fn node(&self, id: NodeId) -> Option<&RenderNode> {
        self.children.iter().find(|node| node.id == id)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn clear(&mut self) {
        self.children.clear();
    }

    pub fn draw(&self, renderer: &Renderer, images: &ImageStore) {
        for node in self.children.iter().filter(|node| node.visible) {
            match &node.kind {
                NodeKind::Shape { fill, .. } => {
                    renderer.fill_polygon(&node.transformed_points(), fill);
                }
                NodeKind::Bitmap { image } => {
                    let frame = Rect::new(Point::default(), node.size);
                    draw_node_image(renderer, images, image, &frame, node);
                }
                NodeKind::Sprite { image, frame } => {
                    draw_node_image(renderer, images, image, frame, node);
                }
            }
        }
    }
}

fn draw_node_image(
    renderer: &Renderer,
    images: &ImageStore,
    source: &str,
    frame: &Rect,
    node: &RenderNode,
) {
    let Some(image) = images.get(source) else {
        log::warn!("Image {} is not loaded, skipping node {:?}", source, node.id);
        return;
    };
    let destination = node.bounds();
    if node.scale_x < 0.0 {
        renderer.draw_image_flipped(image, frame, &destination);
    } else {
        renderer.draw_image(image, frame, &destination);
    }
}

impl RenderSurface for Stage {
    fn objects_at_point(&self, point: Point) -> Vec<NodeId> {
        self.children
            .iter()
            .rev()
            .filter(|node| node.hit_test(point))
            .map(|node| node.id)
            .collect()
    }

    fn add_node(&mut self, node: &RenderNode) {
        self.children.retain(|child| child.id != node.id);
        self.children.push(node.clone());
    }

    fn update_node(&mut self, node: &RenderNode) {
        if let Some(child) = self.children.iter_mut().find(|child| child.id == node.id) {
            *child = node.clone();
        }
    }

    fn remove_node(&mut self, id: NodeId) {
        self.children.retain(|child| child.id != id);
    }

    fn has_node(&self, id: NodeId) -> bool {
        self.children.iter().any(|child| child.id == id)
    }
}
