//! Positional layout of the cluster hierarchy.
//!
//! Children are packed left to right in child order and centered as a group
//! under their parent. Manual drags are kept as a separate offset so a
//! rebalance never discards them.

use serde::Serialize;

/// Zoom change per step.
pub const ZOOM_STEP: f64 = 0.1;
/// Smallest allowed zoom factor.
pub const MIN_SCALE: f64 = 0.1;

/// Node box size and spacing, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutConfig {
    pub node_width: f64,
    pub node_height: f64,
    /// Vertical gap between a parent and its children.
    pub dist_top: f64,
    /// Horizontal gap between siblings.
    pub dist_neighbor: f64,
    pub canvas_width: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 240.0,
            node_height: 315.0,
            dist_top: 80.0,
            dist_neighbor: 40.0,
            canvas_width: 1600.0,
        }
    }
}

impl LayoutConfig {
    /// Root position: horizontally centered on the canvas.
    #[must_use]
    pub fn root_position(&self) -> Position {
        Position {
            left: self.canvas_width / 2.0 - self.node_width / 2.0,
            top: 0.0,
        }
    }

    /// Position of child `index` out of `siblings` under `parent`.
    #[must_use]
    pub fn child_position(
        &self,
        parent: Position,
        index: usize,
        siblings: usize,
        offset_top: f64,
        offset_left: f64,
    ) -> Position {
        let stride = self.node_width + self.dist_neighbor;
        let total_width = stride * siblings as f64 - self.dist_neighbor;
        let sibling_offset = stride * index as f64;
        Position {
            left: parent.left + self.node_width / 2.0 - total_width / 2.0
                + sibling_offset
                + offset_left,
            top: parent.top + self.node_height + offset_top,
        }
    }

    /// Line from the parent's bottom center to the child's top center.
    #[must_use]
    pub fn connection(
        &self,
        parent: Position,
        parent_drag: DragOffset,
        child: Position,
        child_drag: DragOffset,
    ) -> Connection {
        let half = self.node_width / 2.0;
        Connection {
            from: (
                parent.left + half + parent_drag.x,
                parent.top + self.node_height + parent_drag.y,
            ),
            to: (child.left + half + child_drag.x, child.top + child_drag.y),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub left: f64,
    pub top: f64,
}

/// Accumulated drag-and-drop translation of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragOffset {
    pub x: f64,
    pub y: f64,
}

impl DragOffset {
    #[must_use]
    pub fn shifted(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Connecting line between a node and its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connection {
    pub from: (f64, f64),
    pub to: (f64, f64),
}

impl Connection {
    /// Anchor of the restriction box drawn on the line.
    #[must_use]
    pub fn midpoint(&self) -> (f64, f64) {
        (
            (self.from.0 + self.to.0) / 2.0,
            (self.from.1 + self.to.1) / 2.0,
        )
    }
}

/// Next zoom factor, clamped at [`MIN_SCALE`].
#[must_use]
pub fn zoom(scale: f64, zoom_in: bool) -> f64 {
    let next = if zoom_in {
        scale + ZOOM_STEP
    } else {
        scale - ZOOM_STEP
    };
    // Keep one decimal so repeated steps do not drift.
    ((next * 10.0).round() / 10.0).max(MIN_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_child_sits_under_parent() {
        let config = LayoutConfig::default();
        let root = config.root_position();
        assert_eq!(root, Position { left: 680.0, top: 0.0 });
        let child = config.child_position(root, 0, 1, config.dist_top, 0.0);
        assert_eq!(child, Position { left: 680.0, top: 395.0 });
    }

    #[test]
    fn siblings_are_packed_and_centered() {
        let config = LayoutConfig::default();
        let parent = Position { left: 680.0, top: 0.0 };
        let lefts: Vec<f64> = (0..3)
            .map(|index| config.child_position(parent, index, 3, 0.0, 0.0).left)
            .collect();
        assert_eq!(lefts, vec![400.0, 680.0, 960.0]);
    }

    #[test]
    fn manual_left_offset_is_added() {
        let config = LayoutConfig::default();
        let parent = Position::default();
        let plain = config.child_position(parent, 0, 2, 0.0, 0.0);
        let moved = config.child_position(parent, 0, 2, 0.0, 25.0);
        assert_eq!(moved.left - plain.left, 25.0);
    }

    #[test]
    fn connection_runs_bottom_center_to_top_center() {
        let config = LayoutConfig::default();
        let line = config.connection(
            Position { left: 0.0, top: 0.0 },
            DragOffset::default(),
            Position { left: 100.0, top: 400.0 },
            DragOffset { x: 10.0, y: -5.0 },
        );
        assert_eq!(line.from, (120.0, 315.0));
        assert_eq!(line.to, (230.0, 395.0));
        assert_eq!(line.midpoint(), (175.0, 355.0));
    }

    #[test]
    fn zoom_is_clamped() {
        assert_eq!(zoom(1.0, true), 1.1);
        assert_eq!(zoom(0.2, false), 0.1);
        assert_eq!(zoom(0.1, false), 0.1);
    }
}
