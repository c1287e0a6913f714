//! Graph Rendering
//!
//! Two visual outputs for a normalized graph:
//!
//! - [`to_dot`]: Graphviz DOT using the force-directed `neato` engine on a
//!   fixed 50x50 inch canvas
//! - [`ForceLayout`] + [`to_svg`]: a self-contained SVG laid out with a
//!   deterministic Fruchterman-Reingold simulation
//!
//! Both draw every vertex, implicit edge endpoints included, with filled
//! light-blue nodes and bold 10pt labels.

use std::collections::HashMap;
use std::fmt::Write as _;

use petgraph::stable_graph::NodeIndex;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use crate::dag::DagGraph;

const NODE_COLOR: &str = "lightblue";
const EDGE_COLOR: &str = "#555555";
const FONT_SIZE: u32 = 10;

// ============================================================================
// DOT
// ============================================================================

/// Convert a graph to a Graphviz DOT string.
pub fn to_dot(dag: &DagGraph) -> String {
    let graph = dag.inner();
    let mut lines = Vec::new();

    lines.push("digraph pydag {".to_string());
    lines.push("    layout=neato;".to_string());
    lines.push("    overlap=false;".to_string());
    lines.push("    size=\"50,50!\";".to_string());
    lines.push(format!(
        "    node [shape=ellipse, style=filled, fillcolor={}, fontsize={}, fontname=\"Helvetica-Bold\"];",
        NODE_COLOR, FONT_SIZE
    ));
    lines.push("    edge [arrowsize=0.7];".to_string());
    lines.push(String::new());

    for idx in graph.node_indices() {
        lines.push(format!(
            "    n{} [label=\"{}\"];",
            idx.index(),
            escape_dot(&graph[idx].label)
        ));
    }

    lines.push(String::new());

    for edge in graph.edge_references() {
        lines.push(format!(
            "    n{} -> n{};",
            edge.source().index(),
            edge.target().index()
        ));
    }

    lines.push("}".to_string());
    lines.join("\n")
}

fn escape_dot(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

// ============================================================================
// Force-Directed Layout
// ============================================================================

/// A point on the canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Layout parameters.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Canvas width in pixels
    pub width: f64,
    /// Canvas height in pixels
    pub height: f64,
    /// Simulation steps
    pub iterations: usize,
    /// Node circle radius
    pub node_radius: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 5000.0,
            height: 5000.0,
            iterations: 50,
            node_radius: 22.0,
        }
    }
}

/// Computed node positions.
#[derive(Debug, Clone)]
pub struct Layout {
    pub width: f64,
    pub height: f64,
    pub node_radius: f64,
    positions: HashMap<NodeIndex, Point>,
}

impl Layout {
    /// Position of a vertex
    pub fn position(&self, idx: NodeIndex) -> Option<Point> {
        self.positions.get(&idx).copied()
    }

    /// Number of positioned vertices
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether nothing was positioned
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Fruchterman-Reingold spring layout.
///
/// Vertices start on a circle in insertion order and the temperature cools
/// linearly, so the same graph always yields the same picture. Arcs attract
/// regardless of direction.
pub struct ForceLayout {
    config: LayoutConfig,
}

impl ForceLayout {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn compute(&self, dag: &DagGraph) -> Layout {
        let graph = dag.inner();
        let nodes: Vec<NodeIndex> = graph.node_indices().collect();
        let n = nodes.len();
        let (width, height) = (self.config.width, self.config.height);
        let margin = self.config.node_radius * 2.0;

        let slot: HashMap<NodeIndex, usize> =
            nodes.iter().enumerate().map(|(i, &idx)| (idx, i)).collect();
        let arcs: Vec<(usize, usize)> = graph
            .edge_references()
            .filter_map(|e| Some((*slot.get(&e.source())?, *slot.get(&e.target())?)))
            .filter(|(a, b)| a != b)
            .collect();

        // Seed on a circle
        let (cx, cy) = (width / 2.0, height / 2.0);
        let radius = (width.min(height) / 2.0 - margin).max(1.0);
        let mut pos: Vec<Point> = (0..n)
            .map(|i| {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / n.max(1) as f64;
                Point {
                    x: cx + radius * angle.cos(),
                    y: cy + radius * angle.sin(),
                }
            })
            .collect();

        if n > 1 {
            let k = (width * height / n as f64).sqrt();
            let start_temp = width / 10.0;
            let iterations = self.config.iterations.max(1);

            for step in 0..iterations {
                let mut disp = vec![Point { x: 0.0, y: 0.0 }; n];

                for i in 0..n {
                    for j in (i + 1)..n {
                        let (dx, dy, dist) = delta(pos[i], pos[j]);
                        let force = k * k / dist;
                        disp[i].x += dx / dist * force;
                        disp[i].y += dy / dist * force;
                        disp[j].x -= dx / dist * force;
                        disp[j].y -= dy / dist * force;
                    }
                }

                for &(a, b) in &arcs {
                    let (dx, dy, dist) = delta(pos[a], pos[b]);
                    let force = dist * dist / k;
                    disp[a].x -= dx / dist * force;
                    disp[a].y -= dy / dist * force;
                    disp[b].x += dx / dist * force;
                    disp[b].y += dy / dist * force;
                }

                let temp = start_temp * (1.0 - step as f64 / iterations as f64);
                for (p, d) in pos.iter_mut().zip(&disp) {
                    let len = (d.x * d.x + d.y * d.y).sqrt();
                    if len > 0.0 {
                        let step_len = len.min(temp);
                        p.x += d.x / len * step_len;
                        p.y += d.y / len * step_len;
                    }
                    p.x = p.x.clamp(margin, width - margin);
                    p.y = p.y.clamp(margin, height - margin);
                }
            }
        }

        Layout {
            width,
            height,
            node_radius: self.config.node_radius,
            positions: nodes.into_iter().zip(pos).collect(),
        }
    }
}

fn delta(a: Point, b: Point) -> (f64, f64, f64) {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dist = (dx * dx + dy * dy).sqrt().max(0.01);
    (dx, dy, dist)
}

// ============================================================================
// SVG
// ============================================================================

/// Draw a laid-out graph as SVG.
pub fn to_svg(dag: &DagGraph, layout: &Layout) -> String {
    let graph = dag.inner();
    let r = layout.node_radius;
    let mut svg = String::new();

    let _ = writeln!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
        w = layout.width,
        h = layout.height
    );
    let _ = writeln!(
        svg,
        "  <defs><marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker></defs>",
        EDGE_COLOR
    );
    let _ = writeln!(svg, "  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>");

    let _ = writeln!(svg, "  <g stroke=\"{}\" stroke-width=\"1\">", EDGE_COLOR);
    for edge in graph.edge_references() {
        let (Some(from), Some(to)) = (
            layout.position(edge.source()),
            layout.position(edge.target()),
        ) else {
            continue;
        };
        let (dx, dy, dist) = delta(to, from);
        if edge.source() == edge.target() || dist <= 2.0 * r {
            continue;
        }
        // Stop at the rims so the arrowhead stays visible
        let (ux, uy) = (dx / dist, dy / dist);
        let _ = writeln!(
            svg,
            "    <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" marker-end=\"url(#arrow)\"/>",
            from.x + ux * r,
            from.y + uy * r,
            to.x - ux * r,
            to.y - uy * r
        );
    }
    let _ = writeln!(svg, "  </g>");

    let _ = writeln!(
        svg,
        "  <g font-family=\"Helvetica, Arial, sans-serif\" font-size=\"{}\" font-weight=\"bold\" text-anchor=\"middle\">",
        FONT_SIZE
    );
    for idx in graph.node_indices() {
        let Some(p) = layout.position(idx) else {
            continue;
        };
        let _ = writeln!(
            svg,
            "    <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{}\" fill=\"{}\"/>",
            p.x, p.y, r, NODE_COLOR
        );
        let _ = writeln!(
            svg,
            "    <text x=\"{:.1}\" y=\"{:.1}\">{}</text>",
            p.x,
            p.y + f64::from(FONT_SIZE) / 3.0,
            escape_xml(&graph[idx].label)
        );
    }
    let _ = writeln!(svg, "  </g>");
    svg.push_str("</svg>\n");
    svg
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
