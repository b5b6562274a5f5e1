use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};

use crate::config::PhysicsConfig;
use crate::map::types::{EdgeColor, NodeColor};
use crate::map::{DataSet, Edge, EngineOptions, FitOptions, Node};

pub const NODE_RADIUS: f64 = 10.0;
pub const HIT_RADIUS: f64 = 14.0;
/// Radius of the ring drawn for an edge from a node to itself.
pub const LOOP_RADIUS: f64 = 12.0;
/// Pointer travel, in pixels, below which a press and release is a click.
const CLICK_TOLERANCE: f64 = 4.0;
const ZOOM_STEP: f64 = 1.1;
const ZOOM_RANGE: (f64, f64) = (0.1, 10.0);
/// Screen pixels around an edge stroke that still count as a hit.
const EDGE_HIT_SLACK: f64 = 4.0;
/// Screen pixels kept free around the graph when fitting.
const FIT_PADDING: f64 = 40.0;

pub const DEFAULT_NODE_COLOR: NodeColor = NodeColor {
	background: "#97C2FC",
	border: "#2B7CE9",
};

#[derive(Clone, Debug)]
pub struct NodeInfo {
	pub id: String,
	pub label: String,
	pub color: NodeColor,
}

#[derive(Clone, Debug)]
pub struct EdgeInfo {
	pub id: String,
	pub source: DefaultNodeIdx,
	pub target: DefaultNodeIdx,
	pub label: String,
	pub width: f64,
	pub color: EdgeColor,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

/// What a held mouse button is doing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Gesture {
	#[default]
	Idle,
	/// Moving a node; `grab` is the pointer's offset from the node centre in
	/// graph units.
	Node {
		idx: DefaultNodeIdx,
		grab: (f64, f64),
	},
	Pan {
		origin: (f64, f64),
		from: ViewTransform,
	},
}

/// What a click landed on, as ids.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Picked {
	pub nodes: Vec<String>,
	pub edges: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<DefaultNodeIdx>,
	pub edge: Option<String>,
	pub neighbors: HashSet<DefaultNodeIdx>,
}

#[derive(Clone, Copy, Debug)]
struct FitAnimation {
	from: ViewTransform,
	to: ViewTransform,
	elapsed_ms: f64,
	duration_ms: f64,
}

/// Everything one slot's canvas needs to draw and hit-test its graph.
pub struct MapCanvasState {
	pub graph: ForceGraph<NodeInfo, ()>,
	pub edges: Vec<EdgeInfo>,
	index: HashMap<String, DefaultNodeIdx>,
	/// `(id, from, to)` of every edge the simulation was built from.
	edge_keys: Vec<(String, String, String)>,
	parameters: PhysicsConfig,
	pub transform: ViewTransform,
	pub gesture: Gesture,
	/// Where the button went down; a release close by is a click.
	press: Option<(f64, f64)>,
	pub hover: HoverState,
	pub selected_nodes: HashSet<DefaultNodeIdx>,
	pub selected_edges: HashSet<String>,
	pub width: f64,
	pub height: f64,
	pub physics: bool,
	pub smooth_edges: bool,
	pub destroyed: bool,
	fit_requested: Option<FitOptions>,
	fit: Option<FitAnimation>,
}

pub fn ease_in_out_quad(t: f64) -> f64 {
	if t < 0.5 {
		2.0 * t * t
	} else {
		1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
	}
}

/// Centre of the self-loop ring of a node at `(x, y)`; the ring sits on top
/// of the node.
pub fn loop_centre(x: f64, y: f64) -> (f64, f64) {
	(x, y - NODE_RADIUS - LOOP_RADIUS)
}

fn simulation(parameters: &PhysicsConfig) -> ForceGraph<NodeInfo, ()> {
	ForceGraph::new(SimulationParameters {
		force_charge: parameters.force_charge,
		force_spring: parameters.force_spring,
		force_max: parameters.force_max,
		node_speed: parameters.node_speed,
		damping_factor: parameters.damping_factor,
	})
}

impl MapCanvasState {
	pub fn new(
		nodes: &DataSet<Node>,
		edges: &DataSet<Edge>,
		parameters: PhysicsConfig,
		width: f64,
		height: f64,
	) -> Self {
		let mut state = Self {
			graph: simulation(&parameters),
			edges: Vec::new(),
			index: HashMap::new(),
			edge_keys: Vec::new(),
			parameters,
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			},
			gesture: Gesture::Idle,
			press: None,
			hover: HoverState::default(),
			selected_nodes: HashSet::new(),
			selected_edges: HashSet::new(),
			width,
			height,
			physics: true,
			smooth_edges: true,
			destroyed: false,
			fit_requested: None,
			fit: None,
		};
		state.rebuild(nodes, edges);
		state
	}

	/// Brings the drawing in line with the slot's datasets. The simulation is
	/// only rebuilt when the node set or the edge list changed, and nodes
	/// keep their positions across a rebuild.
	pub fn sync(&mut self, nodes: &DataSet<Node>, edges: &DataSet<Edge>) {
		let same_nodes =
			nodes.len() == self.index.len() && nodes.iter().all(|n| self.index.contains_key(&n.id));
		if !same_nodes || edge_keys(edges) != self.edge_keys {
			self.rebuild(nodes, edges);
			return;
		}

		self.graph.visit_nodes_mut(|node| {
			if let Some(fresh) = nodes.get(&node.data.user_data.id) {
				node.data.user_data.label = fresh.label.clone();
				node.data.user_data.color = fresh.color.unwrap_or(DEFAULT_NODE_COLOR);
			}
		});
		for info in self.edges.iter_mut() {
			let Some(edge) = edges.get(&info.id) else {
				continue;
			};
			info.label = edge.label.clone();
			info.width = edge.width;
			info.color = edge.color;
		}
		self.selected_edges.retain(|id| edges.contains(id));
	}

	fn rebuild(&mut self, nodes: &DataSet<Node>, edges: &DataSet<Edge>) {
		let mut previous = HashMap::new();
		self.graph.visit_nodes(|node| {
			previous.insert(
				node.data.user_data.id.clone(),
				(node.x(), node.y(), node.data.is_anchor),
			);
		});

		let mut graph = simulation(&self.parameters);
		let mut index = HashMap::new();
		let count = nodes.len().max(1) as f64;
		for (i, node) in nodes.iter().enumerate() {
			let angle = (i as f64) * 2.0 * PI / count;
			let (x, y, is_anchor) = previous.get(&node.id).copied().unwrap_or((
				(100.0 * angle.cos()) as f32,
				(100.0 * angle.sin()) as f32,
				false,
			));
			let idx = graph.add_node(NodeData {
				x,
				y,
				mass: 10.0,
				is_anchor,
				user_data: NodeInfo {
					id: node.id.clone(),
					label: node.label.clone(),
					color: node.color.unwrap_or(DEFAULT_NODE_COLOR),
				},
			});
			index.insert(node.id.clone(), idx);
		}

		let mut infos = Vec::with_capacity(edges.len());
		for edge in edges {
			let (Some(&source), Some(&target)) = (index.get(&edge.from), index.get(&edge.to)) else {
				continue;
			};
			if source != target {
				graph.add_edge(source, target, EdgeData::default());
			}
			infos.push(EdgeInfo {
				id: edge.id.clone(),
				source,
				target,
				label: edge.label.clone(),
				width: edge.width,
				color: edge.color,
			});
		}

		self.graph = graph;
		self.index = index;
		self.edges = infos;
		self.edge_keys = edge_keys(edges);
		self.hover = HoverState::default();
		self.gesture = Gesture::Idle;
		self.selected_nodes.clear();
		self.selected_edges.retain(|id| edges.contains(id));
	}

	pub fn positions(&self) -> HashMap<DefaultNodeIdx, (f64, f64)> {
		let mut positions = HashMap::new();
		self.graph.visit_nodes(|node| {
			positions.insert(node.index(), (node.x() as f64, node.y() as f64));
		});
		positions
	}

	pub fn node_id(&self, idx: DefaultNodeIdx) -> Option<String> {
		self.index
			.iter()
			.find(|(_, candidate)| **candidate == idx)
			.map(|(id, _)| id.clone())
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<DefaultNodeIdx> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let mut found = None;
		self.graph.visit_nodes(|node| {
			let (dx, dy) = (node.x() as f64 - gx, node.y() as f64 - gy);
			if (dx * dx + dy * dy).sqrt() < HIT_RADIUS {
				found = Some(node.index());
			}
		});
		found
	}

	/// Topmost edge whose stroke passes under the pointer.
	pub fn edge_at_position(&self, sx: f64, sy: f64) -> Option<String> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let positions = self.positions();
		self.edges
			.iter()
			.rev()
			.find(|edge| {
				let (Some(&(x1, y1)), Some(&(x2, y2))) =
					(positions.get(&edge.source), positions.get(&edge.target))
				else {
					return false;
				};
				let tolerance = edge.width / 2.0 + EDGE_HIT_SLACK / self.transform.k;
				if edge.source == edge.target {
					let (cx, cy) = loop_centre(x1, y1);
					return ((gx - cx).hypot(gy - cy) - LOOP_RADIUS).abs() <= tolerance;
				}
				distance_to_segment((gx, gy), (x1, y1), (x2, y2)) <= tolerance
			})
			.map(|edge| edge.id.clone())
	}

	pub fn connected_edges(&self, idx: DefaultNodeIdx) -> Vec<String> {
		self.edges
			.iter()
			.filter(|e| e.source == idx || e.target == idx)
			.map(|e| e.id.clone())
			.collect()
	}

	pub fn set_hover(&mut self, node: Option<DefaultNodeIdx>, edge: Option<String>) {
		if self.hover.node == node && self.hover.edge == edge {
			return;
		}
		self.hover.node = node;
		self.hover.edge = edge;
		self.hover.neighbors.clear();
		if let Some(idx) = node {
			for e in &self.edges {
				if e.source == idx {
					self.hover.neighbors.insert(e.target);
				} else if e.target == idx {
					self.hover.neighbors.insert(e.source);
				}
			}
		}
	}

	/// Marks what the last click picked so it draws in the highlight colours.
	pub fn select(&mut self, node: Option<DefaultNodeIdx>, edges: &[String]) {
		self.selected_nodes = node.into_iter().collect();
		self.selected_edges = edges.iter().cloned().collect();
	}

	/// Button down at screen `(x, y)`: grab the node under it, or the canvas.
	pub fn press(&mut self, x: f64, y: f64) {
		self.press = Some((x, y));
		let (gx, gy) = self.screen_to_graph(x, y);
		self.gesture = match self.node_at_position(x, y) {
			Some(idx) => {
				let (nx, ny) = self.positions().get(&idx).copied().unwrap_or((gx, gy));
				Gesture::Node {
					idx,
					grab: (gx - nx, gy - ny),
				}
			}
			None => Gesture::Pan {
				origin: (x, y),
				from: self.transform,
			},
		};
	}

	/// Pointer moved: continue the current gesture, or update hover.
	pub fn pointer_moved(&mut self, x: f64, y: f64) {
		match self.gesture {
			Gesture::Node { idx, grab } => {
				let (gx, gy) = self.screen_to_graph(x, y);
				let (nx, ny) = ((gx - grab.0) as f32, (gy - grab.1) as f32);
				self.graph.visit_nodes_mut(|node| {
					if node.index() == idx {
						node.data.x = nx;
						node.data.y = ny;
						node.data.is_anchor = true;
					}
				});
			}
			Gesture::Pan { origin, from } => {
				self.transform.x = from.x + (x - origin.0);
				self.transform.y = from.y + (y - origin.1);
				self.hover_at(x, y);
			}
			Gesture::Idle => self.hover_at(x, y),
		}
	}

	fn hover_at(&mut self, x: f64, y: f64) {
		let node = self.node_at_position(x, y);
		let edge = if node.is_none() { self.edge_at_position(x, y) } else { None };
		self.set_hover(node, edge);
	}

	/// Button up. Returns what was clicked when the pointer barely moved
	/// since the press, and selects it.
	pub fn release(&mut self, x: f64, y: f64) -> Option<Picked> {
		self.gesture = Gesture::Idle;
		let (px, py) = self.press.take()?;
		if (x - px).hypot(y - py) >= CLICK_TOLERANCE {
			return None;
		}
		let node = self.node_at_position(x, y);
		let picked = match node {
			Some(idx) => Picked {
				nodes: self.node_id(idx).into_iter().collect(),
				edges: self.connected_edges(idx),
			},
			None => Picked {
				nodes: Vec::new(),
				edges: self.edge_at_position(x, y).into_iter().collect(),
			},
		};
		self.select(node, &picked.edges);
		Some(picked)
	}

	/// Pointer left the canvas mid-gesture.
	pub fn cancel(&mut self) {
		self.gesture = Gesture::Idle;
		self.press = None;
		self.set_hover(None, None);
	}

	/// Zooms one step keeping the graph point under `(x, y)` fixed.
	pub fn zoom_at(&mut self, x: f64, y: f64, zoom_in: bool) {
		let factor = if zoom_in { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
		let k = (self.transform.k * factor).clamp(ZOOM_RANGE.0, ZOOM_RANGE.1);
		let ratio = k / self.transform.k;
		self.transform = ViewTransform {
			x: x - (x - self.transform.x) * ratio,
			y: y - (y - self.transform.y) * ratio,
			k,
		};
		self.fit = None;
	}

	pub fn apply_options(&mut self, options: EngineOptions) {
		if let Some(physics) = options.physics {
			self.physics = physics;
		}
		if let Some(smooth) = options.smooth_edges {
			self.smooth_edges = smooth;
		}
	}

	pub fn request_fit(&mut self, options: FitOptions) {
		self.fit_requested = Some(options);
	}

	/// Transform that shows every node with some padding.
	pub fn fit_transform(&self) -> ViewTransform {
		let positions = self.positions();
		if positions.is_empty() {
			return ViewTransform {
				x: self.width / 2.0,
				y: self.height / 2.0,
				k: 1.0,
			};
		}
		let (mut min_x, mut min_y, mut max_x, mut max_y) =
			(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
		for &(x, y) in positions.values() {
			min_x = min_x.min(x - NODE_RADIUS);
			min_y = min_y.min(y - NODE_RADIUS);
			max_x = max_x.max(x + NODE_RADIUS);
			max_y = max_y.max(y + NODE_RADIUS);
		}
		let usable_w = (self.width - 2.0 * FIT_PADDING).max(1.0);
		let usable_h = (self.height - 2.0 * FIT_PADDING).max(1.0);
		let k = (usable_w / (max_x - min_x))
			.min(usable_h / (max_y - min_y))
			.clamp(0.1, 2.0);
		let (cx, cy) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
		ViewTransform {
			x: self.width / 2.0 - cx * k,
			y: self.height / 2.0 - cy * k,
			k,
		}
	}

	pub fn tick(&mut self, dt: f32) {
		if self.physics {
			self.graph.update(dt);
		}

		if let Some(options) = self.fit_requested.take() {
			let to = self.fit_transform();
			match options.animation_ms {
				Some(ms) if ms > 0 => {
					self.fit = Some(FitAnimation {
						from: self.transform,
						to,
						elapsed_ms: 0.0,
						duration_ms: ms as f64,
					});
				}
				_ => {
					self.fit = None;
					self.transform = to;
				}
			}
		}

		if let Some(anim) = self.fit.as_mut() {
			anim.elapsed_ms += dt as f64 * 1000.0;
			let t = ease_in_out_quad((anim.elapsed_ms / anim.duration_ms).min(1.0));
			self.transform = ViewTransform {
				x: anim.from.x + (anim.to.x - anim.from.x) * t,
				y: anim.from.y + (anim.to.y - anim.from.y) * t,
				k: anim.from.k + (anim.to.k - anim.from.k) * t,
			};
			if anim.elapsed_ms >= anim.duration_ms {
				self.fit = None;
			}
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

fn edge_keys(edges: &DataSet<Edge>) -> Vec<(String, String, String)> {
	edges
		.iter()
		.map(|e| (e.id.clone(), e.from.clone(), e.to.clone()))
		.collect()
}

fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
	let (dx, dy) = (b.0 - a.0, b.1 - a.1);
	let len2 = dx * dx + dy * dy;
	let t = if len2 < f64::EPSILON {
		0.0
	} else {
		(((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
	};
	let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
	((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}
