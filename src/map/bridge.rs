//! Seam between the graph store and whatever draws it.
//!
//! Engines never call back into edit logic directly. Clicks are reported as
//! [`ClickEvent`] values carrying the slot index, and one handler in the
//! session decides what they mean for that slot's merge state.

use super::dataset::DataSet;
use super::types::{Edge, Node};

/// A click on one slot's canvas.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClickEvent {
	/// Slot whose engine raised the click.
	pub slot: usize,
	/// Node ids under the cursor.
	pub nodes: Vec<String>,
	/// Edge ids under the cursor.
	pub edges: Vec<String>,
}

impl ClickEvent {
	/// Click on `slot` over the given nodes and edges.
	pub fn new(slot: usize, nodes: Vec<String>, edges: Vec<String>) -> Self {
		Self { slot, nodes, edges }
	}

	/// A click on empty canvas, with nothing under the cursor.
	pub fn is_background(&self) -> bool {
		self.nodes.is_empty() && self.edges.is_empty()
	}
}

/// How an engine should bring the whole graph into view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FitOptions {
	/// Ease towards the fitted view over this many milliseconds.
	pub animation_ms: Option<u32>,
}

/// Partial engine options; `None` leaves the current setting alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineOptions {
	/// Run the force simulation.
	pub physics: Option<bool>,
	/// Draw edges as curves.
	pub smooth_edges: Option<bool>,
}

impl EngineOptions {
	/// Layout frozen in place with straight edges.
	pub const FIXED: Self = Self {
		physics: Some(false),
		smooth_edges: Some(false),
	};

	/// Live force simulation.
	pub const PHYSICS: Self = Self {
		physics: Some(true),
		smooth_edges: Some(true),
	};
}

/// One rendering engine instance, bound to a single slot.
pub trait RenderEngine {
	/// Re-read both collections and draw them.
	fn redraw(&mut self, nodes: &DataSet<Node>, edges: &DataSet<Edge>);

	/// Bring every node into view.
	fn fit(&mut self, options: FitOptions);

	/// Apply whichever options are set.
	fn set_options(&mut self, options: EngineOptions);

	/// Release the engine. It must not draw again afterwards.
	fn destroy(&mut self);
}

/// Builds the engine for a freshly created slot.
pub trait EngineFactory {
	/// Engine for slot `slot`, seeded with its graph.
	fn create(
		&self,
		slot: usize,
		nodes: &DataSet<Node>,
		edges: &DataSet<Edge>,
	) -> Box<dyn RenderEngine>;
}
