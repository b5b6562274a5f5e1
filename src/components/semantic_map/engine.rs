use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use super::state::MapCanvasState;
use crate::config::PhysicsConfig;
use crate::map::{DataSet, Edge, EngineFactory, EngineOptions, FitOptions, Node, RenderEngine};

/// Size used until the canvas reports its own.
const INITIAL_SIZE: (f64, f64) = (800.0, 600.0);

pub type SharedView = Rc<RefCell<MapCanvasState>>;

/// Live canvas states by slot index, read by the canvas components.
pub type ViewRegistry = Rc<RefCell<HashMap<usize, SharedView>>>;

/// [`RenderEngine`] backed by a canvas state that a mounted
/// [`SemanticMapCanvas`](super::SemanticMapCanvas) animates.
pub struct CanvasEngine {
	slot: usize,
	view: SharedView,
	views: ViewRegistry,
}

impl RenderEngine for CanvasEngine {
	fn redraw(&mut self, nodes: &DataSet<Node>, edges: &DataSet<Edge>) {
		self.view.borrow_mut().sync(nodes, edges);
	}

	fn fit(&mut self, options: FitOptions) {
		self.view.borrow_mut().request_fit(options);
	}

	fn set_options(&mut self, options: EngineOptions) {
		self.view.borrow_mut().apply_options(options);
	}

	fn destroy(&mut self) {
		self.view.borrow_mut().destroyed = true;
		let mut views = self.views.borrow_mut();
		if views.get(&self.slot).is_some_and(|v| Rc::ptr_eq(v, &self.view)) {
			views.remove(&self.slot);
		}
		debug!("slot {}: canvas engine destroyed", self.slot);
	}
}

pub struct CanvasEngineFactory {
	physics: PhysicsConfig,
	views: ViewRegistry,
}

impl CanvasEngineFactory {
	pub fn new(physics: PhysicsConfig) -> Self {
		Self {
			physics,
			views: Rc::default(),
		}
	}

	pub fn views(&self) -> ViewRegistry {
		self.views.clone()
	}
}

impl EngineFactory for CanvasEngineFactory {
	fn create(&self, slot: usize, nodes: &DataSet<Node>, edges: &DataSet<Edge>) -> Box<dyn RenderEngine> {
		let (width, height) = INITIAL_SIZE;
		let view = Rc::new(RefCell::new(MapCanvasState::new(
			nodes,
			edges,
			self.physics,
			width,
			height,
		)));
		self.views.borrow_mut().insert(slot, view.clone());
		debug!("slot {slot}: canvas engine created");
		Box::new(CanvasEngine {
			slot,
			view,
			views: self.views.clone(),
		})
	}
}
