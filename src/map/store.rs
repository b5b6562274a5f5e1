use log::debug;

use super::bridge::{FitOptions, RenderEngine};
use super::dataset::DataSet;
use super::error::StoreError;
use super::merge::MergeState;
use super::types::{Edge, EdgePatch, EvaluationMetric, Node, UnconnectedForm};

/// One semantic map: its graph, its scores, its merge state and its engine.
pub struct Slot {
	/// Position in the batch.
	pub index: usize,
	/// Title shown in the map tabs.
	pub map_name: String,
	/// Nodes of the map.
	pub nodes: DataSet<Node>,
	/// Edges of the map.
	pub edges: DataSet<Edge>,
	/// Latest scores; `None` until the service sends some.
	pub metric: Option<EvaluationMetric>,
	/// Rows shown in the unconnected-forms panel.
	pub unconnected: Vec<UnconnectedForm>,
	/// Merge state.
	pub merge: MergeState,
	engine: Box<dyn RenderEngine>,
}

impl Slot {
	/// Slot with no merge applied. Unconnected forms are read off `metric`.
	pub fn new(
		index: usize,
		map_name: impl Into<String>,
		nodes: DataSet<Node>,
		edges: DataSet<Edge>,
		metric: Option<EvaluationMetric>,
		engine: Box<dyn RenderEngine>,
	) -> Self {
		let unconnected = metric
			.as_ref()
			.and_then(|m| m.unconnected_forms.clone())
			.unwrap_or_default();
		Self {
			index,
			map_name: map_name.into(),
			nodes,
			edges,
			metric,
			unconnected,
			merge: MergeState::Unmerged,
			engine,
		}
	}

	/// Asks the engine to draw the current graph.
	pub fn redraw(&mut self) {
		self.engine.redraw(&self.nodes, &self.edges);
	}

	/// Engine drawing this slot.
	pub fn engine_mut(&mut self) -> &mut dyn RenderEngine {
		self.engine.as_mut()
	}

	/// Asks the engine to fit the graph into view.
	pub fn fit(&mut self, options: FitOptions) {
		self.engine.fit(options);
	}
}

impl std::fmt::Debug for Slot {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Slot")
			.field("index", &self.index)
			.field("map_name", &self.map_name)
			.field("nodes", &self.nodes.len())
			.field("edges", &self.edges.len())
			.field("merge", &self.merge)
			.finish()
	}
}

/// Every slot of the current batch. Operations only ever touch the slot
/// they are given.
#[derive(Debug, Default)]
pub struct GraphStore {
	slots: Vec<Slot>,
	generation: u64,
}

impl GraphStore {
	/// Store with no batch.
	pub fn new() -> Self {
		Self::default()
	}

	/// Destroys every slot and its engine, then installs the batch `build`
	/// returns. Tickets issued against the previous batch go stale.
	pub fn replace_batch(&mut self, build: impl FnOnce() -> Vec<Slot>) {
		for mut slot in self.slots.drain(..) {
			slot.engine.destroy();
		}
		self.slots = build();
		self.generation += 1;
		debug!(
			"installed batch {} with {} slots",
			self.generation,
			self.slots.len()
		);
	}

	/// Bumped on every batch replacement.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Number of slots.
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	/// True before any batch is loaded.
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Slots in batch order.
	pub fn slots(&self) -> &[Slot] {
		&self.slots
	}

	/// Slots in batch order, mutably.
	pub fn slots_mut(&mut self) -> &mut [Slot] {
		&mut self.slots
	}

	/// Slot `slot`, if it exists.
	pub fn slot(&self, slot: usize) -> Result<&Slot, StoreError> {
		self.slots.get(slot).ok_or(StoreError::NoSuchSlot(slot))
	}

	/// Mutable access to slot `slot`.
	pub fn slot_mut(&mut self, slot: usize) -> Result<&mut Slot, StoreError> {
		self.slots.get_mut(slot).ok_or(StoreError::NoSuchSlot(slot))
	}

	/// Nodes and edges of `slot`.
	pub fn get_all(&self, slot: usize) -> Result<(&DataSet<Node>, &DataSet<Edge>), StoreError> {
		let slot = self.slot(slot)?;
		Ok((&slot.nodes, &slot.edges))
	}

	/// Adds edges to `slot`, all or nothing.
	pub fn add(&mut self, slot: usize, edges: impl IntoIterator<Item = Edge>) -> Result<(), StoreError> {
		self.slot_mut(slot)?.edges.add(edges)
	}

	/// Applies `patches` to `slot`. Every id must exist.
	pub fn update(
		&mut self,
		slot: usize,
		patches: impl IntoIterator<Item = EdgePatch>,
	) -> Result<(), StoreError> {
		self.slot_mut(slot)?.edges.update(
			patches.into_iter().map(|p| (p.id.clone(), p)),
			|edge, patch| patch.apply(edge),
		)
	}

	/// Removes the listed edges from `slot`, skipping unknown ids.
	pub fn remove<S: AsRef<str>>(&mut self, slot: usize, ids: &[S]) -> Result<Vec<Edge>, StoreError> {
		Ok(self.slot_mut(slot)?.edges.remove(ids))
	}

	/// Edge `id` of `slot`.
	pub fn get(&self, slot: usize, id: &str) -> Result<Option<&Edge>, StoreError> {
		Ok(self.slot(slot)?.edges.get(id))
	}
}
