//! Ties the store, the editors and the graph service together.
//!
//! [`Session`] is the synchronous state owned by the page. [`Controller`]
//! wraps it for use from event handlers: it runs backend calls without
//! holding a borrow across an await, and spawns revalidations as
//! fire-and-forget tasks.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use log::{debug, info, warn};

use super::bridge::{ClickEvent, EngineFactory, EngineOptions, FitOptions};
use super::coordinator::SlotCoordinator;
use super::dataset::DataSet;
use super::editor::{EdgeEditor, WidthScale, parse_weight};
use super::error::{EditError, MergeError, ServiceError, StoreError};
use super::forms::FormFilter;
use super::merge::{MergeController, MergeOutcome, MergeTicket};
use super::service::GraphService;
use super::store::{GraphStore, Slot};
use super::types::{
	EDGE_COLOR, Edge, EvaluationMetric, GraphData, MergeResponse, Node, ProcessResponse, SourceData,
};
use super::validation::{self, ValidationTicket};

/// Animation used by the "center" button.
const CENTER_ANIMATION_MS: u32 = 1000;

/// Everything the editor knows: the slots, the active one, the selection,
/// the uploaded workbook and the form filter.
pub struct Session {
	store: GraphStore,
	coordinator: SlotCoordinator,
	source: Option<SourceData>,
	forms: FormFilter,
	editor: EdgeEditor,
	merger: MergeController,
	factory: Box<dyn EngineFactory>,
	beautified: bool,
}

impl Session {
	/// Empty session using `factory` for every new slot.
	pub fn new(scale: WidthScale, factory: Box<dyn EngineFactory>) -> Self {
		Self::with_editor(EdgeEditor::new(scale), factory)
	}

	/// Session driven by a preconfigured editor.
	pub fn with_editor(editor: EdgeEditor, factory: Box<dyn EngineFactory>) -> Self {
		Self {
			store: GraphStore::new(),
			coordinator: SlotCoordinator::new(),
			source: None,
			forms: FormFilter::new(),
			merger: MergeController::new(*editor.scale()),
			editor,
			factory,
			beautified: false,
		}
	}

	/// Every slot of the current batch.
	pub fn store(&self) -> &GraphStore {
		&self.store
	}

	/// Active slot and click selection.
	pub fn coordinator(&self) -> &SlotCoordinator {
		&self.coordinator
	}

	/// Workbook of the current batch.
	pub fn source(&self) -> Option<&SourceData> {
		self.source.as_ref()
	}

	/// Form highlight state.
	pub fn forms(&self) -> &FormFilter {
		&self.forms
	}

	/// Whether the frozen layout is on.
	pub fn is_beautified(&self) -> bool {
		self.beautified
	}

	/// The active slot, if any.
	pub fn active_slot(&self) -> Option<&Slot> {
		let index = self.coordinator.active().ok()?;
		self.store.slot(index).ok()
	}

	/// Label for the merge button of the active slot.
	pub fn merge_label(&self) -> &'static str {
		self.active_slot()
			.map(|slot| slot.merge.button_label())
			.unwrap_or("Merge Edge")
	}

	/// Replaces every slot with the maps in `response`. Returns the number of
	/// slots created.
	pub fn load_batch(&mut self, source: SourceData, response: ProcessResponse) -> Result<usize, ServiceError> {
		let scale = *self.editor.scale();
		let graphs = response
			.graph_data
			.into_iter()
			.enumerate()
			.map(|(index, graph)| build_graph(index, graph, &scale))
			.collect::<Result<Vec<_>, _>>()?;

		let factory = &self.factory;
		self.store.replace_batch(|| {
			graphs
				.into_iter()
				.enumerate()
				.map(|(index, (name, nodes, edges, metric))| {
					let engine = factory.create(index, &nodes, &edges);
					Slot::new(index, name, nodes, edges, metric, engine)
				})
				.collect()
		});
		for slot in self.store.slots_mut() {
			slot.fit(FitOptions::default());
		}

		self.source = Some(source);
		self.coordinator.reset(self.store.len());
		self.forms.reset(response.forms_with_nodes);
		self.beautified = false;
		info!("loaded {} semantic maps", self.store.len());
		Ok(self.store.len())
	}

	/// Activates `slot`. Returns `false` if it was already active.
	pub fn select(&mut self, slot: usize) -> Result<bool, EditError> {
		self.coordinator.select(slot)
	}

	/// Activates the next slot, wrapping around.
	pub fn next(&mut self) -> Result<usize, EditError> {
		self.coordinator.next()
	}

	/// Activates the previous slot, wrapping around.
	pub fn previous(&mut self) -> Result<usize, EditError> {
		self.coordinator.previous()
	}

	/// Single entry point for engine clicks. A click on empty canvas of a
	/// merged slot also drops the merge highlight. Returns whether it did.
	pub fn handle_click(&mut self, event: &ClickEvent) -> Result<bool, EditError> {
		self.coordinator.on_click(event)?;
		if !event.is_background() {
			return Ok(false);
		}
		match self.merger.clear_highlight(&mut self.store, event.slot) {
			Ok(cleared) => Ok(cleared),
			Err(err) => {
				debug!("slot {}: highlight not cleared: {err}", event.slot);
				Ok(false)
			}
		}
	}

	/// Adds an edge to the active slot. Returns the slot and the new id.
	pub fn add_edge(&mut self, from: &str, to: &str, label: &str) -> Result<(usize, String), EditError> {
		let slot = self.coordinator.active()?;
		let id = self.editor.add_edge(&mut self.store, slot, from, to, label)?;
		Ok((slot, id))
	}

	/// Re-weights the single selected edge of the active slot.
	pub fn update_selected(&mut self, label: &str) -> Result<usize, EditError> {
		let slot = self.coordinator.active()?;
		let [id] = self.coordinator.selection().edges.as_slice() else {
			return Err(EditError::SelectionRequired);
		};
		let id = id.clone();
		self.editor.update_edge(&mut self.store, slot, &id, label)?;
		Ok(slot)
	}

	/// Deletes the selected edges once `confirm` agrees. `confirm` receives
	/// the number of edges about to go. Declining returns `Ok(None)`.
	pub fn delete_selected(
		&mut self,
		confirm: impl FnOnce(usize) -> bool,
	) -> Result<Option<(usize, Vec<String>)>, EditError> {
		let slot = self.coordinator.active()?;
		let ids = self.coordinator.selection().edges.clone();
		if ids.is_empty() {
			return Err(EditError::SelectionRequired);
		}
		if !confirm(ids.len()) {
			return Ok(None);
		}
		let removed = self.editor.delete_edges(&mut self.store, slot, ids.as_slice())?;
		self.coordinator.clear_edge_selection();
		Ok(Some((slot, removed)))
	}

	/// Eases the active slot's view onto its whole graph.
	pub fn center(&mut self) -> Result<(), EditError> {
		let slot = self.coordinator.active()?;
		self.store.slot_mut(slot)?.fit(FitOptions {
			animation_ms: Some(CENTER_ANIMATION_MS),
		});
		Ok(())
	}

	/// Freezes or releases the layout in every slot. Returns the new state.
	pub fn toggle_beautify(&mut self) -> bool {
		self.beautified = !self.beautified;
		let options = if self.beautified {
			EngineOptions::FIXED
		} else {
			EngineOptions::PHYSICS
		};
		for slot in self.store.slots_mut() {
			slot.engine_mut().set_options(options);
			slot.fit(FitOptions::default());
		}
		self.beautified
	}

	/// Highlights form `form` across every slot, or clears the highlight.
	pub fn select_form(&mut self, form: Option<usize>) {
		self.forms.select(&mut self.store, form);
	}

	/// Locks the active slot and cuts the merge request for it.
	pub fn begin_merge(&mut self) -> Result<MergeTicket, MergeError> {
		let slot = self.coordinator.active()?;
		self.merger.begin(&mut self.store, slot, self.source.as_ref())
	}

	/// Settles a merge started with [`Session::begin_merge`].
	pub fn complete_merge(
		&mut self,
		ticket: &MergeTicket,
		response: Result<MergeResponse, ServiceError>,
	) -> Result<MergeOutcome, MergeError> {
		let response = match response {
			Ok(response) => response,
			Err(err) => {
				self.merger.abort(&mut self.store, ticket);
				return Err(err.into());
			}
		};
		let outcome = self.merger.complete(&mut self.store, ticket, response)?;
		if let Some(forms) = outcome.forms_with_nodes.clone() {
			self.forms.set_forms(&mut self.store, forms);
		}
		Ok(outcome)
	}

	/// Undoes the merge on the active slot. `false` when it was not merged.
	pub fn restore_merge(&mut self) -> Result<bool, MergeError> {
		let slot = self.coordinator.active()?;
		self.merger.restore(&mut self.store, slot)
	}

	/// Revalidation request for `slot`, or `None` without source data.
	pub fn prepare_validation(&self, slot: usize) -> Option<ValidationTicket> {
		validation::prepare(&self.store, slot, self.source.as_ref())
	}

	/// Applies a metric if its ticket is still current. Returns whether it did.
	pub fn apply_validation(&mut self, ticket: &ValidationTicket, metric: EvaluationMetric) -> bool {
		validation::apply(&mut self.store, ticket, metric)
	}
}

type BuiltGraph = (String, DataSet<Node>, DataSet<Edge>, Option<EvaluationMetric>);

fn build_graph(index: usize, graph: GraphData, scale: &WidthScale) -> Result<BuiltGraph, ServiceError> {
	let malformed = |err: StoreError| ServiceError::Malformed(format!("map {index}: {err}"));
	let nodes = DataSet::from_items(graph.nodes.into_iter().map(Node::from)).map_err(malformed)?;
	let edges = DataSet::from_items(graph.edges.into_iter().map(|wire| {
		let label = wire
			.label
			.or_else(|| wire.value.map(|v| v.to_string()))
			.unwrap_or_default();
		let value = wire.value.unwrap_or_else(|| parse_weight(&label));
		Edge {
			width: wire.width.unwrap_or_else(|| scale.initial(value)),
			id: wire.id,
			from: wire.from,
			to: wire.to,
			label,
			value,
			color: EDGE_COLOR,
			is_new_merged_edge: false,
		}
	}))
	.map_err(malformed)?;
	for edge in edges.iter() {
		if let Some(missing) = [&edge.from, &edge.to].into_iter().find(|n| !nodes.contains(n)) {
			return Err(ServiceError::Malformed(format!(
				"map {index}: edge '{}' refers to unknown node '{missing}'",
				edge.id
			)));
		}
	}
	let name = graph.map_name.unwrap_or_else(|| format!("Map {}", index + 1));
	Ok((name, nodes, edges, graph.evaluation_metric))
}

/// Runs a detached task on the UI thread.
pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

/// Shared handle used by the page's event handlers.
pub struct Controller<S> {
	session: Rc<RefCell<Session>>,
	service: Rc<S>,
	spawn: Spawner,
	listener: Option<Rc<dyn Fn()>>,
}

impl<S> Clone for Controller<S> {
	fn clone(&self) -> Self {
		Self {
			session: self.session.clone(),
			service: self.service.clone(),
			spawn: self.spawn.clone(),
			listener: self.listener.clone(),
		}
	}
}

impl<S: GraphService + 'static> Controller<S> {
	/// Wraps `session`; background work goes through `spawn`.
	pub fn new(session: Session, service: S, spawn: Spawner) -> Self {
		Self {
			session: Rc::new(RefCell::new(session)),
			service: Rc::new(service),
			spawn,
			listener: None,
		}
	}

	/// Called whenever a background task changed the session.
	pub fn with_listener(mut self, listener: impl Fn() + 'static) -> Self {
		self.listener = Some(Rc::new(listener));
		self
	}

	/// Borrows the session.
	pub fn with<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
		f(&self.session.borrow())
	}

	/// Borrows the session mutably.
	pub fn with_mut<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
		f(&mut self.session.borrow_mut())
	}

	/// Sends the workbook to the service and installs the maps it returns.
	pub async fn upload(&self, source: SourceData) -> Result<usize, ServiceError> {
		let response = self.service.process(&source).await?;
		self.with_mut(|session| session.load_batch(source, response))
	}

	/// Adds an edge to the active slot and rescores it in the background.
	pub fn add_edge(&self, from: &str, to: &str, label: &str) -> Result<String, EditError> {
		let (slot, id) = self.with_mut(|session| session.add_edge(from, to, label))?;
		self.revalidate(slot);
		Ok(id)
	}

	/// Re-weights the one selected edge and rescores the slot.
	pub fn update_selected(&self, label: &str) -> Result<(), EditError> {
		let slot = self.with_mut(|session| session.update_selected(label))?;
		self.revalidate(slot);
		Ok(())
	}

	/// Returns the removed ids, or `None` when the user declined.
	pub fn delete_selected(&self, confirm: impl FnOnce(usize) -> bool) -> Result<Option<Vec<String>>, EditError> {
		let Some((slot, removed)) = self.with_mut(|session| session.delete_selected(confirm))? else {
			return Ok(None);
		};
		if !removed.is_empty() {
			self.revalidate(slot);
		}
		Ok(Some(removed))
	}

	/// Routes an engine click to the session.
	pub fn handle_click(&self, event: &ClickEvent) -> Result<bool, EditError> {
		self.with_mut(|session| session.handle_click(event))
	}

	/// Merges inferred edges into the active slot.
	pub async fn merge(&self) -> Result<MergeOutcome, MergeError> {
		let ticket = self.with_mut(Session::begin_merge)?;
		self.notify();
		let response = self.service.merge_edges(&ticket.request).await;
		self.with_mut(|session| session.complete_merge(&ticket, response))
	}

	/// Undoes the merge on the active slot.
	pub fn restore(&self) -> Result<bool, MergeError> {
		self.with_mut(Session::restore_merge)
	}

	/// The merge button: restores a merged slot, merges any other.
	pub async fn toggle_merge(&self) -> Result<(), MergeError> {
		let merged = self.with(|session| session.active_slot().is_some_and(|s| s.merge.is_merged()));
		if merged {
			self.restore()?;
		} else {
			self.merge().await?;
		}
		Ok(())
	}

	fn notify(&self) {
		if let Some(listener) = &self.listener {
			listener();
		}
	}

	/// Scores `slot` in the background. Failures are logged and the old
	/// metric stays up.
	fn revalidate(&self, slot: usize) {
		let Some(ticket) = self.with(|session| session.prepare_validation(slot)) else {
			return;
		};
		let session = self.session.clone();
		let service = self.service.clone();
		let listener = self.listener.clone();
		(self.spawn)(Box::pin(async move {
			match service.revalidate(&ticket.request).await {
				Ok(metric) => {
					let applied = session.borrow_mut().apply_validation(&ticket, metric);
					if applied {
						debug!("slot {}: metric updated", ticket.slot);
						if let Some(listener) = listener {
							listener();
						}
					}
				}
				Err(err) => warn!("slot {}: validation failed: {err}", ticket.slot),
			}
		}));
	}
}
