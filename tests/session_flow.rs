//! End-to-end editing flows driven through `Controller` with an in-memory
//! graph service and engines that only record what they were asked to do.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use futures::executor::block_on;
use futures::future::LocalBoxFuture;
use semantic_map_canvas::map::{
	ClickEvent, Controller, DataSet, EDGE_COLOR, Edge, EditError, EngineFactory, EngineOptions, EvaluationMetric,
	FitOptions, GraphData, GraphRequest, GraphService, MERGED_EDGE_COLOR, MergeError, MergeResponse, MergedGraph,
	Node, ProcessResponse, RenderEngine, ServiceError, Session, SourceData, Spawner, UnconnectedForm, WidthScale,
	WireEdge, WireNode, update_edge_widths,
};
use serde_json::json;

#[derive(Clone, Default)]
struct EngineLog(Rc<RefCell<Vec<String>>>);

impl EngineLog {
	fn count(&self, entry: &str) -> usize {
		self.0.borrow().iter().filter(|e| e.as_str() == entry).count()
	}
}

struct RecordingEngine {
	slot: usize,
	log: EngineLog,
}

impl RenderEngine for RecordingEngine {
	fn redraw(&mut self, _: &DataSet<Node>, edges: &DataSet<Edge>) {
		self.log.0.borrow_mut().push(format!("{}:redraw:{}", self.slot, edges.len()));
	}
	fn fit(&mut self, options: FitOptions) {
		let mut log = self.log.0.borrow_mut();
		log.push(format!("{}:fit", self.slot));
		if let Some(ms) = options.animation_ms {
			log.push(format!("{}:animate:{ms}", self.slot));
		}
	}
	fn set_options(&mut self, options: EngineOptions) {
		self.log.0.borrow_mut().push(format!("{}:physics:{:?}", self.slot, options.physics));
	}
	fn destroy(&mut self) {
		self.log.0.borrow_mut().push(format!("{}:destroy", self.slot));
	}
}

struct RecordingFactory(EngineLog);

impl EngineFactory for RecordingFactory {
	fn create(&self, slot: usize, _: &DataSet<Node>, _: &DataSet<Edge>) -> Box<dyn RenderEngine> {
		Box::new(RecordingEngine {
			slot,
			log: self.0.clone(),
		})
	}
}

struct FakeState {
	batch: ProcessResponse,
	merge: RefCell<Result<MergeResponse, ServiceError>>,
	fail_validation: Cell<bool>,
	validations: RefCell<Vec<GraphRequest>>,
}

/// Scores a map by counting its edges, so a metric shows which snapshot
/// it was computed from.
#[derive(Clone)]
struct FakeService(Rc<FakeState>);

fn score(request: &GraphRequest) -> EvaluationMetric {
	EvaluationMetric {
		num_edges: Some(request.graph.edges.len() as f64),
		..Default::default()
	}
}

#[async_trait(?Send)]
impl GraphService for FakeService {
	async fn process(&self, _: &SourceData) -> Result<ProcessResponse, ServiceError> {
		Ok(self.0.batch.clone())
	}

	async fn revalidate(&self, request: &GraphRequest) -> Result<EvaluationMetric, ServiceError> {
		self.0.validations.borrow_mut().push(request.clone());
		if self.0.fail_validation.get() {
			return Err(ServiceError::Network("connection refused".into()));
		}
		Ok(score(request))
	}

	async fn merge_edges(&self, _: &GraphRequest) -> Result<MergeResponse, ServiceError> {
		self.0.merge.borrow().clone()
	}
}

/// Spawned tasks wait here until a test decides to run them.
#[derive(Clone, Default)]
struct TaskQueue(Rc<RefCell<Vec<LocalBoxFuture<'static, ()>>>>);

impl TaskQueue {
	fn spawner(&self) -> Spawner {
		let queue = self.0.clone();
		Rc::new(move |task: LocalBoxFuture<'static, ()>| queue.borrow_mut().push(task))
	}

	fn len(&self) -> usize {
		self.0.borrow().len()
	}

	fn run_all(&self) {
		let tasks: Vec<_> = self.0.borrow_mut().drain(..).collect();
		for task in tasks {
			block_on(task);
		}
	}

	fn run_reversed(&self) {
		let tasks: Vec<_> = self.0.borrow_mut().drain(..).rev().collect();
		for task in tasks {
			block_on(task);
		}
	}
}

fn wire_node(id: &str) -> WireNode {
	WireNode {
		id: id.into(),
		label: id.to_uppercase(),
		title: None,
	}
}

fn wire_edge(id: &str, from: &str, to: &str, value: f64) -> WireEdge {
	WireEdge {
		id: id.into(),
		from: from.into(),
		to: to.into(),
		label: None,
		value: Some(value),
		width: None,
	}
}

fn initial_metric() -> EvaluationMetric {
	EvaluationMetric {
		acc: Some(0.5),
		f1: Some(0.25),
		unconnected_forms: Some(vec![UnconnectedForm {
			language: "en".into(),
			form: "drink".into(),
		}]),
		..Default::default()
	}
}

fn batch() -> ProcessResponse {
	ProcessResponse {
		graph_data: vec![
			GraphData {
				map_name: Some("Map A".into()),
				nodes: ["a", "b", "c", "d"].map(wire_node).to_vec(),
				edges: vec![
					wire_edge("e1", "a", "b", 2.0),
					wire_edge("e2", "b", "c", 8.0),
					wire_edge("e3", "c", "d", 4.0),
					wire_edge("e4", "a", "d", 1.0),
				],
				evaluation_metric: Some(initial_metric()),
			},
			GraphData {
				map_name: Some("Map B".into()),
				nodes: ["a", "b", "c"].map(wire_node).to_vec(),
				edges: vec![wire_edge("e1", "a", "b", 3.0)],
				evaluation_metric: None,
			},
		],
		forms_with_nodes: Vec::new(),
	}
}

fn merge_response() -> MergeResponse {
	MergeResponse {
		graph_data: MergedGraph {
			edges: vec![WireEdge {
				label: Some("3".into()),
				..wire_edge("m1", "a", "c", 3.0)
			}],
			evaluation_metric: Some(EvaluationMetric {
				acc: Some(0.75),
				unconnected_forms: Some(Vec::new()),
				..Default::default()
			}),
		},
		forms_with_nodes: None,
	}
}

fn source() -> SourceData {
	SourceData {
		data: vec![json!({"Language": "en", "Form": "eat", "0": 1})],
		label: vec![json!({"0": "EAT"})],
	}
}

struct Harness {
	controller: Controller<FakeService>,
	service: FakeService,
	tasks: TaskQueue,
	engines: EngineLog,
}

impl Harness {
	fn new() -> Self {
		let engines = EngineLog::default();
		let tasks = TaskQueue::default();
		let service = FakeService(Rc::new(FakeState {
			batch: batch(),
			merge: RefCell::new(Ok(merge_response())),
			fail_validation: Cell::new(false),
			validations: RefCell::new(Vec::new()),
		}));
		let session = Session::new(WidthScale::default(), Box::new(RecordingFactory(engines.clone())));
		let controller = Controller::new(session, service.clone(), tasks.spawner());
		Self {
			controller,
			service,
			tasks,
			engines,
		}
	}

	fn loaded() -> Self {
		let harness = Self::new();
		let slots = block_on(harness.controller.upload(source())).unwrap();
		assert_eq!(slots, 2);
		harness
	}

	fn edges(&self, slot: usize) -> Vec<Edge> {
		self.controller.with(|s| s.store().slot(slot).unwrap().edges.iter().cloned().collect())
	}

	fn edge(&self, slot: usize, id: &str) -> Option<Edge> {
		self.controller
			.with(|s| s.store().get(slot, id).unwrap().cloned())
	}

	fn metric(&self, slot: usize) -> Option<EvaluationMetric> {
		self.controller.with(|s| s.store().slot(slot).unwrap().metric.clone())
	}

	fn unconnected(&self, slot: usize) -> Vec<UnconnectedForm> {
		self.controller.with(|s| s.store().slot(slot).unwrap().unconnected.clone())
	}

	fn label(&self) -> &'static str {
		self.controller.with(Session::merge_label)
	}

	fn click_edges(&self, slot: usize, ids: &[&str]) {
		let event = ClickEvent::new(slot, Vec::new(), ids.iter().map(|id| id.to_string()).collect());
		self.controller.handle_click(&event).unwrap();
	}

	fn validations(&self) -> usize {
		self.service.0.validations.borrow().len()
	}
}

#[test]
fn upload_builds_one_slot_per_map() {
	let h = Harness::loaded();
	h.controller.with(|s| {
		assert_eq!(s.coordinator().active().unwrap(), 0);
		assert_eq!(s.store().slot(1).unwrap().map_name, "Map B");
		assert_eq!(s.store().slot(0).unwrap().unconnected.len(), 1);
	});
	// missing labels come from the weight, widths from clamp(2 * weight)
	let e1 = h.edge(0, "e1").unwrap();
	assert_eq!(e1.label, "2");
	assert_eq!(e1.width, 4.0);
	assert_eq!(h.edge(0, "e2").unwrap().width, 10.0);
	assert_eq!(h.edge(0, "e4").unwrap().width, 2.0);
	assert_eq!(h.engines.count("0:fit"), 1);
	assert_eq!(h.engines.count("1:fit"), 1);
}

#[test]
fn reupload_replaces_the_whole_batch() {
	let h = Harness::loaded();
	h.controller.add_edge("a", "c", "5").unwrap();
	block_on(h.controller.upload(source())).unwrap();
	assert_eq!(h.engines.count("0:destroy"), 1);
	assert_eq!(h.engines.count("1:destroy"), 1);
	assert_eq!(h.edges(0).len(), 4);
}

#[test]
fn edits_without_maps_are_rejected() {
	let h = Harness::new();
	assert_eq!(h.controller.add_edge("a", "b", "1"), Err(EditError::NoSlots));
	assert_eq!(h.label(), "Merge Edge");
}

#[test]
fn add_edge_parses_its_weight() {
	let h = Harness::loaded();
	let id = h.controller.add_edge("a", "c", "2.5").unwrap();
	let added = h.edge(0, &id).unwrap();
	assert_eq!(added.value, 2.5);
	assert_eq!(added.label, "2.5");
	assert_eq!(added.color, EDGE_COLOR);

	let id = h.controller.add_edge("b", "d", "").unwrap();
	let added = h.edge(0, &id).unwrap();
	assert_eq!(added.value, 1.0);
	assert_eq!(added.label, "");
	assert_eq!(h.edges(1).len(), 1);
	assert_eq!(h.tasks.len(), 2);
}

#[test]
fn duplicate_edge_changes_nothing_and_skips_validation() {
	let h = Harness::loaded();
	let before = h.edges(0);
	let err = h.controller.add_edge("b", "a", "7").unwrap_err();
	assert_eq!(
		err,
		EditError::DuplicateEdge {
			from: "b".into(),
			to: "a".into()
		}
	);
	assert_eq!(h.edges(0), before);
	assert_eq!(h.tasks.len(), 0);
	h.tasks.run_all();
	assert_eq!(h.validations(), 0);
}

#[test]
fn validation_updates_the_edited_slot() {
	let h = Harness::loaded();
	h.controller.add_edge("a", "c", "5").unwrap();
	h.tasks.run_all();
	assert_eq!(h.validations(), 1);
	let request = h.service.0.validations.borrow()[0].clone();
	assert_eq!(request.graph.map_name, "Map A");
	assert_eq!(request.data, source().data);
	assert_eq!(h.metric(0).unwrap().num_edges, Some(5.0));
	assert!(h.unconnected(0).is_empty());
}

#[test]
fn validation_failure_keeps_the_edit_and_old_metric() {
	let h = Harness::loaded();
	h.service.0.fail_validation.set(true);
	let id = h.controller.add_edge("a", "c", "5").unwrap();
	h.tasks.run_all();
	assert!(h.edge(0, &id).is_some());
	assert_eq!(h.metric(0), Some(initial_metric()));
}

#[test]
fn late_validations_land_on_the_slot_they_were_issued_for() {
	let h = Harness::loaded();
	h.controller.add_edge("a", "c", "5").unwrap();
	h.controller.with_mut(|s| s.select(1)).unwrap();
	h.controller.add_edge("b", "c", "2").unwrap();
	assert_eq!(h.tasks.len(), 2);

	h.tasks.run_reversed();
	assert_eq!(h.metric(0).unwrap().num_edges, Some(5.0));
	assert_eq!(h.metric(1).unwrap().num_edges, Some(2.0));
}

#[test]
fn validations_for_a_replaced_batch_are_dropped() {
	let h = Harness::loaded();
	h.controller.add_edge("a", "c", "5").unwrap();
	block_on(h.controller.upload(source())).unwrap();
	h.tasks.run_all();
	assert_eq!(h.validations(), 1);
	assert_eq!(h.metric(0), Some(initial_metric()));
}

#[test]
fn update_requires_a_single_selected_edge() {
	let h = Harness::loaded();
	assert_eq!(h.controller.update_selected("9"), Err(EditError::SelectionRequired));
	h.click_edges(0, &["e1", "e2"]);
	assert_eq!(h.controller.update_selected("9"), Err(EditError::SelectionRequired));

	h.click_edges(0, &["e4"]);
	h.controller.update_selected("9").unwrap();
	let e4 = h.edge(0, "e4").unwrap();
	assert_eq!((e4.value, e4.label.as_str(), e4.width), (9.0, "9", 10.0));
	assert_eq!((e4.from.as_str(), e4.to.as_str()), ("a", "d"));
	assert_eq!(h.tasks.len(), 1);
}

#[test]
fn deleting_three_selected_edges_leaves_other_slots_alone() {
	let h = Harness::loaded();
	let other = h.edges(1);
	h.click_edges(0, &["e1", "e2", "e3"]);

	assert_eq!(h.controller.delete_selected(|_| false).unwrap(), None);
	assert_eq!(h.edges(0).len(), 4);

	let removed = h
		.controller
		.delete_selected(|n| {
			assert_eq!(n, 3);
			true
		})
		.unwrap()
		.unwrap();
	assert_eq!(removed, vec!["e1", "e2", "e3"]);
	let remaining: Vec<String> = h.edges(0).into_iter().map(|e| e.id).collect();
	assert_eq!(remaining, vec!["e4"]);
	// survivors keep their widths
	assert_eq!(h.edge(0, "e4").unwrap().width, 2.0);
	assert_eq!(h.edges(1), other);
	assert_eq!(h.tasks.len(), 1);
}

#[test]
fn merge_then_restore_round_trips_exactly() {
	let h = Harness::loaded();
	let edges = h.edges(0);
	let metric = h.metric(0);
	let unconnected = h.unconnected(0);

	let outcome = block_on(h.controller.merge()).unwrap();
	assert_eq!(outcome.added, vec!["m1"]);
	assert_eq!(h.label(), "Restore Merge");
	assert_eq!(h.metric(0).unwrap().acc, Some(0.75));
	assert!(h.unconnected(0).is_empty());

	assert!(h.controller.restore().unwrap());
	assert_eq!(h.edges(0), edges);
	assert_eq!(h.metric(0), metric);
	assert_eq!(h.unconnected(0), unconnected);
	assert_eq!(h.label(), "Merge Edge");
}

#[test]
fn merged_edge_highlight_clears_on_background_click() {
	let h = Harness::loaded();
	let before = h.edges(0).len();
	block_on(h.controller.toggle_merge()).unwrap();

	assert_eq!(h.edges(0).len(), before + 1);
	let m1 = h.edge(0, "m1").unwrap();
	assert_eq!(m1.color, MERGED_EDGE_COLOR);
	assert!(m1.is_new_merged_edge);

	// clicking an edge keeps the highlight
	h.click_edges(0, &["e1"]);
	assert!(h.edge(0, "m1").unwrap().is_new_merged_edge);

	let cleared = h
		.controller
		.handle_click(&ClickEvent::new(0, Vec::new(), Vec::new()))
		.unwrap();
	assert!(cleared);
	let m1 = h.edge(0, "m1").unwrap();
	assert_eq!(m1.color, EDGE_COLOR);
	assert!(!m1.is_new_merged_edge);
	assert_eq!(h.edges(0).len(), before + 1);
	assert_eq!(h.label(), "Restore Merge");

	// the button now restores
	block_on(h.controller.toggle_merge()).unwrap();
	assert!(h.edge(0, "m1").is_none());
}

#[test]
fn restore_when_not_merged_is_a_no_op() {
	let h = Harness::loaded();
	let edges = h.edges(0);
	let log_len = h.engines.0.borrow().len();
	assert!(!h.controller.restore().unwrap());
	assert_eq!(h.edges(0), edges);
	assert_eq!(h.metric(0), Some(initial_metric()));
	assert_eq!(h.label(), "Merge Edge");
	assert_eq!(h.engines.0.borrow().len(), log_len);
}

#[test]
fn failed_merge_reports_the_server_message() {
	let h = Harness::loaded();
	*h.service.0.merge.borrow_mut() = Err(ServiceError::Status {
		status: 400,
		message: "Missing graph data".into(),
	});
	let edges = h.edges(0);
	let err = block_on(h.controller.merge()).unwrap_err();
	assert_eq!(err.to_string(), "Merge failed: Missing graph data");
	assert_eq!(h.label(), "Merge Edge");
	assert_eq!(h.edges(0), edges);
	assert_eq!(h.metric(0), Some(initial_metric()));
}

#[test]
fn edges_to_missing_nodes_reject_the_whole_batch() {
	let h = Harness::loaded();
	let mut bad = batch();
	bad.graph_data[1].edges.push(wire_edge("ghost", "a", "nowhere", 1.0));
	let redraws = h.engines.0.borrow().len();

	let err = h
		.controller
		.with_mut(|s| s.load_batch(source(), bad))
		.unwrap_err();
	assert!(matches!(&err, ServiceError::Malformed(msg) if msg.contains("nowhere")));
	assert_eq!(h.controller.with(|s| s.store().len()), 2);
	assert_eq!(h.edges(1).len(), 1);
	assert_eq!(h.engines.0.borrow().len(), redraws);
}

#[test]
fn merge_without_source_data_is_refused() {
	let h = Harness::new();
	h.controller
		.with_mut(|s| s.load_batch(SourceData::default(), batch()))
		.unwrap();
	assert_eq!(block_on(h.controller.merge()).unwrap_err(), MergeError::NoSourceData);
	assert_eq!(h.label(), "Merge Edge");
}

#[test]
fn slot_is_locked_while_its_merge_is_in_flight() {
	let h = Harness::loaded();
	let ticket = h.controller.with_mut(Session::begin_merge).unwrap();
	assert_eq!(h.label(), "Merging...");
	assert_eq!(h.controller.add_edge("a", "c", "1"), Err(EditError::SlotBusy(0)));
	h.click_edges(0, &["e1"]);
	assert_eq!(h.controller.update_selected("4"), Err(EditError::SlotBusy(0)));
	assert_eq!(h.controller.restore(), Err(MergeError::InFlight));

	// other slots stay editable
	h.controller.with_mut(|s| s.select(1)).unwrap();
	h.controller.add_edge("a", "c", "1").unwrap();
	h.controller.with_mut(|s| s.select(0)).unwrap();

	h.controller
		.with_mut(|s| s.complete_merge(&ticket, Ok(merge_response())))
		.unwrap();
	assert_eq!(h.label(), "Restore Merge");
	h.controller.add_edge("b", "d", "1").unwrap();
}

#[test]
fn center_and_beautify_drive_the_engines() {
	let h = Harness::loaded();
	h.controller.with_mut(Session::center).unwrap();
	assert_eq!(h.engines.count("0:fit"), 2);
	assert_eq!(h.engines.count("0:animate:1000"), 1);
	assert_eq!(h.engines.count("1:fit"), 1);

	assert!(h.controller.with_mut(Session::toggle_beautify));
	assert_eq!(h.engines.count("0:physics:Some(false)"), 1);
	assert_eq!(h.engines.count("1:physics:Some(false)"), 1);
	assert!(!h.controller.with_mut(Session::toggle_beautify));
	assert_eq!(h.engines.count("1:physics:Some(true)"), 1);
}

#[test]
fn widths_never_decrease_with_weight() {
	let mut edges = DataSet::from_items(
		[3.0, 0.5, 12.0, 7.25, 3.0, 0.0]
			.into_iter()
			.enumerate()
			.map(|(i, value)| Edge {
				id: format!("e{i}"),
				from: "a".into(),
				to: "b".into(),
				label: value.to_string(),
				value,
				width: 0.0,
				color: EDGE_COLOR,
				is_new_merged_edge: false,
			}),
	)
	.unwrap();
	update_edge_widths(&mut edges, &WidthScale::default());
	let mut pairs: Vec<(f64, f64)> = edges.iter().map(|e| (e.value, e.width)).collect();
	pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
	assert!(pairs.windows(2).all(|w| w[0].1 <= w[1].1));
	assert_eq!(pairs.first().map(|p| p.1), Some(1.0));
	assert_eq!(pairs.last().map(|p| p.1), Some(10.0));
}
