use crate::map::{EvaluationMetric, Session, UnconnectedForm};

/// Plain snapshot of what the page shows, copied out of the session after
/// every change so reactive views never borrow the session themselves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewState {
	pub generation: u64,
	pub map_names: Vec<String>,
	pub active: usize,
	/// `(id, label)` of the active slot's nodes.
	pub nodes: Vec<(String, String)>,
	pub selected_edges: Vec<String>,
	pub metrics: Vec<(&'static str, String)>,
	pub unconnected: Vec<UnconnectedForm>,
	pub merge_label: &'static str,
	pub merge_busy: bool,
	pub beautified: bool,
	pub forms: Vec<String>,
	pub selected_form: Option<usize>,
}

impl ViewState {
	pub fn capture(session: &Session) -> Self {
		let active = session.active_slot();
		Self {
			generation: session.store().generation(),
			map_names: session.store().slots().iter().map(|s| s.map_name.clone()).collect(),
			active: active.map(|s| s.index).unwrap_or_default(),
			nodes: active
				.map(|s| s.nodes.iter().map(|n| (n.id.clone(), n.label.clone())).collect())
				.unwrap_or_default(),
			selected_edges: session.coordinator().selection().edges.clone(),
			metrics: EvaluationMetric::display_rows(active.and_then(|s| s.metric.as_ref())),
			unconnected: active.map(|s| s.unconnected.clone()).unwrap_or_default(),
			merge_label: session.merge_label(),
			merge_busy: active.is_some_and(|s| s.merge.is_in_flight()),
			beautified: session.is_beautified(),
			forms: session.forms().labels(),
			selected_form: session.forms().selected(),
		}
	}

	pub fn slot_count(&self) -> usize {
		self.map_names.len()
	}

	/// At least one map is on screen.
	pub fn is_loaded(&self) -> bool {
		!self.map_names.is_empty()
	}

	/// Id of the one selected edge, if exactly one is selected.
	pub fn single_selection(&self) -> Option<&str> {
		match self.selected_edges.as_slice() {
			[id] => Some(id.as_str()),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::map::bridge::{EngineFactory, EngineOptions, FitOptions, RenderEngine};
	use crate::map::editor::WidthScale;
	use crate::map::types::{GraphData, ProcessResponse, WireEdge, WireNode};
	use crate::map::{ClickEvent, DataSet, Edge, FormWithNodes, Node, SourceData};

	struct Headless;

	impl RenderEngine for Headless {
		fn redraw(&mut self, _: &DataSet<Node>, _: &DataSet<Edge>) {}
		fn fit(&mut self, _: FitOptions) {}
		fn set_options(&mut self, _: EngineOptions) {}
		fn destroy(&mut self) {}
	}

	impl EngineFactory for Headless {
		fn create(&self, _: usize, _: &DataSet<Node>, _: &DataSet<Edge>) -> Box<dyn RenderEngine> {
			Box::new(Headless)
		}
	}

	#[test]
	fn capture_follows_the_active_slot() {
		let mut session = Session::new(WidthScale::default(), Box::new(Headless));
		let empty = ViewState::capture(&session);
		assert_eq!(empty.merge_label, "Merge Edge");
		assert!(!empty.is_loaded());

		let graph = |name: &str, ids: &[&str]| GraphData {
			map_name: Some(name.into()),
			nodes: ids
				.iter()
				.map(|id| WireNode {
					id: (*id).into(),
					label: id.to_uppercase(),
					title: None,
				})
				.collect(),
			edges: vec![WireEdge {
				id: "e1".into(),
				from: ids[0].into(),
				to: ids[1].into(),
				label: None,
				value: Some(2.0),
				width: None,
			}],
			evaluation_metric: None,
		};
		let response = ProcessResponse {
			graph_data: vec![graph("First", &["a", "b"]), graph("Second", &["x", "y", "z"])],
			forms_with_nodes: vec![FormWithNodes {
				language: "en".into(),
				form: "eat".into(),
				nodes: vec!["a".into()],
			}],
		};
		session.load_batch(SourceData::default(), response).unwrap();
		session.handle_click(&ClickEvent::new(1, Vec::new(), vec!["e1".into()])).unwrap();

		let view = ViewState::capture(&session);
		assert!(view.is_loaded());
		assert_eq!(view.slot_count(), 2);
		assert_eq!(view.forms, vec!["eat (en)"]);
		assert_eq!(view.map_names, vec!["First", "Second"]);
		assert_eq!(view.active, 1);
		assert_eq!(view.nodes.len(), 3);
		assert_eq!(view.single_selection(), Some("e1"));
		assert!(view.metrics.iter().all(|(_, v)| v == "N/A"));
	}
}
