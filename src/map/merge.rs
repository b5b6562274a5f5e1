//! Reversible merge of server-inferred edges into one slot.
//!
//! A slot moves `Unmerged -> Merging -> Merged -> Unmerged`. The backup is
//! taken when the request goes out, the overlay is applied only once a valid
//! response arrives, and restore undoes exactly what the overlay added.

use std::collections::HashSet;

use log::{debug, info};

use super::bridge::FitOptions;
use super::dataset::DataSet;
use super::editor::{DEFAULT_WEIGHT, WidthScale, update_edge_widths};
use super::error::{MergeError, ServiceError};
use super::store::GraphStore;
use super::types::{
	EDGE_COLOR, Edge, EdgePatch, EvaluationMetric, FormWithNodes, GraphRequest, MERGED_EDGE_COLOR,
	MergeResponse, Node, SourceData, UnconnectedForm, WireEdge,
};
use super::validation::graph_request;

/// What a slot looked like just before a merge.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeBackup {
	/// Metric before the merge.
	pub metric: Option<EvaluationMetric>,
	/// Unconnected forms before the merge.
	pub unconnected: Vec<UnconnectedForm>,
	/// Widths of the pre-existing edges, which the merge rescales.
	pub widths: Vec<(String, f64)>,
	/// Ids inserted by the merge.
	pub edge_ids: Vec<String>,
}

/// Where a slot is in the merge cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum MergeState {
	/// No merge applied.
	#[default]
	Unmerged,
	/// Request sent, response pending.
	Merging(MergeBackup),
	/// Merged edges are in the slot.
	Merged {
		/// Snapshot to restore from.
		backup: MergeBackup,
		/// Merged edges still wear the highlight palette.
		highlighted: bool,
		/// The slot was edited after the merge landed.
		edited: bool,
	},
}

impl MergeState {
	/// A merge overlay is applied.
	pub fn is_merged(&self) -> bool {
		matches!(self, Self::Merged { .. })
	}

	/// A merge request is outstanding, so the slot refuses edits.
	pub fn is_in_flight(&self) -> bool {
		matches!(self, Self::Merging(_))
	}

	/// Text for the merge button.
	pub fn button_label(&self) -> &'static str {
		match self {
			Self::Unmerged => "Merge Edge",
			Self::Merging(_) => "Merging...",
			Self::Merged { .. } => "Restore Merge",
		}
	}

	pub(crate) fn mark_edited(&mut self) {
		if let Self::Merged { edited, .. } = self {
			*edited = true;
		}
	}
}

/// An outstanding merge request for one slot of one batch.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeTicket {
	/// Slot the merge was started on.
	pub slot: usize,
	/// Batch generation at the time.
	pub generation: u64,
	/// Body sent to the merge endpoint.
	pub request: GraphRequest,
}

/// Result of a merge that landed.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome {
	/// Slot that was merged.
	pub slot: usize,
	/// Ids of the inserted edges.
	pub added: Vec<String>,
	/// Replacement form list, when the service sent one.
	pub forms_with_nodes: Option<Vec<FormWithNodes>>,
}

/// Applies and undoes merge overlays.
#[derive(Clone, Copy, Debug, Default)]
pub struct MergeController {
	scale: WidthScale,
}

impl MergeController {
	/// Controller rescaling widths onto `scale`.
	pub fn new(scale: WidthScale) -> Self {
		Self { scale }
	}

	/// Snapshots the slot and builds the merge request.
	pub fn begin(
		&self,
		store: &mut GraphStore,
		slot: usize,
		source: Option<&SourceData>,
	) -> Result<MergeTicket, MergeError> {
		let source = source.filter(|s| !s.is_empty()).ok_or(MergeError::NoSourceData)?;
		let generation = store.generation();
		let target = store.slot_mut(slot)?;
		match target.merge {
			MergeState::Unmerged => {}
			MergeState::Merging(_) => return Err(MergeError::InFlight),
			MergeState::Merged { .. } => return Err(MergeError::AlreadyMerged),
		}

		let backup = MergeBackup {
			metric: target.metric.clone(),
			unconnected: target.unconnected.clone(),
			widths: target.edges.iter().map(|e| (e.id.clone(), e.width)).collect(),
			edge_ids: Vec::new(),
		};
		let request = graph_request(target, source);
		target.merge = MergeState::Merging(backup);
		debug!("slot {slot}: merge requested");
		Ok(MergeTicket {
			slot,
			generation,
			request,
		})
	}

	/// Applies a successful response. A rejected response leaves the slot
	/// `Unmerged` with its graph untouched.
	pub fn complete(
		&self,
		store: &mut GraphStore,
		ticket: &MergeTicket,
		response: MergeResponse,
	) -> Result<MergeOutcome, MergeError> {
		if store.generation() != ticket.generation {
			debug!("slot {}: dropping merge response for an old batch", ticket.slot);
			return Err(MergeError::Stale);
		}
		let target = store.slot_mut(ticket.slot)?;
		let mut backup = match std::mem::take(&mut target.merge) {
			MergeState::Merging(backup) => backup,
			other => {
				target.merge = other;
				return Err(MergeError::Stale);
			}
		};

		let MergeResponse {
			graph_data,
			forms_with_nodes,
		} = response;
		let added = match overlay_edges(&target.nodes, &target.edges, graph_data.edges) {
			Ok(added) => added,
			Err(err) => {
				target.merge = MergeState::Unmerged;
				return Err(err.into());
			}
		};
		let ids: Vec<String> = added.iter().map(|e| e.id.clone()).collect();
		if let Err(err) = target.edges.add(added) {
			target.merge = MergeState::Unmerged;
			return Err(err.into());
		}
		update_edge_widths(&mut target.edges, &self.scale);

		let unconnected = graph_data
			.evaluation_metric
			.as_ref()
			.and_then(|m| m.unconnected_forms.clone())
			.or_else(|| {
				forms_with_nodes.as_ref().map(|forms| {
					forms
						.iter()
						.map(|f| UnconnectedForm {
							language: f.language.clone(),
							form: f.form.clone(),
						})
						.collect()
				})
			});
		if let Some(metric) = graph_data.evaluation_metric {
			target.metric = Some(metric);
		}
		if let Some(rows) = unconnected {
			target.unconnected = rows;
		}

		backup.edge_ids = ids.clone();
		target.merge = MergeState::Merged {
			backup,
			highlighted: !ids.is_empty(),
			edited: false,
		};
		target.redraw();
		target.fit(FitOptions::default());
		info!("slot {}: merged {} edges", ticket.slot, ids.len());
		Ok(MergeOutcome {
			slot: ticket.slot,
			added: ids,
			forms_with_nodes,
		})
	}

	/// The request failed; the slot goes back to `Unmerged` untouched.
	pub fn abort(&self, store: &mut GraphStore, ticket: &MergeTicket) {
		if store.generation() != ticket.generation {
			return;
		}
		if let Ok(target) = store.slot_mut(ticket.slot) {
			if target.merge.is_in_flight() {
				target.merge = MergeState::Unmerged;
				debug!("slot {}: merge aborted", ticket.slot);
			}
		}
	}

	/// Removes the merged edges and puts the backed-up scores back. Returns
	/// `false` without touching anything when the slot is not merged.
	pub fn restore(&self, store: &mut GraphStore, slot: usize) -> Result<bool, MergeError> {
		let target = store.slot_mut(slot)?;
		let (backup, edited) = match std::mem::take(&mut target.merge) {
			MergeState::Merged { backup, edited, .. } => (backup, edited),
			MergeState::Unmerged => return Ok(false),
			in_flight => {
				target.merge = in_flight;
				return Err(MergeError::InFlight);
			}
		};

		target.edges.remove(backup.edge_ids.as_slice());
		if edited {
			update_edge_widths(&mut target.edges, &self.scale);
		} else {
			let widths: Vec<(String, f64)> = backup
				.widths
				.into_iter()
				.filter(|(id, _)| target.edges.contains(id))
				.collect();
			target.edges.update(widths, |edge, width| edge.width = width)?;
		}
		target.metric = backup.metric;
		target.unconnected = backup.unconnected;
		target.redraw();
		target.fit(FitOptions::default());
		info!("slot {slot}: merge restored");
		Ok(true)
	}

	/// Background click on a merged slot: drop the highlight palette from the
	/// merged edges but keep them in the graph.
	pub fn clear_highlight(&self, store: &mut GraphStore, slot: usize) -> Result<bool, MergeError> {
		let target = store.slot_mut(slot)?;
		let MergeState::Merged {
			backup,
			highlighted,
			..
		} = &mut target.merge
		else {
			return Ok(false);
		};
		if !*highlighted {
			return Ok(false);
		}
		*highlighted = false;
		let patches: Vec<(String, EdgePatch)> = backup
			.edge_ids
			.iter()
			.filter(|id| target.edges.contains(id))
			.map(|id| (id.clone(), EdgePatch::new(id.as_str()).color(EDGE_COLOR).merged_flag(false)))
			.collect();
		target.edges.update(patches, |edge, patch| patch.apply(edge))?;
		target.redraw();
		debug!("slot {slot}: merge highlight cleared");
		Ok(true)
	}
}

/// Turns the response edge list into highlighted edges, rejecting lists that
/// would collide with existing ids or point at unknown nodes.
fn overlay_edges(
	nodes: &DataSet<Node>,
	edges: &DataSet<Edge>,
	incoming: Vec<WireEdge>,
) -> Result<Vec<Edge>, ServiceError> {
	let mut seen = HashSet::new();
	incoming
		.into_iter()
		.map(|wire| {
			if edges.contains(&wire.id) || !seen.insert(wire.id.clone()) {
				return Err(ServiceError::Malformed(format!(
					"merged edge id '{}' is not unique",
					wire.id
				)));
			}
			if let Some(missing) = [&wire.from, &wire.to].into_iter().find(|n| !nodes.contains(n)) {
				return Err(ServiceError::Malformed(format!(
					"merged edge '{}' refers to unknown node '{missing}'",
					wire.id
				)));
			}
			Ok(Edge {
				value: wire.value.unwrap_or(DEFAULT_WEIGHT),
				label: wire.label.unwrap_or_default(),
				id: wire.id,
				from: wire.from,
				to: wire.to,
				width: 0.0,
				color: MERGED_EDGE_COLOR,
				is_new_merged_edge: true,
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::map::bridge::ClickEvent;
	use crate::map::editor::EdgeEditor;
	use crate::map::store::tests::{Recorder, edge, slot};
	use crate::map::types::MergedGraph;

	fn source() -> SourceData {
		SourceData {
			data: vec![json!({"Language": "en", "Form": "eat"})],
			label: Vec::new(),
		}
	}

	fn metric(acc: f64) -> EvaluationMetric {
		EvaluationMetric {
			acc: Some(acc),
			unconnected_forms: Some(vec![UnconnectedForm {
				language: "en".into(),
				form: "drink".into(),
			}]),
			..Default::default()
		}
	}

	fn wire(id: &str, from: &str, to: &str, value: f64) -> WireEdge {
		WireEdge {
			id: id.into(),
			from: from.into(),
			to: to.into(),
			label: Some(value.to_string()),
			value: Some(value),
			width: None,
		}
	}

	fn response(edges: Vec<WireEdge>, metric: Option<EvaluationMetric>) -> MergeResponse {
		MergeResponse {
			graph_data: MergedGraph {
				edges,
				evaluation_metric: metric,
			},
			forms_with_nodes: None,
		}
	}

	fn store() -> (GraphStore, Recorder) {
		let log = Recorder::default();
		let mut store = GraphStore::new();
		store.replace_batch(|| {
			let mut first = slot(
				0,
				&["a", "b", "c"],
				vec![edge("e1", "a", "b", 2.0), edge("e2", "b", "c", 8.0)],
				&log,
			);
			first.metric = Some(metric(0.4));
			first.unconnected = first.metric.as_ref().and_then(|m| m.unconnected_forms.clone()).unwrap();
			vec![first, slot(1, &["a", "b"], Vec::new(), &log)]
		});
		(store, log)
	}

	fn snapshot(store: &GraphStore, slot: usize) -> (Vec<Edge>, Option<EvaluationMetric>, Vec<UnconnectedForm>) {
		let s = store.slot(slot).unwrap();
		(s.edges.iter().cloned().collect(), s.metric.clone(), s.unconnected.clone())
	}

	#[test]
	fn merge_then_restore_is_exact() {
		let (mut store, _) = store();
		let merger = MergeController::default();
		let before = snapshot(&store, 0);

		let ticket = merger.begin(&mut store, 0, Some(&source())).unwrap();
		assert_eq!(store.slot(0).unwrap().merge.button_label(), "Merging...");
		let outcome = merger
			.complete(&mut store, &ticket, response(vec![wire("m1", "a", "c", 5.0)], Some(metric(0.9))))
			.unwrap();
		assert_eq!(outcome.added, vec!["m1"]);
		assert_eq!(store.slot(0).unwrap().metric.as_ref().unwrap().acc, Some(0.9));
		assert_eq!(store.slot(0).unwrap().merge.button_label(), "Restore Merge");

		assert!(merger.restore(&mut store, 0).unwrap());
		assert_eq!(snapshot(&store, 0), before);
		assert_eq!(store.slot(0).unwrap().merge, MergeState::Unmerged);
	}

	#[test]
	fn merged_edge_is_highlighted_until_background_click() {
		let (mut store, _) = store();
		let merger = MergeController::default();
		let ticket = merger.begin(&mut store, 0, Some(&source())).unwrap();
		merger
			.complete(&mut store, &ticket, response(vec![wire("m1", "a", "c", 5.0)], None))
			.unwrap();

		let target = store.slot(0).unwrap();
		assert_eq!(target.edges.len(), 3);
		let m1 = target.edges.get("m1").unwrap();
		assert_eq!(m1.color, MERGED_EDGE_COLOR);
		assert!(m1.is_new_merged_edge);
		// missing metric keeps the old one
		assert_eq!(target.metric.as_ref().unwrap().acc, Some(0.4));

		assert!(ClickEvent::new(0, Vec::new(), Vec::new()).is_background());
		assert!(merger.clear_highlight(&mut store, 0).unwrap());
		let m1 = store.slot(0).unwrap().edges.get("m1").unwrap();
		assert_eq!(m1.color, EDGE_COLOR);
		assert!(!m1.is_new_merged_edge);
		assert_eq!(store.slot(0).unwrap().edges.len(), 3);
		assert!(!merger.clear_highlight(&mut store, 0).unwrap());
		assert!(store.slot(0).unwrap().merge.is_merged());
	}

	#[test]
	fn restore_without_merge_is_a_no_op() {
		let (mut store, log) = store();
		let merger = MergeController::default();
		let before = snapshot(&store, 0);
		log.0.borrow_mut().clear();
		assert!(!merger.restore(&mut store, 0).unwrap());
		assert_eq!(snapshot(&store, 0), before);
		assert!(log.0.borrow().is_empty());
	}

	#[test]
	fn begin_rejects_bad_states() {
		let (mut store, _) = store();
		let merger = MergeController::default();
		assert_eq!(merger.begin(&mut store, 0, None).unwrap_err(), MergeError::NoSourceData);

		let ticket = merger.begin(&mut store, 0, Some(&source())).unwrap();
		assert_eq!(merger.begin(&mut store, 0, Some(&source())).unwrap_err(), MergeError::InFlight);
		assert_eq!(merger.restore(&mut store, 0).unwrap_err(), MergeError::InFlight);
		merger.complete(&mut store, &ticket, response(Vec::new(), None)).unwrap();
		assert_eq!(
			merger.begin(&mut store, 0, Some(&source())).unwrap_err(),
			MergeError::AlreadyMerged
		);
		// other slots are unaffected
		assert!(merger.begin(&mut store, 1, Some(&source())).is_ok());
	}

	#[test]
	fn malformed_response_leaves_slot_untouched() {
		let (mut store, _) = store();
		let merger = MergeController::default();
		let before = snapshot(&store, 0);
		for edges in [
			vec![wire("e1", "a", "c", 1.0)],
			vec![wire("m1", "a", "zz", 1.0)],
			vec![wire("m1", "a", "c", 1.0), wire("m1", "b", "a", 1.0)],
		] {
			let ticket = merger.begin(&mut store, 0, Some(&source())).unwrap();
			let err = merger.complete(&mut store, &ticket, response(edges, Some(metric(0.1)))).unwrap_err();
			assert!(matches!(err, MergeError::Service(ServiceError::Malformed(_))));
			assert_eq!(store.slot(0).unwrap().merge, MergeState::Unmerged);
			assert_eq!(snapshot(&store, 0), before);
		}
	}

	#[test]
	fn failed_request_returns_to_unmerged() {
		let (mut store, _) = store();
		let merger = MergeController::default();
		let ticket = merger.begin(&mut store, 0, Some(&source())).unwrap();
		merger.abort(&mut store, &ticket);
		assert_eq!(store.slot(0).unwrap().merge.button_label(), "Merge Edge");
	}

	#[test]
	fn response_for_replaced_batch_is_stale() {
		let (mut store, log) = store();
		let merger = MergeController::default();
		let ticket = merger.begin(&mut store, 0, Some(&source())).unwrap();
		store.replace_batch(|| vec![slot(0, &["a", "c"], Vec::new(), &log)]);
		let err = merger
			.complete(&mut store, &ticket, response(vec![wire("m1", "a", "c", 5.0)], None))
			.unwrap_err();
		assert_eq!(err, MergeError::Stale);
		assert!(store.slot(0).unwrap().edges.is_empty());
	}

	#[test]
	fn restore_after_edit_recomputes_widths() {
		let (mut store, _) = store();
		let merger = MergeController::default();
		let editor = EdgeEditor::default();
		let ticket = merger.begin(&mut store, 0, Some(&source())).unwrap();
		merger
			.complete(&mut store, &ticket, response(vec![wire("m1", "a", "c", 5.0)], None))
			.unwrap();
		editor.update_edge(&mut store, 0, "e1", "8").unwrap();

		assert!(merger.restore(&mut store, 0).unwrap());
		let target = store.slot(0).unwrap();
		assert!(target.edges.get("m1").is_none());
		// e1 and e2 now share weight 8
		assert!(target.edges.iter().all(|e| e.width == 5.0));
	}
}
