use log::debug;

use super::store::{GraphStore, Slot};
use super::types::{EvaluationMetric, GraphPayload, GraphRequest, SourceData};

/// Request body describing `slot` as it is right now.
pub fn graph_request(slot: &Slot, source: &SourceData) -> GraphRequest {
	GraphRequest {
		data: source.data.clone(),
		label: source.label.clone(),
		graph: GraphPayload {
			map_name: slot.map_name.clone(),
			nodes: slot.nodes.iter().map(Into::into).collect(),
			edges: slot.edges.iter().map(Into::into).collect(),
		},
	}
}

/// A revalidation issued for one slot. The slot index is fixed when the
/// ticket is cut, not read from the active slot when the answer arrives.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationTicket {
	/// Slot the request was cut for.
	pub slot: usize,
	/// Batch generation at the time.
	pub generation: u64,
	/// Body sent to the revalidate endpoint.
	pub request: GraphRequest,
}

/// Cuts a ticket, or `None` when there is no source data to score against.
pub fn prepare(store: &GraphStore, slot: usize, source: Option<&SourceData>) -> Option<ValidationTicket> {
	let Some(source) = source.filter(|s| !s.is_empty()) else {
		debug!("slot {slot}: no source data, skipping validation");
		return None;
	};
	let target = store.slot(slot).ok()?;
	Some(ValidationTicket {
		slot,
		generation: store.generation(),
		request: graph_request(target, source),
	})
}

/// Replaces the slot's scores wholesale. Returns `false` when the ticket
/// belongs to a batch that has since been replaced.
pub fn apply(store: &mut GraphStore, ticket: &ValidationTicket, metric: EvaluationMetric) -> bool {
	if store.generation() != ticket.generation {
		debug!("slot {}: dropping validation for an old batch", ticket.slot);
		return false;
	}
	let Ok(target) = store.slot_mut(ticket.slot) else {
		return false;
	};
	target.unconnected = metric.unconnected_forms.clone().unwrap_or_default();
	target.metric = Some(metric);
	true
}
