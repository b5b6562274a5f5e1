use log::debug;
use serde::Deserialize;
use web_time::{SystemTime, UNIX_EPOCH};

use super::dataset::DataSet;
use super::error::EditError;
use super::store::{GraphStore, Slot};
use super::types::{EDGE_COLOR, Edge, EdgePatch};

/// Weight used when an edge label does not start with a number.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Visual thickness range edges are mapped onto.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WidthScale {
	/// Width of the lightest edge.
	pub min: f64,
	/// Width of the heaviest edge.
	pub max: f64,
	/// Width for every edge when all weights are equal.
	pub uniform: f64,
}

impl Default for WidthScale {
	fn default() -> Self {
		Self {
			min: 1.0,
			max: 10.0,
			uniform: 5.0,
		}
	}
}

impl WidthScale {
	/// Width for a server-supplied edge before the first relative rescale.
	pub fn initial(&self, value: f64) -> f64 {
		(value * 2.0).clamp(self.min, self.max)
	}
}

/// Reads a weight from free text the way a lenient float parser does: the
/// longest numeric prefix wins, and anything unusable becomes 1.
pub fn parse_weight(text: &str) -> f64 {
	let text = text.trim_start();
	text[..numeric_prefix_len(text)]
		.parse::<f64>()
		.ok()
		.filter(|v| v.is_finite())
		.unwrap_or(DEFAULT_WEIGHT)
}

fn numeric_prefix_len(text: &str) -> usize {
	let bytes = text.as_bytes();
	let digits_from = |mut i: usize| {
		while i < bytes.len() && bytes[i].is_ascii_digit() {
			i += 1;
		}
		i
	};

	let mut end = 0;
	if matches!(bytes.first(), Some(b'+' | b'-')) {
		end = 1;
	}
	let int_end = digits_from(end);
	let mut mantissa_end = int_end;
	if bytes.get(int_end) == Some(&b'.') {
		mantissa_end = digits_from(int_end + 1);
	}
	// a lone sign or dot is not a number
	if mantissa_end - end <= usize::from(bytes.get(int_end) == Some(&b'.')) {
		return 0;
	}
	if matches!(bytes.get(mantissa_end), Some(b'e' | b'E')) {
		let mut exp = mantissa_end + 1;
		if matches!(bytes.get(exp), Some(b'+' | b'-')) {
			exp += 1;
		}
		let exp_end = digits_from(exp);
		if exp_end > exp {
			return exp_end;
		}
	}
	mantissa_end
}

/// Rescales every edge width in the set relative to the set's weight range.
pub fn update_edge_widths(edges: &mut DataSet<Edge>, scale: &WidthScale) {
	if edges.is_empty() {
		return;
	}
	let (vmin, vmax) = edges.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| {
		(lo.min(e.value), hi.max(e.value))
	});
	for edge in edges.iter_mut() {
		edge.width = if vmin == vmax {
			scale.uniform
		} else {
			scale.min + (edge.value - vmin) / (vmax - vmin) * (scale.max - scale.min)
		};
	}
}

/// `e<unix-millis>`, suffixed when that id is already taken in the slot.
pub fn fresh_edge_id(edges: &DataSet<Edge>, millis: u64) -> String {
	let base = format!("e{millis}");
	if !edges.contains(&base) {
		return base;
	}
	let mut n = 1;
	loop {
		let id = format!("{base}-{n}");
		if !edges.contains(&id) {
			return id;
		}
		n += 1;
	}
}

/// Milliseconds since the Unix epoch; the default id clock.
pub fn unix_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or_default()
}

/// Single-edge edits on one slot.
#[derive(Clone, Copy, Debug)]
pub struct EdgeEditor {
	scale: WidthScale,
	clock: fn() -> u64,
}

impl Default for EdgeEditor {
	fn default() -> Self {
		Self::new(WidthScale::default())
	}
}

impl EdgeEditor {
	/// Editor scaling widths onto `scale`.
	pub fn new(scale: WidthScale) -> Self {
		Self {
			scale,
			clock: unix_millis,
		}
	}

	/// Swaps the clock used to mint edge ids.
	pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
		self.clock = clock;
		self
	}

	/// Width scale in use.
	pub fn scale(&self) -> &WidthScale {
		&self.scale
	}

	/// Adds an undirected edge and returns its id.
	pub fn add_edge(
		&self,
		store: &mut GraphStore,
		slot: usize,
		from: &str,
		to: &str,
		label: &str,
	) -> Result<String, EditError> {
		ensure_editable(store, slot)?;
		let (nodes, edges) = store.get_all(slot)?;
		if nodes.len() < 2 {
			return Err(EditError::InsufficientNodes);
		}
		if let Some(missing) = [from, to].into_iter().find(|id| !nodes.contains(id)) {
			return Err(EditError::UnknownNode(missing.to_string()));
		}
		if edges.iter().any(|e| e.connects(from, to)) {
			return Err(EditError::DuplicateEdge {
				from: from.to_string(),
				to: to.to_string(),
			});
		}

		let id = fresh_edge_id(edges, (self.clock)());
		store.add(
			slot,
			[Edge {
				id: id.clone(),
				from: from.to_string(),
				to: to.to_string(),
				label: label.to_string(),
				value: parse_weight(label),
				width: self.scale.uniform,
				color: EDGE_COLOR,
				is_new_merged_edge: false,
			}],
		)?;
		self.edited(store, slot, true)?;
		debug!("slot {slot}: added edge {id} {from} -- {to}");
		Ok(id)
	}

	/// Re-weights an edge, keeping its endpoints and resetting its colours.
	pub fn update_edge(
		&self,
		store: &mut GraphStore,
		slot: usize,
		id: &str,
		label: &str,
	) -> Result<(), EditError> {
		ensure_editable(store, slot)?;
		if store.get(slot, id)?.is_none() {
			return Err(EditError::NoSuchEdge(id.to_string()));
		}
		store.update(
			slot,
			[EdgePatch::new(id)
				.weight(label, parse_weight(label))
				.color(EDGE_COLOR)
				.merged_flag(false)],
		)?;
		self.edited(store, slot, true)?;
		debug!("slot {slot}: updated edge {id} to '{label}'");
		Ok(())
	}

	/// Removes the listed edges. Widths of the survivors are left alone.
	pub fn delete_edges<S: AsRef<str>>(
		&self,
		store: &mut GraphStore,
		slot: usize,
		ids: &[S],
	) -> Result<Vec<String>, EditError> {
		ensure_editable(store, slot)?;
		let removed: Vec<String> = store.remove(slot, ids)?.into_iter().map(|e| e.id).collect();
		if removed.is_empty() {
			store.slot_mut(slot)?.redraw();
		} else {
			self.edited(store, slot, false)?;
		}
		debug!("slot {slot}: deleted {} edges", removed.len());
		Ok(removed)
	}

	/// Marks the slot as edited since its merge and redraws it.
	fn edited(&self, store: &mut GraphStore, slot: usize, rescale: bool) -> Result<(), EditError> {
		let target = store.slot_mut(slot)?;
		target.merge.mark_edited();
		if rescale {
			self.rescale(target);
		} else {
			target.redraw();
		}
		Ok(())
	}

	pub(crate) fn rescale(&self, target: &mut Slot) {
		update_edge_widths(&mut target.edges, &self.scale);
		target.redraw();
	}
}

fn ensure_editable(store: &GraphStore, slot: usize) -> Result<(), EditError> {
	if store.slot(slot)?.merge.is_in_flight() {
		return Err(EditError::SlotBusy(slot));
	}
	Ok(())
}
