use super::bridge::ClickEvent;
use super::error::EditError;

/// Nodes and edges picked by the most recent click.
///
/// Process-wide rather than per slot: only the active slot's engine raises
/// clicks, and the selection is reset whenever a new batch is loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
	/// Node ids.
	pub nodes: Vec<String>,
	/// Edge ids.
	pub edges: Vec<String>,
}

/// Tracks which slot is active.
#[derive(Clone, Debug, Default)]
pub struct SlotCoordinator {
	active: usize,
	len: usize,
	selection: Selection,
}

impl SlotCoordinator {
	/// Coordinator with no slots.
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts over for a batch of `len` slots, with slot 0 active.
	pub fn reset(&mut self, len: usize) {
		self.active = 0;
		self.len = len;
		self.selection = Selection::default();
	}

	/// Index of the active slot.
	pub fn active(&self) -> Result<usize, EditError> {
		if self.len == 0 {
			return Err(EditError::NoSlots);
		}
		Ok(self.active)
	}

	/// Slots in the current batch.
	pub fn len(&self) -> usize {
		self.len
	}

	/// True before any batch is loaded.
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Makes `slot` active. Returns `false` when it already was.
	pub fn select(&mut self, slot: usize) -> Result<bool, EditError> {
		if slot >= self.len {
			return Err(EditError::NoSuchSlot(slot));
		}
		if slot == self.active {
			return Ok(false);
		}
		self.active = slot;
		Ok(true)
	}

	/// Activates the following slot, wrapping to the first.
	pub fn next(&mut self) -> Result<usize, EditError> {
		let current = self.active()?;
		self.active = (current + 1) % self.len;
		Ok(self.active)
	}

	/// Activates the preceding slot, wrapping to the last.
	pub fn previous(&mut self) -> Result<usize, EditError> {
		let current = self.active()?;
		self.active = (current + self.len - 1) % self.len;
		Ok(self.active)
	}

	/// An engine reported a click: its slot becomes active and the click
	/// replaces the selection.
	pub fn on_click(&mut self, event: &ClickEvent) -> Result<(), EditError> {
		if event.slot >= self.len {
			return Err(EditError::NoSuchSlot(event.slot));
		}
		self.active = event.slot;
		self.selection = Selection {
			nodes: event.nodes.clone(),
			edges: event.edges.clone(),
		};
		Ok(())
	}

	/// Current click selection.
	pub fn selection(&self) -> &Selection {
		&self.selection
	}

	/// Forgets the picked edges, keeping the picked nodes.
	pub fn clear_edge_selection(&mut self) {
		self.selection.edges.clear();
	}
}
