use log::debug;

use super::store::GraphStore;
use super::types::{FORM_HIGHLIGHT, FormWithNodes};

/// "Show me where this form lives": recolours a form's nodes in every slot.
#[derive(Clone, Debug, Default)]
pub struct FormFilter {
	forms: Vec<FormWithNodes>,
	selected: Option<usize>,
	highlighted: Vec<String>,
}

impl FormFilter {
	/// Filter with no forms.
	pub fn new() -> Self {
		Self::default()
	}

	/// Index of the highlighted form, if any.
	pub fn selected(&self) -> Option<usize> {
		self.selected
	}

	/// Dropdown entries, `form (language)`, in form-index order.
	pub fn labels(&self) -> Vec<String> {
		self.forms
			.iter()
			.map(|f| format!("{} ({})", f.form, f.language))
			.collect()
	}

	/// New form list; any highlight is cleared first.
	pub fn set_forms(&mut self, store: &mut GraphStore, forms: Vec<FormWithNodes>) {
		self.clear(store);
		self.forms = forms;
	}

	/// Forgets the highlight without touching the store, for when the slots
	/// it referred to are gone.
	pub fn reset(&mut self, forms: Vec<FormWithNodes>) {
		self.forms = forms;
		self.selected = None;
		self.highlighted.clear();
	}

	/// Highlights form `index`, or nothing for `None` ("All Forms").
	pub fn select(&mut self, store: &mut GraphStore, index: Option<usize>) {
		self.clear(store);
		let Some(form) = index.and_then(|i| self.forms.get(i)) else {
			return;
		};
		self.selected = index;
		for slot in store.slots_mut() {
			let mut touched = false;
			for node in slot.nodes.iter_mut() {
				if form.nodes.contains(&node.id) {
					node.color = Some(FORM_HIGHLIGHT);
					touched = true;
				}
			}
			if touched {
				slot.redraw();
			}
		}
		self.highlighted = form.nodes.clone();
		debug!("highlighted {} nodes for form {:?}", self.highlighted.len(), index);
	}

	fn clear(&mut self, store: &mut GraphStore) {
		self.selected = None;
		if self.highlighted.is_empty() {
			return;
		}
		for slot in store.slots_mut() {
			let mut touched = false;
			for node in slot.nodes.iter_mut() {
				if node.color.is_some() && self.highlighted.contains(&node.id) {
					node.color = None;
					touched = true;
				}
			}
			if touched {
				slot.redraw();
			}
		}
		self.highlighted.clear();
	}
}
