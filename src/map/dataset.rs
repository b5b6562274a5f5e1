use std::collections::{HashMap, HashSet};

use super::error::StoreError;

/// Items stored in a [`DataSet`] are addressed by a string id.
pub trait Keyed {
	/// Unique id of this item.
	fn key(&self) -> &str;
}

/// Insertion-ordered collection keyed by id.
///
/// Batch operations are all-or-nothing: a rejected batch leaves the set as it
/// was.
#[derive(Clone, Debug, PartialEq)]
pub struct DataSet<T> {
	items: Vec<T>,
	index: HashMap<String, usize>,
}

impl<T> Default for DataSet<T> {
	fn default() -> Self {
		Self {
			items: Vec::new(),
			index: HashMap::new(),
		}
	}
}

impl<T: Keyed> DataSet<T> {
	/// An empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a set, failing on the first duplicate id.
	pub fn from_items(items: impl IntoIterator<Item = T>) -> Result<Self, StoreError> {
		let mut set = Self::new();
		set.add(items)?;
		Ok(set)
	}

	/// Appends `items`. Rejects the whole batch if any id is already present
	/// or repeated.
	pub fn add(&mut self, items: impl IntoIterator<Item = T>) -> Result<(), StoreError> {
		let items: Vec<T> = items.into_iter().collect();
		let mut seen = HashSet::new();
		for item in &items {
			let key = item.key();
			if self.index.contains_key(key) || !seen.insert(key) {
				return Err(StoreError::DuplicateId(key.to_string()));
			}
		}
		for item in items {
			self.index.insert(item.key().to_string(), self.items.len());
			self.items.push(item);
		}
		Ok(())
	}

	/// Applies `f` to every listed item. Unknown ids reject the whole batch.
	pub fn update<P>(
		&mut self,
		patches: impl IntoIterator<Item = (String, P)>,
		mut f: impl FnMut(&mut T, P),
	) -> Result<(), StoreError> {
		let patches: Vec<(String, P)> = patches.into_iter().collect();
		if let Some((id, _)) = patches.iter().find(|(id, _)| !self.index.contains_key(id)) {
			return Err(StoreError::UnknownId(id.clone()));
		}
		for (id, patch) in patches {
			let pos = self.index[&id];
			f(&mut self.items[pos], patch);
		}
		Ok(())
	}

	/// Removes the listed ids, returning what was actually removed.
	pub fn remove<S: AsRef<str>>(&mut self, ids: &[S]) -> Vec<T> {
		let doomed: HashSet<&str> = ids
			.iter()
			.map(|id| id.as_ref())
			.filter(|id| self.index.contains_key(*id))
			.collect();
		if doomed.is_empty() {
			return Vec::new();
		}
		let (removed, kept): (Vec<T>, Vec<T>) = std::mem::take(&mut self.items)
			.into_iter()
			.partition(|item| doomed.contains(item.key()));
		self.items = kept;
		self.reindex();
		removed
	}

	/// Item with id `id`.
	pub fn get(&self, id: &str) -> Option<&T> {
		self.index.get(id).map(|&pos| &self.items[pos])
	}

	/// True when `id` is present.
	pub fn contains(&self, id: &str) -> bool {
		self.index.contains_key(id)
	}

	/// Items in insertion order.
	pub fn iter(&self) -> std::slice::Iter<'_, T> {
		self.items.iter()
	}

	/// Mutable iteration in insertion order.
	pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
		self.items.iter_mut()
	}

	/// Ids in insertion order.
	pub fn ids(&self) -> Vec<String> {
		self.items.iter().map(|i| i.key().to_string()).collect()
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// True when there are none.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	fn reindex(&mut self) {
		self.index = self
			.items
			.iter()
			.enumerate()
			.map(|(pos, item)| (item.key().to_string(), pos))
			.collect();
	}
}

impl<'a, T> IntoIterator for &'a DataSet<T> {
	type Item = &'a T;
	type IntoIter = std::slice::Iter<'a, T>;

	fn into_iter(self) -> Self::IntoIter {
		self.items.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Clone, Debug, PartialEq)]
	struct Item(&'static str, u32);

	impl Keyed for Item {
		fn key(&self) -> &str {
			self.0
		}
	}

	#[test]
	fn add_rejects_duplicates_atomically() {
		let mut set = DataSet::from_items([Item("a", 1)]).unwrap();
		let err = set.add([Item("b", 2), Item("a", 3)]).unwrap_err();
		assert_eq!(err, StoreError::DuplicateId("a".into()));
		assert_eq!(set.len(), 1);

		let err = set.add([Item("c", 2), Item("c", 3)]).unwrap_err();
		assert_eq!(err, StoreError::DuplicateId("c".into()));
		assert!(!set.contains("c"));
	}

	#[test]
	fn update_unknown_id_applies_nothing() {
		let mut set = DataSet::from_items([Item("a", 1), Item("b", 2)]).unwrap();
		let err = set
			.update([("a".to_string(), 10), ("zz".to_string(), 20)], |item, v| item.1 = v)
			.unwrap_err();
		assert_eq!(err, StoreError::UnknownId("zz".into()));
		assert_eq!(set.get("a"), Some(&Item("a", 1)));
	}

	#[test]
	fn remove_keeps_order_and_index() {
		let mut set = DataSet::from_items([Item("a", 1), Item("b", 2), Item("c", 3)]).unwrap();
		let removed = set.remove(&["b", "missing"]);
		assert_eq!(removed, vec![Item("b", 2)]);
		assert_eq!(set.ids(), vec!["a", "c"]);
		assert_eq!(set.get("c"), Some(&Item("c", 3)));
		assert!(set.remove::<&str>(&[]).is_empty());
	}
}
