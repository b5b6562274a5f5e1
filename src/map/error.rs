//! Error types for the semantic-map core.
//!
//! Each concern gets its own enum so callers can tell a rejected edit (shown
//! to the user, nothing changed) from a failed backend call (logged or shown,
//! depending on the operation).

use thiserror::Error;

/// Misuse of the slot store or a [`DataSet`](super::DataSet).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
	/// Index past the end of the batch.
	#[error("graph slot {0} does not exist")]
	NoSuchSlot(usize),

	/// An id collided within the set or the batch.
	#[error("id '{0}' is already present")]
	DuplicateId(String),

	/// Update of an id the set does not hold.
	#[error("id '{0}' is not present")]
	UnknownId(String),
}

/// Rejected user edits. Nothing is mutated when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
	/// Nothing uploaded yet.
	#[error("No semantic map is loaded")]
	NoSlots,

	/// Index past the end of the batch.
	#[error("Semantic map {0} does not exist")]
	NoSuchSlot(usize),

	/// The slot has fewer than two nodes.
	#[error("At least two nodes are required to add an edge")]
	InsufficientNodes,

	/// An endpoint is not a node of the slot.
	#[error("Node '{0}' does not exist in this map")]
	UnknownNode(String),

	#[error("An edge already exists between '{from}' and '{to}'")]
	/// The two nodes are already joined, in either direction.
	DuplicateEdge {
		/// Requested first endpoint.
		from: String,
		/// Requested second endpoint.
		to: String,
	},

	/// Update needs exactly one selected edge.
	#[error("Please select exactly one edge")]
	SelectionRequired,

	/// No edge with that id.
	#[error("Edge '{0}' does not exist in this map")]
	NoSuchEdge(String),

	/// The slot is locked by an outstanding merge.
	#[error("Semantic map {0} is waiting for a merge to finish")]
	SlotBusy(usize),

	/// Any other store failure.
	#[error("Internal store error: {0}")]
	Store(StoreError),
}

impl From<StoreError> for EditError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NoSuchSlot(slot) => Self::NoSuchSlot(slot),
			other => Self::Store(other),
		}
	}
}

/// Failures talking to the graph service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
	/// The request never got an answer.
	#[error("Unable to connect to backend server: {0}")]
	Network(String),

	/// `message` is the server's own `error` text when it sent one.
	#[error("{message}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Text shown to the user.
		message: String,
	},

	/// The body could not be decoded or made no sense.
	#[error("Unexpected response from backend: {0}")]
	Malformed(String),
}

/// Why a merge or restore did not happen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
	/// No workbook to score against.
	#[error("Please upload a data file first")]
	NoSourceData,

	/// Merges do not stack.
	#[error("This map is already merged; restore it first")]
	AlreadyMerged,

	/// A request for this slot is still outstanding.
	#[error("A merge is already in progress for this map")]
	InFlight,

	/// The answer belongs to a batch that has since been replaced.
	#[error("The semantic maps were replaced while the merge was running")]
	Stale,

	/// The slot could not be edited.
	#[error(transparent)]
	Edit(#[from] EditError),

	/// The service call failed.
	#[error("Merge failed: {0}")]
	Service(#[from] ServiceError),
}

impl From<StoreError> for MergeError {
	fn from(err: StoreError) -> Self {
		Self::Edit(err.into())
	}
}
