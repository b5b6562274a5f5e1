//! Browser-independent editing core for semantic maps.

pub(crate) mod bridge;
pub(crate) mod coordinator;
pub(crate) mod dataset;
pub(crate) mod editor;
pub(crate) mod error;
pub(crate) mod forms;
pub(crate) mod merge;
pub(crate) mod service;
pub(crate) mod session;
pub(crate) mod store;
pub(crate) mod types;
pub(crate) mod validation;

pub use bridge::{ClickEvent, EngineFactory, EngineOptions, FitOptions, RenderEngine};
pub use dataset::{DataSet, Keyed};
pub use editor::{WidthScale, update_edge_widths};
pub use error::{EditError, MergeError, ServiceError, StoreError};
pub use merge::MergeState;
pub use service::GraphService;
pub use session::{Controller, Session, Spawner};
pub use store::{GraphStore, Slot};
pub use types::{
	EDGE_COLOR, Edge, EvaluationMetric, FormWithNodes, GraphData, GraphRequest, MERGED_EDGE_COLOR, MergeResponse,
	MergedGraph, Node, ProcessResponse, SourceData, UnconnectedForm, WireEdge, WireNode,
};
