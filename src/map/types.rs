use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dataset::Keyed;

/// Resting palette for edges.
pub const EDGE_COLOR: EdgeColor = EdgeColor {
	color: "#FFCCE5",
	highlight: "#FF69B4",
	hover: "#FF69B4",
};

/// Palette for edges freshly inserted by a merge.
pub const MERGED_EDGE_COLOR: EdgeColor = EdgeColor {
	color: "#90EE90",
	highlight: "#90EE90",
	hover: "#90EE90",
};

/// Override applied to nodes picked by the form filter.
pub const FORM_HIGHLIGHT: NodeColor = NodeColor {
	background: "#ffeb3b",
	border: "#fbc02d",
};

/// Edge palette: resting, selected and hovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeColor {
	/// Colour for the resting state.
	pub color: &'static str,
	/// Colour when selected.
	pub highlight: &'static str,
	/// Colour under the cursor.
	pub hover: &'static str,
}

/// Node colour override.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeColor {
	/// Fill colour.
	pub background: &'static str,
	/// Outline colour.
	pub border: &'static str,
}

/// A word sense in a semantic map.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	/// Node id, unique within its map.
	pub id: String,
	/// Text drawn on the node.
	pub label: String,
	/// Tooltip text.
	pub title: Option<String>,
	/// Set by the form filter; `None` uses the default palette.
	pub color: Option<NodeColor>,
}

/// Undirected weighted link between two nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
	/// Edge id, unique within its map.
	pub id: String,
	/// One endpoint.
	pub from: String,
	/// The other endpoint.
	pub to: String,
	/// Text shown on the edge, usually its weight.
	pub label: String,
	/// Weight parsed from the label.
	pub value: f64,
	/// Drawn thickness.
	pub width: f64,
	/// Current palette.
	pub color: EdgeColor,
	/// Set only while a merge highlight is showing.
	pub is_new_merged_edge: bool,
}

impl Keyed for Node {
	fn key(&self) -> &str {
		&self.id
	}
}

impl Keyed for Edge {
	fn key(&self) -> &str {
		&self.id
	}
}

impl Edge {
	/// True when the edge joins `a` and `b` in either direction.
	pub fn connects(&self, a: &str, b: &str) -> bool {
		(self.from == a && self.to == b) || (self.from == b && self.to == a)
	}
}

/// Partial edge update, applied by id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgePatch {
	/// Edge to patch.
	pub id: String,
	/// New label.
	pub label: Option<String>,
	/// New weight.
	pub value: Option<f64>,
	/// New width.
	pub width: Option<f64>,
	/// New palette.
	pub color: Option<EdgeColor>,
	/// New value for the merge-highlight flag.
	pub is_new_merged_edge: Option<bool>,
}

impl EdgePatch {
	/// Patch that changes nothing yet.
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			..Self::default()
		}
	}

	/// Sets the width.
	pub fn width(mut self, width: f64) -> Self {
		self.width = Some(width);
		self
	}

	/// Sets the palette.
	pub fn color(mut self, color: EdgeColor) -> Self {
		self.color = Some(color);
		self
	}

	/// Sets the merge-highlight flag.
	pub fn merged_flag(mut self, flag: bool) -> Self {
		self.is_new_merged_edge = Some(flag);
		self
	}

	/// Sets both the label and the weight read from it.
	pub fn weight(mut self, label: impl Into<String>, value: f64) -> Self {
		self.label = Some(label.into());
		self.value = Some(value);
		self
	}

	pub(crate) fn apply(self, edge: &mut Edge) {
		if let Some(label) = self.label {
			edge.label = label;
		}
		if let Some(value) = self.value {
			edge.value = value;
		}
		if let Some(width) = self.width {
			edge.width = width;
		}
		if let Some(color) = self.color {
			edge.color = color;
		}
		if let Some(flag) = self.is_new_merged_edge {
			edge.is_new_merged_edge = flag;
		}
	}
}

/// A form the map leaves without any edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnconnectedForm {
	/// Language code.
	#[serde(default)]
	pub language: String,
	/// Surface form.
	#[serde(default)]
	pub form: String,
}

/// Quality scores for one slot as computed by the graph service.
///
/// Fields the client does not know about are carried through untouched so a
/// backed-up metric restores exactly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetric {
	/// Accuracy.
	#[serde(default)]
	pub acc: Option<f64>,
	/// Precision.
	#[serde(default)]
	pub prec: Option<f64>,
	/// Recall.
	#[serde(default)]
	pub recall: Option<f64>,
	/// F1 score.
	#[serde(default, rename = "F1")]
	pub f1: Option<f64>,
	/// Productivity score.
	#[serde(default)]
	pub productivity: Option<f64>,
	/// Coverage score.
	#[serde(default)]
	pub coverage: Option<f64>,
	/// Sum of edge weights.
	#[serde(default)]
	pub weight_sum: Option<f64>,
	/// Mean node degree.
	#[serde(default)]
	pub deg_mean: Option<f64>,
	/// Standard deviation of node degree.
	#[serde(default)]
	pub deg_std: Option<f64>,
	/// Number of edges.
	#[serde(default)]
	pub num_edges: Option<f64>,
	/// Forms left without an edge.
	#[serde(default)]
	pub unconnected_forms: Option<Vec<UnconnectedForm>>,
	/// Any other keys the service sent.
	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
}

impl EvaluationMetric {
	/// Panel rows in display order: `(key, formatted value)`.
	pub fn display_rows(metric: Option<&Self>) -> Vec<(&'static str, String)> {
		let value = |f: fn(&Self) -> Option<f64>| match metric.and_then(f) {
			Some(v) => format!("{v:.3}"),
			None => "N/A".to_string(),
		};
		vec![
			("acc", value(|m| m.acc)),
			("prec", value(|m| m.prec)),
			("recall", value(|m| m.recall)),
			("F1", value(|m| m.f1)),
			("productivity", value(|m| m.productivity)),
			("coverage", value(|m| m.coverage)),
			("weight_sum", value(|m| m.weight_sum)),
			("deg_mean", value(|m| m.deg_mean)),
			("deg_std", value(|m| m.deg_std)),
		]
	}
}

/// The two sheets of the uploaded workbook, forwarded to the service as-is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
	/// Rows of the data sheet.
	#[serde(default)]
	pub data: Vec<Value>,
	/// Rows of the label sheet.
	#[serde(default)]
	pub label: Vec<Value>,
}

impl SourceData {
	/// No data rows.
	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}
}

/// A form and the nodes that realise it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormWithNodes {
	/// Language code.
	#[serde(default)]
	pub language: String,
	/// Surface form.
	#[serde(default)]
	pub form: String,
	/// Node ids carrying the form.
	#[serde(default)]
	pub nodes: Vec<String>,
}

/// Node as the service sends it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireNode {
	/// Unique id.
	pub id: String,
	/// Display text.
	#[serde(default)]
	pub label: String,
	/// Hover text.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
}

/// Edge as the service sends it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireEdge {
	/// Unique id.
	pub id: String,
	/// One endpoint.
	pub from: String,
	/// The other endpoint.
	pub to: String,
	/// Display text; the weight when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
	/// Weight; parsed from the label when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<f64>,
	/// Suggested width; never sent back.
	#[serde(default, skip_serializing)]
	pub width: Option<f64>,
}

impl From<WireNode> for Node {
	fn from(node: WireNode) -> Self {
		Self {
			id: node.id,
			label: node.label,
			title: node.title,
			color: None,
		}
	}
}

impl From<&Node> for WireNode {
	fn from(node: &Node) -> Self {
		Self {
			id: node.id.clone(),
			title: Some(node.title.clone().unwrap_or_else(|| node.label.clone())),
			label: node.label.clone(),
		}
	}
}

impl From<&Edge> for WireEdge {
	fn from(edge: &Edge) -> Self {
		Self {
			id: edge.id.clone(),
			from: edge.from.clone(),
			to: edge.to.clone(),
			label: Some(edge.label.clone()),
			value: Some(edge.value),
			width: None,
		}
	}
}

/// One candidate map as delivered by the initial processing call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
	/// Display name; defaults to "Map N".
	#[serde(default)]
	pub map_name: Option<String>,
	/// Nodes of the map.
	#[serde(default)]
	pub nodes: Vec<WireNode>,
	/// Edges of the map.
	#[serde(default)]
	pub edges: Vec<WireEdge>,
	/// Scores for the initial map.
	#[serde(default)]
	pub evaluation_metric: Option<EvaluationMetric>,
}

/// Reply to the workbook upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcessResponse {
	/// One entry per candidate map.
	pub graph_data: Vec<GraphData>,
	/// Forms for the form filter.
	pub forms_with_nodes: Vec<FormWithNodes>,
}

/// Older services answered with a bare list or a single map.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProcessPayload {
	Batch {
		graph_data: Vec<GraphData>,
		#[serde(default)]
		forms_with_nodes: Vec<FormWithNodes>,
	},
	List(Vec<GraphData>),
	Single(GraphData),
}

impl<'de> Deserialize<'de> for ProcessResponse {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		Ok(match ProcessPayload::deserialize(deserializer)? {
			ProcessPayload::Batch {
				graph_data,
				forms_with_nodes,
			} => Self {
				graph_data,
				forms_with_nodes,
			},
			ProcessPayload::List(graph_data) => Self {
				graph_data,
				forms_with_nodes: Vec::new(),
			},
			ProcessPayload::Single(graph) => Self {
				graph_data: vec![graph],
				forms_with_nodes: Vec::new(),
			},
		})
	}
}

/// Edges and scores of a merged map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergedGraph {
	/// Every edge the map now has, old and new.
	pub edges: Vec<WireEdge>,
	/// Scores after the merge.
	#[serde(default)]
	pub evaluation_metric: Option<EvaluationMetric>,
}

/// Reply to a merge request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeResponse {
	/// Map after the merge.
	pub graph_data: MergedGraph,
	/// Refreshed form list.
	#[serde(default)]
	pub forms_with_nodes: Option<Vec<FormWithNodes>>,
}

/// Snapshot of one slot sent to the service.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GraphPayload {
	/// Title shown in the map tabs.
	pub map_name: String,
	/// Nodes of the map.
	pub nodes: Vec<WireNode>,
	/// Edges of the map.
	pub edges: Vec<WireEdge>,
}

/// Body shared by the revalidate and merge calls.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GraphRequest {
	/// Rows of the data sheet.
	pub data: Vec<Value>,
	/// Rows of the label sheet.
	pub label: Vec<Value>,
	/// The slot being scored.
	pub graph: GraphPayload,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn metric_keeps_unknown_fields() {
		let raw = r#"{"acc":0.5,"F1":0.25,"unconnected_forms":[{"language":"en","form":"eat"}],"cycles":3}"#;
		let metric: EvaluationMetric = serde_json::from_str(raw).unwrap();
		assert_eq!(metric.f1, Some(0.25));
		assert_eq!(metric.extra.get("cycles"), Some(&Value::from(3)));
		let back: EvaluationMetric =
			serde_json::from_str(&serde_json::to_string(&metric).unwrap()).unwrap();
		assert_eq!(back, metric);
	}

	#[test]
	fn display_rows_format_three_decimals() {
		let metric = EvaluationMetric {
			acc: Some(0.5),
			..Default::default()
		};
		let rows = EvaluationMetric::display_rows(Some(&metric));
		assert_eq!(rows[0], ("acc", "0.500".to_string()));
		assert_eq!(rows[1], ("prec", "N/A".to_string()));
		assert!(
			EvaluationMetric::display_rows(None)
				.iter()
				.all(|(_, v)| v == "N/A")
		);
	}

	#[test]
	fn process_response_accepts_legacy_shapes() {
		let batch: ProcessResponse = serde_json::from_str(
			r#"{"graph_data":[{"map_name":"A","nodes":[],"edges":[]}],"forms_with_nodes":[{"language":"en","form":"x","nodes":["0"]}]}"#,
		)
		.unwrap();
		assert_eq!(batch.graph_data.len(), 1);
		assert_eq!(batch.forms_with_nodes.len(), 1);

		let list: ProcessResponse =
			serde_json::from_str(r#"[{"map_name":"A"},{"map_name":"B"}]"#).unwrap();
		assert_eq!(list.graph_data.len(), 2);
		assert!(list.forms_with_nodes.is_empty());

		let single: ProcessResponse =
			serde_json::from_str(r#"{"map_name":"A","nodes":[{"id":"0","label":"x"}]}"#).unwrap();
		assert_eq!(single.graph_data.len(), 1);
		assert_eq!(single.graph_data[0].nodes[0].id, "0");
	}

	#[test]
	fn merge_response_requires_edge_list() {
		assert!(serde_json::from_str::<MergeResponse>(r#"{"graph_data":{}}"#).is_err());
		let ok: MergeResponse = serde_json::from_str(
			r#"{"graph_data":{"edges":[{"id":"m1","from":"A","to":"B","label":"3","value":3.0}]}}"#,
		)
		.unwrap();
		assert_eq!(ok.graph_data.edges[0].value, Some(3.0));
	}
}
