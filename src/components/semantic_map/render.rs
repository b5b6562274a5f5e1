use std::f64::consts::PI;

use web_sys::CanvasRenderingContext2d;

use super::state::{EdgeInfo, LOOP_RADIUS, MapCanvasState, NODE_RADIUS, loop_centre};

const BACKGROUND: &str = "#ffffff";
const LABEL_COLOR: &str = "#343434";
/// Bend of smooth edges, as a fraction of their length.
const CURVE_BEND: f64 = 0.12;

pub fn render(state: &MapCanvasState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_edges(state, ctx);
	draw_nodes(state, ctx);
	ctx.restore();
}

fn edge_stroke(state: &MapCanvasState, edge: &EdgeInfo) -> &'static str {
	if state.selected_edges.contains(&edge.id) {
		edge.color.highlight
	} else if state.hover.edge.as_deref() == Some(edge.id.as_str())
		|| state.hover.node.is_some_and(|n| n == edge.source || n == edge.target)
	{
		edge.color.hover
	} else {
		edge.color.color
	}
}

fn draw_edges(state: &MapCanvasState, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	let positions = state.positions();
	ctx.set_font(&format!("{}px sans-serif", 11.0 / k.max(0.5)));
	ctx.set_text_align("center");

	for edge in &state.edges {
		let (Some(&(x1, y1)), Some(&(x2, y2))) =
			(positions.get(&edge.source), positions.get(&edge.target))
		else {
			continue;
		};
		ctx.set_stroke_style_str(edge_stroke(state, edge));
		ctx.set_line_width(edge.width.max(1.0 / k));
		ctx.begin_path();

		let (dx, dy) = (x2 - x1, y2 - y1);
		let dist = (dx * dx + dy * dy).sqrt();
		let (mx, my) = if edge.source == edge.target || dist < 0.001 {
			let (cx, cy) = loop_centre(x1, y1);
			let _ = ctx.arc(cx, cy, LOOP_RADIUS, 0.0, 2.0 * PI);
			(cx, cy - LOOP_RADIUS)
		} else if state.smooth_edges {
			ctx.move_to(x1, y1);
			let (nx, ny) = (-dy / dist, dx / dist);
			let (cx, cy) = (
				(x1 + x2) / 2.0 + nx * dist * CURVE_BEND,
				(y1 + y2) / 2.0 + ny * dist * CURVE_BEND,
			);
			ctx.quadratic_curve_to(cx, cy, x2, y2);
			// midpoint of the quadratic
			((x1 + 2.0 * cx + x2) / 4.0, (y1 + 2.0 * cy + y2) / 4.0)
		} else {
			ctx.move_to(x1, y1);
			ctx.line_to(x2, y2);
			((x1 + x2) / 2.0, (y1 + y2) / 2.0)
		};
		ctx.stroke();

		if !edge.label.is_empty() {
			ctx.set_fill_style_str(LABEL_COLOR);
			let _ = ctx.fill_text(&edge.label, mx, my - 4.0 / k);
		}
	}
}

fn draw_nodes(state: &MapCanvasState, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	ctx.set_font(&format!("{}px sans-serif", 12.0 / k.max(0.5)));
	ctx.set_text_align("center");

	state.graph.visit_nodes(|node| {
		let idx = node.index();
		let (x, y) = (node.x() as f64, node.y() as f64);
		let info = &node.data.user_data;
		let selected = state.selected_nodes.contains(&idx);
		let emphasised = selected || state.hover.node == Some(idx) || state.hover.neighbors.contains(&idx);

		ctx.begin_path();
		let _ = ctx.arc(x, y, NODE_RADIUS, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(info.color.background);
		ctx.fill();
		ctx.set_stroke_style_str(info.color.border);
		ctx.set_line_width(if emphasised { 3.0 / k } else { 1.5 / k });
		ctx.stroke();

		if !info.label.is_empty() {
			ctx.set_fill_style_str(LABEL_COLOR);
			let _ = ctx.fill_text(&info.label, x, y + NODE_RADIUS + 12.0 / k.max(0.5));
		}
	});
}
