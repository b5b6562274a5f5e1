use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent};

use super::engine::SharedView;
use super::render;
use crate::map::ClickEvent;

const FALLBACK_SIZE: (f64, f64) = (800.0, 600.0);

fn pointer(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

/// Canvas for slot `index`. Clicks are reported through `on_click` tagged
/// with the slot; everything else (drag, pan, zoom, hover) stays local.
#[component]
pub fn SemanticMapCanvas(index: usize, state: SharedView, on_click: Rc<dyn Fn(ClickEvent)>) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (view_init, animate_init) = (state.clone(), animate.clone());

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};
		let size = |client: i32, fallback: f64| if client > 0 { client as f64 } else { fallback };
		let (w, h) = canvas
			.parent_element()
			.map(|p| (size(p.client_width(), FALLBACK_SIZE.0), size(p.client_height(), FALLBACK_SIZE.1)))
			.unwrap_or(FALLBACK_SIZE);
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			log::error!("slot {index}: canvas has no 2d context");
			return;
		};
		view_init.borrow_mut().resize(w, h);

		let (view_anim, animate_inner) = (view_init.clone(), animate_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			{
				let mut s = view_anim.borrow_mut();
				if s.destroyed {
					return;
				}
				s.tick(0.016);
				render::render(&s, &ctx);
			}
			if let (Some(cb), Some(win)) = (&*animate_inner.borrow(), web_sys::window()) {
				let _ = win.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let view_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		if let Some((x, y)) = pointer(canvas_ref, &ev) {
			view_md.borrow_mut().press(x, y);
		}
	};

	let view_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		if let Some((x, y)) = pointer(canvas_ref, &ev) {
			view_mm.borrow_mut().pointer_moved(x, y);
		}
	};

	let view_mu = state.clone();
	let on_mouseup = move |ev: MouseEvent| {
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			view_mu.borrow_mut().cancel();
			return;
		};
		// bound first: the handler may redraw this canvas
		let picked = view_mu.borrow_mut().release(x, y);
		if let Some(picked) = picked {
			on_click(ClickEvent::new(index, picked.nodes, picked.edges));
		}
	};

	let view_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| view_ml.borrow_mut().cancel();

	let view_wh = state;
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		if let Some((x, y)) = pointer(canvas_ref, &ev) {
			view_wh.borrow_mut().zoom_at(x, y, ev.delta_y() < 0.0);
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="semantic-map-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			style="display: block; cursor: grab;"
		/>
	}
}
