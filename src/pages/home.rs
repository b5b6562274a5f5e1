use std::fmt::Display;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{error, warn};
use wasm_bindgen_futures::JsFuture;
use web_sys::{File, HtmlInputElement};

use crate::components::panels::{Carousel, FormFilterSelect, MetricsPanel, UnconnectedForms};
use crate::components::semantic_map::{CanvasEngineFactory, SemanticMapCanvas};
use crate::components::toolbar::{AddEdgeForm, Toolbar, UpdateEdgeForm};
use crate::components::view_state::ViewState;
use crate::config::AppConfig;
use crate::map::service::HttpGraphService;
use crate::map::{ClickEvent, Controller, Session, SourceData, Spawner};

fn alert(message: &str) {
	if let Some(window) = web_sys::window() {
		let _ = window.alert_with_message(message);
	}
}

fn confirm(message: &str) -> bool {
	web_sys::window()
		.and_then(|w| w.confirm_with_message(message).ok())
		.unwrap_or(false)
}

fn report<T, E: Display>(result: Result<T, E>) {
	if let Err(err) = result {
		alert(&err.to_string());
	}
}

/// Reads the uploaded JSON workbook (`{data, label}`).
async fn read_source(file: File) -> Result<SourceData, String> {
	let promise: js_sys::Promise = file.text();
	let text = JsFuture::from(promise)
		.await
		.map_err(|_| "Could not read the selected file".to_string())?
		.as_string()
		.ok_or_else(|| "The selected file is not text".to_string())?;
	serde_json::from_str(&text).map_err(|e| format!("Invalid data format: {e}"))
}

/// Semantic map editor
#[component]
pub fn Home() -> impl IntoView {
	let config = AppConfig::from_document();
	let factory = CanvasEngineFactory::new(config.physics);
	let views = StoredValue::new_local(factory.views());
	let revision = RwSignal::new(0u64);
	let bump = move || revision.update(|r| *r += 1);

	let spawner: Spawner = Rc::new(|task: LocalBoxFuture<'static, ()>| spawn_local(task));
	let controller = Controller::new(
		Session::new(config.widths, Box::new(factory)),
		HttpGraphService::new(config.service),
		spawner,
	)
	.with_listener(bump);
	let controller = StoredValue::new_local(controller);

	let state = RwSignal::new(ViewState::default());
	Effect::new(move |_| {
		revision.track();
		state.set(controller.with_value(|c| c.with(ViewState::capture)));
	});
	let batch = Memo::new(move |_| state.with(|v| (v.generation, v.slot_count())));
	let uploading = RwSignal::new(false);

	let on_click: Rc<dyn Fn(ClickEvent)> = Rc::new(move |event: ClickEvent| {
		if let Err(err) = controller.with_value(|c| c.handle_click(&event)) {
			warn!("ignored click: {err}");
		}
		bump();
	});
	let on_click = StoredValue::new_local(on_click);

	let on_file = move |ev: web_sys::Event| {
		let input = event_target::<HtmlInputElement>(&ev);
		let Some(file) = input.files().and_then(|files| files.get(0)) else {
			return;
		};
		uploading.set(true);
		spawn_local(async move {
			match read_source(file).await {
				Ok(source) => {
					let result = controller.get_value().upload(source).await;
					bump();
					if let Err(err) = result {
						error!("upload failed: {err}");
						alert(&format!("Upload failed: {err}"));
					}
				}
				Err(message) => alert(&message),
			}
			uploading.set(false);
		});
	};

	let on_merge = Callback::new(move |_: ()| {
		spawn_local(async move {
			let result = controller.get_value().toggle_merge().await;
			bump();
			report(result);
		});
	});
	let on_center = Callback::new(move |_: ()| {
		report(controller.with_value(|c| c.with_mut(Session::center)));
	});
	let on_beautify = Callback::new(move |_: ()| {
		controller.with_value(|c| c.with_mut(Session::toggle_beautify));
		bump();
	});
	let on_delete = Callback::new(move |_: ()| {
		let result = controller.with_value(|c| {
			c.delete_selected(|n| confirm(&format!("Delete {n} selected edge(s)?")))
		});
		bump();
		report(result);
	});
	let on_add = Callback::new(move |(from, to, weight): (String, String, String)| {
		if from.is_empty() || to.is_empty() {
			alert("Please choose both nodes");
			return;
		}
		let result = controller.with_value(|c| c.add_edge(&from, &to, &weight));
		bump();
		report(result);
	});
	let on_update = Callback::new(move |weight: String| {
		let result = controller.with_value(|c| c.update_selected(&weight));
		bump();
		report(result);
	});
	let on_select = Callback::new(move |slot: usize| {
		report(controller.with_value(|c| c.with_mut(|s| s.select(slot))));
		bump();
	});
	let on_previous = Callback::new(move |_: ()| {
		report(controller.with_value(|c| c.with_mut(Session::previous)));
		bump();
	});
	let on_next = Callback::new(move |_: ()| {
		report(controller.with_value(|c| c.with_mut(Session::next)));
		bump();
	});
	let on_form = Callback::new(move |form: Option<usize>| {
		controller.with_value(|c| c.with_mut(|s| s.select_form(form)));
		bump();
	});

	let canvases = move || {
		let (_, count) = batch.get();
		let registry = views.get_value();
		let on_click = on_click.get_value();
		(0..count)
			.filter_map(|index| {
				let view_state = registry.borrow().get(&index).cloned()?;
				let on_click = on_click.clone();
				Some(view! {
					<div
						class="map-slot"
						style:display=move || { if state.with(|v| v.active == index) { "block" } else { "none" } }
					>
						<SemanticMapCanvas index=index state=view_state on_click=on_click />
					</div>
				})
			})
			.collect_view()
	};

	view! {
		<div class="semantic-map-editor">
			<header>
				<h1>"Semantic Map Editor"</h1>
				<label class="upload">
					"Data file "
					<input type="file" accept=".json" on:change=on_file disabled=move || uploading.get() />
				</label>
				<Show when=move || uploading.get()>
					<span class="busy">"Processing..."</span>
				</Show>
			</header>

			<Show
				when=move || { state.with(ViewState::is_loaded) }
				fallback=|| view! { <p class="hint">"Upload a data file to build semantic maps."</p> }
			>
				<Carousel
					names=Signal::derive(move || state.with(|v| v.map_names.clone()))
					active=Signal::derive(move || state.with(|v| v.active))
					on_select=on_select
					on_previous=on_previous
					on_next=on_next
				/>
			</Show>
			<div class="map-stage">{canvases}</div>

			<Toolbar
				loaded=Signal::derive(move || state.with(ViewState::is_loaded))
				merge_label=Signal::derive(move || state.with(|v| v.merge_label))
				merge_busy=Signal::derive(move || state.with(|v| v.merge_busy))
				beautified=Signal::derive(move || state.with(|v| v.beautified))
				on_merge=on_merge
				on_center=on_center
				on_beautify=on_beautify
				on_delete=on_delete
			/>

			<div class="side-panels">
				<AddEdgeForm nodes=Signal::derive(move || state.with(|v| v.nodes.clone())) on_add=on_add />
				<UpdateEdgeForm
					selected=Signal::derive(move || state.with(|v| v.single_selection().map(str::to_string)))
					on_update=on_update
				/>
				<FormFilterSelect
					forms=Signal::derive(move || state.with(|v| v.forms.clone()))
					selected=Signal::derive(move || state.with(|v| v.selected_form))
					on_select=on_form
				/>
				<MetricsPanel rows=Signal::derive(move || state.with(|v| v.metrics.clone())) />
				<UnconnectedForms rows=Signal::derive(move || state.with(|v| v.unconnected.clone())) />
			</div>
		</div>
	}
}
