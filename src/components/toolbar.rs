use leptos::prelude::*;

/// Map-wide actions. Every button is disabled until a map is loaded.
#[component]
pub fn Toolbar(
	#[prop(into)] loaded: Signal<bool>,
	#[prop(into)] merge_label: Signal<&'static str>,
	#[prop(into)] merge_busy: Signal<bool>,
	#[prop(into)] beautified: Signal<bool>,
	on_merge: Callback<()>,
	on_center: Callback<()>,
	on_beautify: Callback<()>,
	on_delete: Callback<()>,
) -> impl IntoView {
	view! {
		<div class="toolbar">
			<button
				class="merge"
				disabled=move || !loaded.get() || merge_busy.get()
				on:click=move |_| on_merge.run(())
			>
				{move || merge_label.get()}
			</button>
			<button disabled=move || !loaded.get() on:click=move |_| on_delete.run(())>
				"Delete Edge"
			</button>
			<button disabled=move || !loaded.get() on:click=move |_| on_center.run(())>
				"Center"
			</button>
			<button disabled=move || !loaded.get() on:click=move |_| on_beautify.run(())>
				{move || if beautified.get() { "Enable Physics" } else { "Beautify" }}
			</button>
		</div>
	}
}

/// Connects two nodes of the active map.
#[component]
pub fn AddEdgeForm(
	#[prop(into)] nodes: Signal<Vec<(String, String)>>,
	on_add: Callback<(String, String, String)>,
) -> impl IntoView {
	let from = RwSignal::new(String::new());
	let to = RwSignal::new(String::new());
	let weight = RwSignal::new(String::new());

	let options = move || {
		nodes
			.get()
			.into_iter()
			.map(|(id, label)| view! { <option value=id>{label}</option> })
			.collect_view()
	};

	view! {
		<form
			class="edge-form"
			on:submit=move |ev| {
				ev.prevent_default();
				on_add.run((from.get(), to.get(), weight.get()));
			}
		>
			<h3>"Add Edge"</h3>
			<select on:change=move |ev| from.set(event_target_value(&ev)) prop:value=move || from.get()>
				<option value="">"From..."</option>
				{options}
			</select>
			<select on:change=move |ev| to.set(event_target_value(&ev)) prop:value=move || to.get()>
				<option value="">"To..."</option>
				{options}
			</select>
			<input
				type="text"
				placeholder="Weight"
				prop:value=move || weight.get()
				on:input=move |ev| weight.set(event_target_value(&ev))
			/>
			<button type="submit">"Add"</button>
		</form>
	}
}

/// Re-weights the single selected edge.
#[component]
pub fn UpdateEdgeForm(#[prop(into)] selected: Signal<Option<String>>, on_update: Callback<String>) -> impl IntoView {
	let weight = RwSignal::new(String::new());

	view! {
		<form
			class="edge-form"
			on:submit=move |ev| {
				ev.prevent_default();
				on_update.run(weight.get());
			}
		>
			<h3>"Update Edge"</h3>
			<p class="selection">
				{move || selected.get().unwrap_or_else(|| "Select one edge".to_string())}
			</p>
			<input
				type="text"
				placeholder="New weight"
				prop:value=move || weight.get()
				on:input=move |ev| weight.set(event_target_value(&ev))
			/>
			<button type="submit" disabled=move || selected.with(Option::is_none)>
				"Update"
			</button>
		</form>
	}
}
