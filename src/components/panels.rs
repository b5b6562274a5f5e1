use leptos::prelude::*;

use crate::map::UnconnectedForm;

/// Scores of the active map.
#[component]
pub fn MetricsPanel(#[prop(into)] rows: Signal<Vec<(&'static str, String)>>) -> impl IntoView {
	view! {
		<table class="metrics-panel">
			<tbody>
				{move || {
					rows.get()
						.into_iter()
						.map(|(key, value)| view! {
							<tr>
								<th>{key}</th>
								<td>{value}</td>
							</tr>
						})
						.collect_view()
				}}
			</tbody>
		</table>
	}
}

#[component]
pub fn UnconnectedForms(#[prop(into)] rows: Signal<Vec<UnconnectedForm>>) -> impl IntoView {
	view! {
		<div class="unconnected-forms">
			<h3>"Unconnected Forms"</h3>
			<Show
				when=move || !rows.with(Vec::is_empty)
				fallback=|| view! { <p class="empty">"All forms are connected."</p> }
			>
				<table>
					<thead>
						<tr>
							<th>"Language"</th>
							<th>"Form"</th>
						</tr>
					</thead>
					<tbody>
						{move || {
							rows.get()
								.into_iter()
								.map(|row| view! {
									<tr>
										<td>{row.language}</td>
										<td>{row.form}</td>
									</tr>
								})
								.collect_view()
						}}
					</tbody>
				</table>
			</Show>
		</div>
	}
}

/// Dropdown that highlights one form's nodes across all maps.
#[component]
pub fn FormFilterSelect(
	#[prop(into)] forms: Signal<Vec<String>>,
	#[prop(into)] selected: Signal<Option<usize>>,
	on_select: Callback<Option<usize>>,
) -> impl IntoView {
	let on_change = move |ev: web_sys::Event| {
		let value = event_target_value(&ev);
		on_select.run(value.parse::<usize>().ok());
	};

	view! {
		<label class="form-filter">
			"Highlight form "
			<select
				on:change=on_change
				prop:value=move || selected.get().map(|i| i.to_string()).unwrap_or_default()
			>
				<option value="">"All Forms"</option>
				{move || {
					forms.get()
						.into_iter()
						.enumerate()
						.map(|(i, label)| view! { <option value=i.to_string()>{label}</option> })
						.collect_view()
				}}
			</select>
		</label>
	}
}

/// Previous/next buttons and one dot per map.
#[component]
pub fn Carousel(
	#[prop(into)] names: Signal<Vec<String>>,
	#[prop(into)] active: Signal<usize>,
	on_select: Callback<usize>,
	on_previous: Callback<()>,
	on_next: Callback<()>,
) -> impl IntoView {
	view! {
		<div class="carousel-nav">
			<button on:click=move |_| on_previous.run(())>"‹"</button>
			<span class="carousel-title">
				{move || names.with(|n| n.get(active.get()).cloned().unwrap_or_default())}
			</span>
			<button on:click=move |_| on_next.run(())>"›"</button>
			<div class="carousel-dots">
				{move || {
					(0..names.with(Vec::len))
						.map(|i| {
							view! {
								<button
									class="dot"
									class:active=move || active.get() == i
									on:click=move |_| on_select.run(i)
								/>
							}
						})
						.collect_view()
				}}
			</div>
		</div>
	}
}
