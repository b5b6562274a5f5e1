//! Runtime configuration.
//!
//! Defaults suit a page served by the graph service itself. A page can
//! override any part with a JSON blob in
//! `<meta name="semantic-map-config" content="...">`.

use log::warn;
use serde::Deserialize;

use crate::map::editor::WidthScale;

pub const CONFIG_META_NAME: &str = "semantic-map-config";

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
	pub service: ServiceConfig,
	pub widths: WidthScale,
	pub physics: PhysicsConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
	/// Prefix for every endpoint path; empty means the page origin.
	pub base_url: String,
	pub process_path: String,
	pub revalidate_path: String,
	pub merge_path: String,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			base_url: String::new(),
			process_path: "/api/process-excel".into(),
			revalidate_path: "/api/edge-modify".into(),
			merge_path: "/api/merge-edges".into(),
		}
	}
}

impl ServiceConfig {
	pub fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url.trim_end_matches('/'), path)
	}
}

/// Force simulation tuning for the canvas engine.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
	pub force_charge: f32,
	pub force_spring: f32,
	pub force_max: f32,
	pub node_speed: f32,
	pub damping_factor: f32,
}

impl Default for PhysicsConfig {
	fn default() -> Self {
		Self {
			force_charge: 150.0,
			force_spring: 0.05,
			force_max: 100.0,
			node_speed: 3000.0,
			damping_factor: 0.9,
		}
	}
}

impl AppConfig {
	pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(raw)
	}

	/// Defaults, overridden by the page's config meta tag when present. The
	/// base URL falls back to the page origin.
	pub fn from_document() -> Self {
		let window = web_sys::window();
		let meta = window
			.as_ref()
			.and_then(|w| w.document())
			.and_then(|d| d.query_selector(&format!("meta[name=\"{CONFIG_META_NAME}\"]")).ok())
			.flatten()
			.and_then(|el| el.get_attribute("content"));

		let mut config = match meta {
			Some(raw) => Self::from_json(&raw).unwrap_or_else(|e| {
				warn!("ignoring malformed {CONFIG_META_NAME}: {e}");
				Self::default()
			}),
			None => Self::default(),
		};
		if config.service.base_url.is_empty() {
			if let Some(origin) = window.and_then(|w| w.location().origin().ok()) {
				config.service.base_url = origin;
			}
		}
		config
	}
}
