//! Contract with the remote graph service, plus its HTTP implementation.

use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::ServiceError;
use super::types::{EvaluationMetric, GraphRequest, MergeResponse, ProcessResponse, SourceData};
use crate::config::ServiceConfig;

/// The three backend operations the editor relies on.
#[async_trait(?Send)]
pub trait GraphService {
	/// Builds the initial batch of candidate maps.
	async fn process(&self, source: &SourceData) -> Result<ProcessResponse, ServiceError>;

	/// Scores a hand-edited map.
	async fn revalidate(&self, request: &GraphRequest) -> Result<EvaluationMetric, ServiceError>;

	/// Proposes extra edges for a map.
	async fn merge_edges(&self, request: &GraphRequest) -> Result<MergeResponse, ServiceError>;
}

#[derive(Deserialize)]
struct ErrorBody {
	error: Option<String>,
}

/// JSON-over-HTTP client for the graph service.
#[derive(Clone, Debug)]
pub struct HttpGraphService {
	client: reqwest::Client,
	config: ServiceConfig,
}

impl HttpGraphService {
	/// Client for the endpoints named in `config`.
	pub fn new(config: ServiceConfig) -> Self {
		Self {
			client: reqwest::Client::new(),
			config,
		}
	}

	async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
		&self,
		path: &str,
		body: &B,
	) -> Result<T, ServiceError> {
		let url = self.config.url(path);
		debug!("POST {url}");
		let response = self
			.client
			.post(&url)
			.json(body)
			.send()
			.await
			.map_err(|e| ServiceError::Network(e.to_string()))?;
		let status = response.status();
		let text = response
			.text()
			.await
			.map_err(|e| ServiceError::Network(e.to_string()))?;
		if !status.is_success() {
			return Err(status_error(status.as_u16(), &text));
		}
		serde_json::from_str(&text).map_err(|e| ServiceError::Malformed(e.to_string()))
	}
}

/// Non-2xx bodies carry `{error}`; anything else gets a generic message.
fn status_error(status: u16, body: &str) -> ServiceError {
	let message = serde_json::from_str::<ErrorBody>(body)
		.ok()
		.and_then(|b| b.error)
		.map(|m| m.trim().to_string())
		.filter(|m| !m.is_empty())
		.unwrap_or_else(|| format!("Request failed with status {status}"));
	ServiceError::Status { status, message }
}

#[async_trait(?Send)]
impl GraphService for HttpGraphService {
	async fn process(&self, source: &SourceData) -> Result<ProcessResponse, ServiceError> {
		self.post(&self.config.process_path, source).await
	}

	async fn revalidate(&self, request: &GraphRequest) -> Result<EvaluationMetric, ServiceError> {
		self.post(&self.config.revalidate_path, request).await
	}

	async fn merge_edges(&self, request: &GraphRequest) -> Result<MergeResponse, ServiceError> {
		self.post(&self.config.merge_path, request).await
	}
}
