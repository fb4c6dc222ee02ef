// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transport for the goals endpoint.
//!
//! The goal manager only needs the raw response body of
//! `GET {base_url}/sdk/goals/{environment_key}`. [`HttpTransport`] is the
//! reqwest-backed implementation; hosts with their own request stack implement
//! [`GoalsTransport`] directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder};
use tracing::debug;
use url::Url;

use crate::error::{GoalsError, Result};

/// Fetches the goals payload for an environment.
#[async_trait]
pub trait GoalsTransport: Send + Sync + 'static {
	/// Returns the response body of the goals request.
	///
	/// Non-2xx responses must be reported as [`GoalsError::ServerError`] and
	/// connection failures as [`GoalsError::Network`].
	async fn fetch_goals(&self, environment_key: &str) -> Result<String>;
}

/// Type alias for a shared transport.
pub type SharedTransport = Arc<dyn GoalsTransport>;

/// Returns the User-Agent sent with goal requests.
///
/// Format: `loom-goals/{version}`
pub fn user_agent() -> String {
	format!("loom-goals/{}", env!("CARGO_PKG_VERSION"))
}

/// Creates an HTTP client builder with the goals User-Agent header.
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// reqwest-backed [`GoalsTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
	base_url: Url,
	http_client: Client,
}

impl HttpTransport {
	/// Creates a transport for the Loom server at `base_url`.
	///
	/// Example: `https://loom.example.com`
	pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
		let base_url = parse_base_url(base_url)?;
		let http_client = builder()
			.timeout(request_timeout)
			.build()
			.map_err(|e| GoalsError::ClientBuild(e.to_string()))?;

		Ok(Self {
			base_url,
			http_client,
		})
	}

	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Builds the goals endpoint URL. The environment key is percent-encoded
	/// as a single path segment.
	pub fn goals_url(&self, environment_key: &str) -> Result<Url> {
		let mut url = self.base_url.clone();
		url.path_segments_mut()
			.map_err(|_| GoalsError::InvalidBaseUrl(self.base_url.to_string()))?
			.pop_if_empty()
			.extend(["sdk", "goals", environment_key]);
		Ok(url)
	}
}

#[async_trait]
impl GoalsTransport for HttpTransport {
	async fn fetch_goals(&self, environment_key: &str) -> Result<String> {
		let url = self.goals_url(environment_key)?;
		debug!(url = %url, "Requesting goals");

		let response = self
			.http_client
			.get(url)
			.header(ACCEPT, "application/json")
			.send()
			.await
			.map_err(|e| GoalsError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			return Err(GoalsError::ServerError {
				status: status.as_u16(),
				message: response.text().await.unwrap_or_default(),
			});
		}

		response
			.text()
			.await
			.map_err(|e| GoalsError::Network(e.to_string()))
	}
}

fn parse_base_url(base_url: &str) -> Result<Url> {
	let url = Url::parse(base_url).map_err(|e| GoalsError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
	if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
		return Err(GoalsError::InvalidBaseUrl(base_url.to_string()));
	}
	Ok(url)
}
