// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Goal tracking configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use loom_goals_core::UrlNormalization;
use serde::{Deserialize, Serialize};

/// Rewrites the page URL recorded in every goal event.
pub type EventUrlTransformer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Default interval between location checks.
pub const DEFAULT_LOCATION_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Configuration for the goal manager.
#[derive(Clone)]
pub struct GoalsConfig {
	/// Whether goals are fetched at all. When false the manager is disabled.
	pub fetch_goals: bool,
	/// Base URL of the Loom server, used when no transport is supplied.
	pub base_url: Option<String>,
	/// Timeout for the goals request.
	pub request_timeout: Duration,
	/// How often the page location is polled for `pushState` navigations.
	/// `None` relies on `popstate`/`hashchange` alone.
	pub location_poll_interval: Option<Duration>,
	/// Candidate URL normalization for URL rules.
	pub url_normalization: UrlNormalization,
	/// Optional rewrite of the URL recorded in emitted events.
	pub event_url_transformer: Option<EventUrlTransformer>,
}

impl Default for GoalsConfig {
	fn default() -> Self {
		Self {
			fetch_goals: true,
			base_url: None,
			request_timeout: Duration::from_secs(5),
			location_poll_interval: Some(DEFAULT_LOCATION_POLL_INTERVAL),
			url_normalization: UrlNormalization::default(),
			event_url_transformer: None,
		}
	}
}

impl fmt::Debug for GoalsConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GoalsConfig")
			.field("fetch_goals", &self.fetch_goals)
			.field("base_url", &self.base_url)
			.field("request_timeout", &self.request_timeout)
			.field("location_poll_interval", &self.location_poll_interval)
			.field("url_normalization", &self.url_normalization)
			.field(
				"event_url_transformer",
				&self.event_url_transformer.as_ref().map(|_| "<fn>"),
			)
			.finish()
	}
}

impl GoalsConfig {
	/// Applies the transformer, if any, to a page URL.
	pub fn event_url(&self, url: &str) -> String {
		match &self.event_url_transformer {
			Some(transform) => transform(url),
			None => url.to_string(),
		}
	}
}

/// Goal options as passed through from the host SDK's options object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoalsOptions {
	pub fetch_goals: bool,
	pub base_url: Option<String>,
}

impl Default for GoalsOptions {
	fn default() -> Self {
		Self {
			fetch_goals: true,
			base_url: None,
		}
	}
}

impl From<GoalsOptions> for GoalsConfig {
	fn from(options: GoalsOptions) -> Self {
		Self {
			fetch_goals: options.fetch_goals,
			base_url: options.base_url,
			..Self::default()
		}
	}
}
