// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-shot goal fetching.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use loom_goals_core::GoalSet;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::transport::SharedTransport;

/// Fetches the goal set of one environment at most once.
///
/// Concurrent callers of [`fetch`](Self::fetch) share the pending request;
/// callers after completion get the cached outcome, success or failure.
pub struct GoalFetcher {
	environment_key: String,
	transport: SharedTransport,
	outcome: OnceCell<Result<Arc<GoalSet>>>,
	requests: AtomicUsize,
}

impl GoalFetcher {
	pub fn new(environment_key: impl Into<String>, transport: SharedTransport) -> Self {
		Self {
			environment_key: environment_key.into(),
			transport,
			outcome: OnceCell::new(),
			requests: AtomicUsize::new(0),
		}
	}

	pub fn environment_key(&self) -> &str {
		&self.environment_key
	}

	pub async fn fetch(&self) -> Result<Arc<GoalSet>> {
		self.outcome
			.get_or_init(|| self.request())
			.await
			.clone()
	}

	/// The outcome, if the fetch has completed.
	pub fn outcome(&self) -> Option<&Result<Arc<GoalSet>>> {
		self.outcome.get()
	}

	/// Number of transport requests issued so far.
	pub fn requests_issued(&self) -> usize {
		self.requests.load(Ordering::SeqCst)
	}

	async fn request(&self) -> Result<Arc<GoalSet>> {
		self.requests.fetch_add(1, Ordering::SeqCst);
		debug!(environment = %self.environment_key, "Fetching goals");

		let body = self.transport.fetch_goals(&self.environment_key).await?;
		let (goals, rejected) = GoalSet::from_json(&body)?;

		for goal in &rejected {
			warn!(
				index = goal.index,
				goal_key = goal.key.as_deref().unwrap_or("<missing>"),
				reason = %goal.reason,
				"Dropping invalid goal definition"
			);
		}

		info!(
			environment = %self.environment_key,
			goals = goals.len(),
			rejected = rejected.len(),
			"Goals fetched"
		);
		Ok(Arc::new(goals))
	}
}
