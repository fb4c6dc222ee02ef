// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Outbound integration for goal hits.
//!
//! Every [`MatchEvent`] produced by the event binder is handed to a
//! [`GoalEventSink`]. The host SDK usually enqueues it as a custom analytics
//! event using [`MatchEvent::to_event_properties`]:
//!
//! | Property | Description |
//! |----------|-------------|
//! | `$goal_key` | The key of the goal that matched |
//! | `$goal_kind` | `pageview` or `click` |
//! | `$current_url` | The page URL at the time of the match |
//! | `$selector` | The matching selector (click goals only) |
//!
//! # Example
//!
//! ```ignore
//! use loom_goals::{GoalManager, MatchEvent};
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<MatchEvent>();
//!
//! let manager = GoalManager::builder("env-123")
//!     .base_url("https://loom.example.com")
//!     .host(host)
//!     .sink(tx)
//!     .start()?;
//!
//! while let Some(event) = rx.recv().await {
//!     queue.enqueue("$goal", event.to_event_properties());
//! }
//! ```

use std::sync::Arc;

use loom_goals_core::MatchEvent;
use tokio::sync::mpsc;
use tracing::debug;

/// Receiver of goal hits.
///
/// `report_match` is called synchronously from inside host event listeners.
/// Implementations should only enqueue; delivery belongs to the host event
/// pipeline.
pub trait GoalEventSink: Send + Sync + 'static {
	fn report_match(&self, event: MatchEvent);

	/// Delivers anything still queued. Called synchronously on `beforeunload`
	/// and `unload`, so it must not wait on the runtime.
	fn flush(&self) {}
}

/// Type alias for a shared goal event sink.
pub type SharedGoalEventSink = Arc<dyn GoalEventSink>;

/// A sink that discards all events.
///
/// This is used when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpGoalEventSink;

impl GoalEventSink for NoOpGoalEventSink {
	fn report_match(&self, _event: MatchEvent) {}
}

impl<F> GoalEventSink for F
where
	F: Fn(MatchEvent) + Send + Sync + 'static,
{
	fn report_match(&self, event: MatchEvent) {
		self(event)
	}
}

impl GoalEventSink for mpsc::UnboundedSender<MatchEvent> {
	fn report_match(&self, event: MatchEvent) {
		if let Err(mpsc::error::SendError(event)) = self.send(event) {
			debug!(goal_key = %event.goal_key, "Goal event receiver dropped, discarding event");
		}
	}
}
