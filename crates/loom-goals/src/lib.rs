// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Browser goal tracking for the Loom feature flags SDK.
//!
//! This crate fetches the analytics goals of an environment, compiles them into
//! URL and click matchers, and reports matching page interactions to the host
//! SDK's event pipeline.
//!
//! # Features
//!
//! - **One-shot fetch**: goals are requested once per manager, concurrent
//!   callers share the pending request
//! - **Pageview goals**: `exact`, `canonical`, `substring` and `regex` URL rules
//! - **Click goals**: delegated click matching against CSS selectors,
//!   optionally scoped to pages
//! - **SPA navigation**: `popstate`/`hashchange` plus location polling for
//!   `pushState` routers
//! - **Failure isolation**: a broken pattern only disables its own goal, a
//!   failed fetch only disables goal tracking
//!
//! # Example
//!
//! ```ignore
//! use loom_goals::{GoalManager, MemoryHost};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = Arc::new(MemoryHost::new("https://shop.example.com/"));
//!
//!     let manager = GoalManager::builder("env-123")
//!         .base_url("https://loom.example.com")
//!         .host(host.clone())
//!         .sink(|event: loom_goals::MatchEvent| {
//!             println!("goal {} hit on {}", event.goal_key, event.url);
//!         })
//!         .start()?;
//!
//!     manager.ready().await;
//!
//!     // Only record custom events that correspond to a goal.
//!     let filter = manager.custom_event_filter();
//!     assert_eq!(filter("signup"), manager.goal_key_exists("signup"));
//!
//!     Ok(())
//! }
//! ```

mod binder;
mod config;
mod error;
mod fetcher;
mod host;
mod manager;
mod memory_host;
mod ready;
mod sink;
mod transport;

pub use binder::{bind, bind_unload_flush, Binding};
pub use config::{EventUrlTransformer, GoalsConfig, GoalsOptions, DEFAULT_LOCATION_POLL_INTERVAL};
pub use error::{GoalsError, Result};
pub use fetcher::GoalFetcher;
pub use host::{Host, HostEvent, HostEventType, Listener, ListenerId, SharedHost};
pub use manager::{
	CustomEventFilter, GoalManager, GoalManagerBuilder, GoalsState, ReadyCallback, ReadyOutcome,
};
pub use memory_host::MemoryHost;
pub use ready::GoalsReady;
pub use sink::{GoalEventSink, NoOpGoalEventSink, SharedGoalEventSink};
pub use transport::{user_agent, GoalsTransport, HttpTransport, SharedTransport};

// Re-export core types for convenience
pub use loom_goals_core::{
	ClickMatcher, CompiledGoalSet, Document, ElementData, EventPath, Goal, GoalKind, GoalSet,
	MatchEvent, MatchKind, MatchRule, MatchRuleKind, NodeId, PatternError, SelectorList,
	UrlNormalization,
};
