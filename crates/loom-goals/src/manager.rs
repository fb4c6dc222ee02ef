// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The goal manager: fetch, compile, bind, signal readiness.
//!
//! ```text
//! Idle ──▶ Fetching ──ok──▶ Compiled ──▶ Ready(Tracking)
//!  │           └────error──▶ Disabled ──▶ Ready(Disabled)
//!  └── fetch_goals = false ─▶ Disabled ──▶ Ready(Disabled)
//! ```
//!
//! Fetch and parse failures never reach the host. They are logged and the
//! manager settles in the disabled state, where `goal_key_exists` is always
//! false and no goal listeners are attached.
//!
//! Whenever a host is configured the sink is also flushed on page unload,
//! whether or not goals are tracked.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use loom_goals_core::{CompiledGoalSet, GoalSet, UrlNormalization};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::binder::{self, Binding};
use crate::config::{GoalsConfig, GoalsOptions};
use crate::error::{GoalsError, Result};
use crate::fetcher::GoalFetcher;
use crate::host::SharedHost;
use crate::ready::GoalsReady;
use crate::sink::{GoalEventSink, NoOpGoalEventSink, SharedGoalEventSink};
use crate::transport::{GoalsTransport, HttpTransport, SharedTransport};

/// How the manager finished starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
	/// Goals were fetched and listeners are attached.
	Tracking,
	/// Fetching was disabled or failed.
	Disabled,
}

/// Lifecycle state of a [`GoalManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalsState {
	Idle,
	Fetching,
	Compiled,
	Disabled,
	Ready(ReadyOutcome),
}

impl GoalsState {
	pub fn is_ready(&self) -> bool {
		matches!(self, GoalsState::Ready(_))
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			GoalsState::Idle => "idle",
			GoalsState::Fetching => "fetching",
			GoalsState::Compiled => "compiled",
			GoalsState::Disabled => "disabled",
			GoalsState::Ready(ReadyOutcome::Tracking) => "ready",
			GoalsState::Ready(ReadyOutcome::Disabled) => "ready_disabled",
		}
	}
}

impl fmt::Display for GoalsState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Callback fired once when the manager becomes ready.
pub type ReadyCallback = Box<dyn FnOnce() + Send + 'static>;

/// Predicate the host SDK uses to decide whether a custom event is worth recording.
pub type CustomEventFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Builder for constructing a [`GoalManager`].
pub struct GoalManagerBuilder {
	environment_key: String,
	config: GoalsConfig,
	transport: Option<SharedTransport>,
	host: Option<SharedHost>,
	sink: Option<SharedGoalEventSink>,
	on_ready: Option<ReadyCallback>,
}

impl GoalManagerBuilder {
	pub fn new(environment_key: impl Into<String>) -> Self {
		Self {
			environment_key: environment_key.into(),
			config: GoalsConfig::default(),
			transport: None,
			host: None,
			sink: None,
			on_ready: None,
		}
	}

	/// Replaces the whole configuration.
	pub fn config(mut self, config: GoalsConfig) -> Self {
		self.config = config;
		self
	}

	/// Applies options passed through from the host SDK.
	pub fn options(mut self, options: GoalsOptions) -> Self {
		self.config.fetch_goals = options.fetch_goals;
		if options.base_url.is_some() {
			self.config.base_url = options.base_url;
		}
		self
	}

	/// Enables or disables goal fetching. Disabled managers are ready immediately.
	pub fn fetch_goals(mut self, enable: bool) -> Self {
		self.config.fetch_goals = enable;
		self
	}

	/// Sets the base URL for the Loom server.
	///
	/// Example: `https://loom.example.com`
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.config.base_url = Some(url.into());
		self
	}

	/// Sets the timeout for the goals request.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	/// Sets the location poll interval. `None` disables polling.
	pub fn location_poll_interval(mut self, interval: Option<Duration>) -> Self {
		self.config.location_poll_interval = interval;
		self
	}

	pub fn url_normalization(mut self, policy: UrlNormalization) -> Self {
		self.config.url_normalization = policy;
		self
	}

	/// Rewrites the URL recorded in every goal event.
	pub fn event_url_transformer<F>(mut self, transform: F) -> Self
	where
		F: Fn(&str) -> String + Send + Sync + 'static,
	{
		self.config.event_url_transformer = Some(Arc::new(transform));
		self
	}

	/// Uses a custom transport instead of the built-in HTTP client.
	pub fn transport<T: GoalsTransport>(self, transport: T) -> Self {
		self.shared_transport(Arc::new(transport))
	}

	pub fn shared_transport(mut self, transport: SharedTransport) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Sets the host whose events are tracked.
	pub fn host(mut self, host: SharedHost) -> Self {
		self.host = Some(host);
		self
	}

	/// Sets the sink that receives goal hits.
	pub fn sink<S: GoalEventSink>(self, sink: S) -> Self {
		self.shared_sink(Arc::new(sink))
	}

	pub fn shared_sink(mut self, sink: SharedGoalEventSink) -> Self {
		self.sink = Some(sink);
		self
	}

	/// Sets a callback fired exactly once when the manager becomes ready.
	pub fn on_ready<F>(mut self, callback: F) -> Self
	where
		F: FnOnce() + Send + 'static,
	{
		self.on_ready = Some(Box::new(callback));
		self
	}

	/// Validates the configuration and starts the manager.
	///
	/// With fetching enabled this spawns the fetch onto the current tokio
	/// runtime and returns immediately; await [`GoalManager::ready`] to know
	/// when goals are live.
	pub fn start(self) -> Result<GoalManager> {
		let environment_key = self.environment_key.trim().to_string();
		if environment_key.is_empty() {
			return Err(GoalsError::InvalidEnvironmentKey);
		}

		let sink = self
			.sink
			.unwrap_or_else(|| Arc::new(NoOpGoalEventSink));
		let unload_host = self.host.clone();

		let tracking = if self.config.fetch_goals {
			let host = self.host.ok_or(GoalsError::MissingHost)?;
			let transport = match self.transport {
				Some(transport) => transport,
				None => {
					let base_url = self.config.base_url.as_deref().ok_or_else(|| {
						GoalsError::InvalidBaseUrl("no base URL configured".to_string())
					})?;
					Arc::new(HttpTransport::new(base_url, self.config.request_timeout)?)
				}
			};
			let runtime = Handle::try_current().map_err(|_| GoalsError::NoRuntime)?;
			Some((
				Tracking {
					host,
					fetcher: GoalFetcher::new(environment_key.clone(), transport),
				},
				runtime,
			))
		} else {
			None
		};

		let (ready_sender, _) = watch::channel(false);
		let (tracking, runtime) = match tracking {
			Some((tracking, runtime)) => (Some(tracking), Some(runtime)),
			None => (None, None),
		};

		let inner = Arc::new(ManagerInner {
			environment_key,
			config: self.config,
			tracking,
			unload: Mutex::new(
				unload_host.map(|host| binder::bind_unload_flush(host, Arc::clone(&sink))),
			),
			sink,
			state: RwLock::new(GoalsState::Idle),
			goals: RwLock::new(None),
			binding: Mutex::new(None),
			closed: AtomicBool::new(false),
			ready_sender,
			on_ready: Mutex::new(self.on_ready),
		});

		match runtime {
			Some(runtime) => {
				inner.set_state(GoalsState::Fetching);
				runtime.spawn(run(Arc::clone(&inner)));
			}
			None => {
				info!(environment = %inner.environment_key, "Goal fetching disabled");
				inner.set_state(GoalsState::Disabled);
				inner.mark_ready();
			}
		}

		Ok(GoalManager { inner })
	}
}

struct Tracking {
	host: SharedHost,
	fetcher: GoalFetcher,
}

struct ManagerInner {
	environment_key: String,
	config: GoalsConfig,
	tracking: Option<Tracking>,
	unload: Mutex<Option<Binding>>,
	sink: SharedGoalEventSink,
	state: RwLock<GoalsState>,
	goals: RwLock<Option<Arc<GoalSet>>>,
	binding: Mutex<Option<Binding>>,
	closed: AtomicBool,
	ready_sender: watch::Sender<bool>,
	on_ready: Mutex<Option<ReadyCallback>>,
}

impl ManagerInner {
	fn set_state(&self, state: GoalsState) {
		let previous = std::mem::replace(&mut *self.state.write(), state);
		debug!(from = %previous, to = %state, "Goal manager state changed");
	}

	fn goal_key_exists(&self, key: &str) -> bool {
		self.goals
			.read()
			.as_ref()
			.is_some_and(|goals| goals.contains_key(key))
	}

	fn activate(&self, tracking: &Tracking, goals: Arc<GoalSet>) {
		let (compiled, skipped) = CompiledGoalSet::compile(&goals, self.config.url_normalization);
		for goal in &skipped {
			warn!(goal_key = %goal.key, error = %goal.error, "Skipping goal with invalid pattern");
		}

		if self.closed.load(Ordering::SeqCst) {
			debug!("Goal manager closed before goals were bound");
			self.set_state(GoalsState::Disabled);
			return;
		}

		let binding = binder::bind(
			Arc::new(compiled),
			Arc::clone(&tracking.host),
			Arc::clone(&self.sink),
			&self.config,
		);
		*self.binding.lock() = Some(binding);
		// A sink may close the manager while the initial pageviews are reported.
		if self.closed.load(Ordering::SeqCst) {
			self.binding.lock().take();
		}

		info!(
			environment = %self.environment_key,
			goals = goals.len(),
			skipped = skipped.len(),
			"Goal tracking active"
		);
		*self.goals.write() = Some(goals);
		self.set_state(GoalsState::Compiled);
	}

	/// Moves to `Ready` and fires the readiness signal. Only the first call has
	/// any effect.
	fn mark_ready(&self) {
		let outcome = {
			let mut state = self.state.write();
			let outcome = match *state {
				GoalsState::Ready(_) => return,
				GoalsState::Compiled => ReadyOutcome::Tracking,
				_ => ReadyOutcome::Disabled,
			};
			*state = GoalsState::Ready(outcome);
			outcome
		};

		self.ready_sender.send_replace(true);
		let callback = self.on_ready.lock().take();
		if let Some(callback) = callback {
			callback();
		}
		info!(environment = %self.environment_key, outcome = ?outcome, "Goal manager ready");
	}

	fn close(&self) {
		if self.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		let bindings = [self.binding.lock().take(), self.unload.lock().take()];
		for binding in bindings.into_iter().flatten() {
			binding.teardown();
		}
	}
}

async fn run(inner: Arc<ManagerInner>) {
	let Some(tracking) = inner.tracking.as_ref() else {
		inner.mark_ready();
		return;
	};

	match tracking.fetcher.fetch().await {
		Ok(goals) => inner.activate(tracking, goals),
		Err(e) => {
			warn!(
				environment = %inner.environment_key,
				error = %e,
				network = e.is_network(),
				retryable = e.is_retryable(),
				"Failed to fetch goals, goal tracking disabled"
			);
			inner.set_state(GoalsState::Disabled);
		}
	}

	inner.mark_ready();
}

/// Fetches goals for an environment and reports matching page interactions.
///
/// Dropping the manager removes its listeners. A fetch still in flight runs
/// to completion and then releases its resources without binding.
pub struct GoalManager {
	inner: Arc<ManagerInner>,
}

impl GoalManager {
	/// Creates a new builder for constructing a GoalManager.
	pub fn builder(environment_key: impl Into<String>) -> GoalManagerBuilder {
		GoalManagerBuilder::new(environment_key)
	}

	pub fn environment_key(&self) -> &str {
		&self.inner.environment_key
	}

	pub fn state(&self) -> GoalsState {
		*self.inner.state.read()
	}

	/// Returns true if `key` names a goal of the fetched set.
	///
	/// Always false before goals are live and when tracking is disabled.
	pub fn goal_key_exists(&self, key: &str) -> bool {
		self.inner.goal_key_exists(key)
	}

	/// A shareable form of [`goal_key_exists`](Self::goal_key_exists).
	///
	/// The filter does not keep the manager alive and returns false once it
	/// is dropped.
	pub fn custom_event_filter(&self) -> CustomEventFilter {
		let inner: Weak<ManagerInner> = Arc::downgrade(&self.inner);
		Arc::new(move |key: &str| {
			inner
				.upgrade()
				.is_some_and(|inner| inner.goal_key_exists(key))
		})
	}

	/// The fetched goal set, once live.
	pub fn goals(&self) -> Option<Arc<GoalSet>> {
		self.inner.goals.read().clone()
	}

	pub fn ready(&self) -> GoalsReady {
		GoalsReady::new(self.inner.ready_sender.subscribe())
	}

	pub fn is_ready(&self) -> bool {
		self.state().is_ready()
	}

	/// Returns true while goal listeners are attached. The unload flush is not
	/// counted.
	pub fn is_listening(&self) -> bool {
		self.inner
			.binding
			.lock()
			.as_ref()
			.is_some_and(Binding::is_active)
	}

	/// Removes all listeners, including the unload flush. Idempotent.
	///
	/// Goal keys stay queryable after closing.
	pub fn close(&self) {
		self.inner.close();
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}
}

impl Drop for GoalManager {
	fn drop(&mut self) {
		self.inner.close();
	}
}

impl fmt::Debug for GoalManager {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GoalManager")
			.field("environment_key", &self.inner.environment_key)
			.field("state", &self.state())
			.field("closed", &self.is_closed())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory_host::MemoryHost;
	use async_trait::async_trait;
	use std::sync::atomic::AtomicUsize;

	struct StaticTransport(&'static str);

	#[async_trait]
	impl GoalsTransport for StaticTransport {
		async fn fetch_goals(&self, _environment_key: &str) -> Result<String> {
			Ok(self.0.to_string())
		}
	}

	fn host() -> SharedHost {
		Arc::new(MemoryHost::new("https://example.com/"))
	}

	#[test]
	fn test_builder_requires_environment_key() {
		for key in ["", "   "] {
			let result = GoalManager::builder(key).fetch_goals(false).start();
			assert_eq!(result.unwrap_err(), GoalsError::InvalidEnvironmentKey);
		}
	}

	#[test]
	fn test_builder_requires_host_when_fetching() {
		let result = GoalManager::builder("env")
			.transport(StaticTransport("[]"))
			.start();
		assert_eq!(result.unwrap_err(), GoalsError::MissingHost);
	}

	#[test]
	fn test_builder_requires_base_url_without_transport() {
		let result = GoalManager::builder("env").host(host()).start();
		assert!(matches!(result, Err(GoalsError::InvalidBaseUrl(_))));

		let result = GoalManager::builder("env")
			.host(host())
			.base_url("not a url")
			.start();
		assert!(matches!(result, Err(GoalsError::InvalidBaseUrl(_))));
	}

	#[test]
	fn test_builder_requires_runtime_when_fetching() {
		let result = GoalManager::builder("env")
			.host(host())
			.transport(StaticTransport("[]"))
			.start();
		assert_eq!(result.unwrap_err(), GoalsError::NoRuntime);
	}

	#[test]
	fn test_disabled_manager_is_ready_immediately() {
		let fired = Arc::new(AtomicUsize::new(0));
		let manager = {
			let fired = Arc::clone(&fired);
			GoalManager::builder("env")
				.fetch_goals(false)
				.on_ready(move || {
					fired.fetch_add(1, Ordering::SeqCst);
				})
				.start()
				.unwrap()
		};

		assert_eq!(manager.state(), GoalsState::Ready(ReadyOutcome::Disabled));
		assert!(manager.ready().is_ready());
		assert_eq!(fired.load(Ordering::SeqCst), 1);
		assert!(!manager.goal_key_exists("anything"));
		assert!(!manager.is_listening());

		manager.inner.mark_ready();
		assert_eq!(fired.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_options_disable_fetching() {
		let options: GoalsOptions = serde_json::from_str(r#"{"fetchGoals": false}"#).unwrap();
		let manager = GoalManager::builder("env").options(options).start().unwrap();
		assert!(manager.is_ready());
	}

	#[tokio::test]
	async fn test_fetched_goals_become_queryable() {
		let manager = GoalManager::builder("env")
			.host(host())
			.transport(StaticTransport(
				r#"[{"key": "signup", "kind": "custom"}, {"key": "g1", "kind": "url",
				"urlMatcher": {"type": "exact", "url": "https://example.com/"}}]"#,
			))
			.start()
			.unwrap();
		let filter = manager.custom_event_filter();

		manager.ready().await;

		assert_eq!(manager.state(), GoalsState::Ready(ReadyOutcome::Tracking));
		assert!(manager.goal_key_exists("signup"));
		assert!(filter("g1"));
		assert!(!filter("missing"));
		assert!(manager.is_listening());

		manager.close();
		manager.close();
		assert!(!manager.is_listening());
		assert!(manager.goal_key_exists("signup"));

		drop(manager);
		assert!(!filter("signup"));
	}

	#[test]
	fn test_disabled_manager_with_host_flushes_on_unload() {
		let memory = Arc::new(MemoryHost::new("https://example.com/"));
		let manager = GoalManager::builder("env")
			.fetch_goals(false)
			.host(memory.clone())
			.start()
			.unwrap();

		assert_eq!(memory.listener_count(crate::host::HostEventType::BeforeUnload), 1);
		assert_eq!(memory.listener_count(crate::host::HostEventType::Unload), 1);
		assert!(!manager.is_listening());

		manager.close();
		assert_eq!(memory.total_listener_count(), 0);
	}

	#[test]
	fn test_state_names() {
		assert_eq!(GoalsState::Fetching.to_string(), "fetching");
		assert_eq!(GoalsState::Ready(ReadyOutcome::Tracking).as_str(), "ready");
		assert!(!GoalsState::Compiled.is_ready());
	}
}
