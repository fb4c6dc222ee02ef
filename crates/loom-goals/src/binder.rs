// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wires a compiled goal set to host events.
//!
//! [`bind`] registers at most one listener per event type:
//!
//! | Listener | Registered when | Effect |
//! |----------|-----------------|--------|
//! | document `click` | the set has click goals | armed click goals are matched against the event path |
//! | window `popstate` | the host supports history | location re-check |
//! | window `hashchange` | the host lacks history | location re-check |
//!
//! A background task also polls the location, since `pushState` and
//! `replaceState` fire no event. A location change only counts when the URL
//! differs from the last one seen, so a navigation reported by both an event
//! and the poll is handled once.
//!
//! [`bind_unload_flush`] is bound separately, for as long as the manager
//! lives. It calls [`GoalEventSink::flush`](crate::GoalEventSink::flush) on
//! `beforeunload` and `unload`.

use std::sync::Arc;
use std::time::Duration;

use loom_goals_core::{CompiledGoalSet, EventPath, MatchEvent};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::GoalsConfig;
use crate::host::{HostEvent, HostEventType, ListenerId, SharedHost};
use crate::sink::SharedGoalEventSink;

struct PageState {
	url: String,
	armed_click_goals: Vec<usize>,
}

struct Tracker {
	goals: Arc<CompiledGoalSet>,
	host: SharedHost,
	sink: SharedGoalEventSink,
	config: GoalsConfig,
	page: Mutex<PageState>,
}

impl Tracker {
	fn event_url(&self, url: &str) -> String {
		self.config.event_url(url)
	}

	/// Re-reads the host location. Returns true if it changed.
	fn sync_location(&self) -> bool {
		let url = self.host.location();
		{
			let mut page = self.page.lock();
			if page.url == url {
				return false;
			}
			page.armed_click_goals = self.goals.armed_click_goals(&url);
			page.url = url.clone();
		}

		debug!(url = %url, "Location changed");
		self.report_pageviews(&url);
		true
	}

	fn report_pageviews(&self, url: &str) {
		let mut recorded_url = None;
		for key in self.goals.matching_url_goals(url) {
			let event_url = recorded_url.get_or_insert_with(|| self.event_url(url));
			debug!(goal_key = key, "Pageview goal matched");
			self.sink
				.report_match(MatchEvent::pageview(key, event_url.clone()));
		}
	}

	fn handle_click(&self, path: &EventPath) {
		self.sync_location();

		let (url, armed) = {
			let page = self.page.lock();
			(page.url.clone(), page.armed_click_goals.clone())
		};
		if armed.is_empty() {
			return;
		}

		let hits = self.goals.click_hits(&armed, path);
		if hits.is_empty() {
			return;
		}

		let event_url = self.event_url(&url);
		for hit in hits {
			debug!(goal_key = hit.key, selector = hit.selector, "Click goal matched");
			self.sink
				.report_match(MatchEvent::click(hit.key, event_url.clone(), hit.selector));
		}
	}
}

/// Attaches listeners for `goals` and reports pageviews for the current URL.
///
/// An empty goal set attaches nothing. Location polling needs a tokio runtime;
/// without one only event-driven navigation is observed.
pub fn bind(
	goals: Arc<CompiledGoalSet>,
	host: SharedHost,
	sink: SharedGoalEventSink,
	config: &GoalsConfig,
) -> Binding {
	let url = host.location();
	let tracker = Arc::new(Tracker {
		page: Mutex::new(PageState {
			armed_click_goals: goals.armed_click_goals(&url),
			url: url.clone(),
		}),
		goals: Arc::clone(&goals),
		host: Arc::clone(&host),
		sink,
		config: config.clone(),
	});

	if goals.is_empty() {
		debug!("No matchable goals, nothing to bind");
		return Binding::new(host, Vec::new(), None);
	}

	let mut listeners = Vec::with_capacity(2);

	if goals.has_click_goals() {
		let tracker = Arc::clone(&tracker);
		listeners.push(host.add_listener(
			HostEventType::Click,
			Arc::new(move |event: &HostEvent| {
				if let HostEvent::Click(path) = event {
					tracker.handle_click(path);
				}
			}),
		));
	}

	let navigation = if host.supports_history() {
		HostEventType::PopState
	} else {
		HostEventType::HashChange
	};
	{
		let tracker = Arc::clone(&tracker);
		listeners.push(host.add_listener(
			navigation,
			Arc::new(move |_: &HostEvent| {
				tracker.sync_location();
			}),
		));
	}

	let poll_task = config
		.location_poll_interval
		.filter(|every| !every.is_zero())
		.and_then(|every| spawn_location_poll(Arc::clone(&tracker), every));

	info!(
		url_goals = goals.url_goals().len(),
		click_goals = goals.click_goals().len(),
		navigation = %navigation,
		polling = poll_task.is_some(),
		"Goal listeners attached"
	);

	tracker.report_pageviews(&url);

	Binding::new(host, listeners, poll_task)
}

/// Flushes `sink` synchronously when the page unloads.
///
/// Both `beforeunload` and `unload` are observed because browsers skip one or
/// the other depending on how the page is left.
pub fn bind_unload_flush(host: SharedHost, sink: SharedGoalEventSink) -> Binding {
	let listeners = [HostEventType::BeforeUnload, HostEventType::Unload]
		.into_iter()
		.map(|event_type| {
			let sink = Arc::clone(&sink);
			host.add_listener(
				event_type,
				Arc::new(move |event: &HostEvent| {
					debug!(event = %event.event_type(), "Flushing goal events");
					sink.flush();
				}),
			)
		})
		.collect();

	Binding::new(host, listeners, None)
}

fn spawn_location_poll(tracker: Arc<Tracker>, every: Duration) -> Option<JoinHandle<()>> {
	match Handle::try_current() {
		Ok(handle) => Some(handle.spawn(poll_location(tracker, every))),
		Err(_) => {
			warn!("No tokio runtime available, location polling disabled");
			None
		}
	}
}

async fn poll_location(tracker: Arc<Tracker>, every: Duration) {
	let mut interval = tokio::time::interval(every);
	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
	// The first tick completes immediately.
	interval.tick().await;
	loop {
		interval.tick().await;
		tracker.sync_location();
	}
}

struct BindingState {
	active: bool,
	listeners: Vec<ListenerId>,
	poll_task: Option<JoinHandle<()>>,
}

/// Listener registrations of one goal set.
///
/// Dropping the binding tears it down.
pub struct Binding {
	host: SharedHost,
	state: Mutex<BindingState>,
}

impl Binding {
	fn new(host: SharedHost, listeners: Vec<ListenerId>, poll_task: Option<JoinHandle<()>>) -> Self {
		Self {
			host,
			state: Mutex::new(BindingState {
				active: true,
				listeners,
				poll_task,
			}),
		}
	}

	pub fn is_active(&self) -> bool {
		self.state.lock().active
	}

	pub fn listener_count(&self) -> usize {
		self.state.lock().listeners.len()
	}

	pub fn is_polling(&self) -> bool {
		self.state.lock().poll_task.is_some()
	}

	/// Removes every listener and stops the location poll. Idempotent.
	pub fn teardown(&self) {
		let (listeners, poll_task) = {
			let mut state = self.state.lock();
			if !state.active {
				return;
			}
			state.active = false;
			(std::mem::take(&mut state.listeners), state.poll_task.take())
		};

		for id in &listeners {
			self.host.remove_listener(*id);
		}
		if let Some(task) = poll_task {
			task.abort();
		}
		debug!(listeners = listeners.len(), "Goal listeners removed");
	}
}

impl Drop for Binding {
	fn drop(&mut self) {
		self.teardown();
	}
}
