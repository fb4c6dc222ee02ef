// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory [`Host`] backed by an arena [`Document`].
//!
//! Navigation helpers follow browser event semantics:
//!
//! | Call | Events fired |
//! |------|--------------|
//! | [`push_state`](MemoryHost::push_state), [`replace_state`](MemoryHost::replace_state) | none |
//! | [`pop_state`](MemoryHost::pop_state) | `popstate`, plus `hashchange` if only the fragment changed |
//! | [`set_hash`](MemoryHost::set_hash) | `popstate` (history hosts only), `hashchange` |
//! | [`unload`](MemoryHost::unload) | `beforeunload`, `unload` |
//!
//! `popstate` is never fired by a host created with
//! [`without_history`](MemoryHost::without_history).

use std::sync::atomic::{AtomicU64, Ordering};

use loom_goals_core::{Document, NodeId};
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::host::{Host, HostEvent, HostEventType, Listener, ListenerId};

struct Registration {
	id: ListenerId,
	event_type: HostEventType,
	listener: Listener,
}

pub struct MemoryHost {
	location: RwLock<String>,
	document: RwLock<Document>,
	history: bool,
	listeners: Mutex<Vec<Registration>>,
	next_id: AtomicU64,
}

impl MemoryHost {
	pub fn new(url: impl Into<String>) -> Self {
		Self::build(url.into(), true)
	}

	/// A host without the history API, which only reports `hashchange`.
	pub fn without_history(url: impl Into<String>) -> Self {
		Self::build(url.into(), false)
	}

	fn build(url: String, history: bool) -> Self {
		Self {
			location: RwLock::new(url),
			document: RwLock::new(Document::new()),
			history,
			listeners: Mutex::new(Vec::new()),
			next_id: AtomicU64::new(1),
		}
	}

	/// Runs `f` with mutable access to the document.
	pub fn with_document<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
		f(&mut self.document.write())
	}

	/// Dispatches a click on `node`. Clicks on removed nodes carry a detached path.
	pub fn click(&self, node: NodeId) {
		let path = self.document.read().event_path(node);
		self.dispatch(HostEvent::Click(path));
	}

	/// `history.pushState`: changes the URL without firing an event.
	pub fn push_state(&self, url: impl Into<String>) {
		*self.location.write() = url.into();
	}

	/// `history.replaceState`: changes the URL without firing an event.
	pub fn replace_state(&self, url: impl Into<String>) {
		self.push_state(url);
	}

	/// Back/forward traversal to `url`.
	pub fn pop_state(&self, url: impl Into<String>) {
		let url = url.into();
		let fragment_only = {
			let mut location = self.location.write();
			let fragment_only =
				*location != url && strip_fragment(&location) == strip_fragment(&url);
			*location = url;
			fragment_only
		};

		if self.history {
			self.dispatch(HostEvent::PopState);
		}
		if fragment_only {
			self.dispatch(HostEvent::HashChange);
		}
	}

	/// Fragment navigation, as assigning `location.hash`.
	pub fn set_hash(&self, fragment: &str) {
		let fragment = fragment.trim_start_matches('#');
		let changed = {
			let mut location = self.location.write();
			let next = format!("{}#{fragment}", strip_fragment(&location));
			let changed = *location != next;
			*location = next;
			changed
		};
		if !changed {
			return;
		}

		if self.history {
			self.dispatch(HostEvent::PopState);
		}
		self.dispatch(HostEvent::HashChange);
	}

	/// Page teardown: fires `beforeunload` then `unload`.
	pub fn unload(&self) {
		self.dispatch(HostEvent::BeforeUnload);
		self.dispatch(HostEvent::Unload);
	}

	pub fn listener_count(&self, event_type: HostEventType) -> usize {
		self.listeners
			.lock()
			.iter()
			.filter(|r| r.event_type == event_type)
			.count()
	}

	pub fn total_listener_count(&self) -> usize {
		self.listeners.lock().len()
	}

	fn dispatch(&self, event: HostEvent) {
		let event_type = event.event_type();
		// Listeners are cloned out so they can register or remove listeners.
		let listeners: Vec<Listener> = self
			.listeners
			.lock()
			.iter()
			.filter(|r| r.event_type == event_type)
			.map(|r| r.listener.clone())
			.collect();

		trace!(event = %event_type, listeners = listeners.len(), "Dispatching host event");
		for listener in listeners {
			listener(&event);
		}
	}
}

impl Host for MemoryHost {
	fn location(&self) -> String {
		self.location.read().clone()
	}

	fn supports_history(&self) -> bool {
		self.history
	}

	fn add_listener(&self, event_type: HostEventType, listener: Listener) -> ListenerId {
		let id = ListenerId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
		self.listeners.lock().push(Registration {
			id,
			event_type,
			listener,
		});
		id
	}

	fn remove_listener(&self, id: ListenerId) {
		self.listeners.lock().retain(|r| r.id != id);
	}
}

fn strip_fragment(url: &str) -> &str {
	url.split_once('#').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_goals_core::ElementData;
	use std::sync::Arc;

	fn recorder(host: &MemoryHost, event_type: HostEventType) -> Arc<Mutex<Vec<HostEvent>>> {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		host.add_listener(
			event_type,
			Arc::new(move |event: &HostEvent| sink.lock().push(event.clone())),
		);
		seen
	}

	#[test]
	fn push_state_fires_nothing() {
		let host = MemoryHost::new("https://example.com/");
		let pops = recorder(&host, HostEventType::PopState);
		let hashes = recorder(&host, HostEventType::HashChange);

		host.push_state("https://example.com/next");
		host.replace_state("https://example.com/other");

		assert_eq!(host.location(), "https://example.com/other");
		assert!(pops.lock().is_empty());
		assert!(hashes.lock().is_empty());
	}

	#[test]
	fn pop_state_fires_hashchange_only_for_fragment_changes() {
		let host = MemoryHost::new("https://example.com/a");
		let pops = recorder(&host, HostEventType::PopState);
		let hashes = recorder(&host, HostEventType::HashChange);

		host.pop_state("https://example.com/b");
		assert_eq!(pops.lock().len(), 1);
		assert!(hashes.lock().is_empty());

		host.pop_state("https://example.com/b#top");
		assert_eq!(pops.lock().len(), 2);
		assert_eq!(hashes.lock().len(), 1);
	}

	#[test]
	fn set_hash_without_history_fires_hashchange_only() {
		let host = MemoryHost::without_history("https://example.com/page#a");
		let pops = recorder(&host, HostEventType::PopState);
		let hashes = recorder(&host, HostEventType::HashChange);

		host.set_hash("#b");
		host.set_hash("b");

		assert_eq!(host.location(), "https://example.com/page#b");
		assert!(pops.lock().is_empty());
		assert_eq!(hashes.lock().len(), 1);
		assert!(!host.supports_history());
	}

	#[test]
	fn unload_fires_beforeunload_first() {
		let host = MemoryHost::new("https://example.com/");
		let order = Arc::new(Mutex::new(Vec::new()));
		for event_type in [HostEventType::Unload, HostEventType::BeforeUnload] {
			let order = Arc::clone(&order);
			host.add_listener(
				event_type,
				Arc::new(move |event: &HostEvent| order.lock().push(event.event_type())),
			);
		}

		host.unload();

		assert_eq!(
			*order.lock(),
			vec![HostEventType::BeforeUnload, HostEventType::Unload]
		);
	}

	#[test]
	fn click_carries_event_path() {
		let host = MemoryHost::new("https://example.com/");
		let (button, stray) = host.with_document(|doc| {
			let body = doc.body();
			let button = doc.append(body, ElementData::new("button").with_class("buy-button"));
			let stray = doc.create_element(ElementData::new("a"));
			(button, stray)
		});
		let clicks = recorder(&host, HostEventType::Click);

		host.click(button);
		host.click(stray);

		let clicks = clicks.lock();
		match &clicks[0] {
			HostEvent::Click(path) => {
				assert!(path.is_connected());
				assert_eq!(path.target().map(|e| e.tag_name.as_str()), Some("button"));
			}
			other => panic!("unexpected event {other:?}"),
		}
		match &clicks[1] {
			HostEvent::Click(path) => assert!(!path.is_connected()),
			other => panic!("unexpected event {other:?}"),
		}
	}

	#[test]
	fn removed_listeners_stop_receiving_events() {
		let host = MemoryHost::new("https://example.com/");
		let id = host.add_listener(HostEventType::PopState, Arc::new(|_: &HostEvent| {}));
		assert_eq!(host.listener_count(HostEventType::PopState), 1);

		host.remove_listener(id);
		host.remove_listener(id);
		assert_eq!(host.total_listener_count(), 0);
	}

	#[test]
	fn listeners_may_remove_themselves_during_dispatch() {
		let host = Arc::new(MemoryHost::new("https://example.com/"));
		let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
		let listener_host = Arc::clone(&host);
		let listener_slot = Arc::clone(&slot);
		let id = host.add_listener(
			HostEventType::PopState,
			Arc::new(move |_: &HostEvent| {
				if let Some(id) = listener_slot.lock().take() {
					listener_host.remove_listener(id);
				}
			}),
		);
		*slot.lock() = Some(id);

		host.pop_state("https://example.com/next");
		assert_eq!(host.listener_count(HostEventType::PopState), 0);
	}
}
