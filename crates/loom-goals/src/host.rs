// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Platform primitives the goal tracker needs from its host.
//!
//! A host exposes the current page URL and lets the tracker register
//! listeners on the document (`click`) and the window (`popstate`,
//! `hashchange`, `beforeunload`, `unload`). Browsers implement [`Host`] over the real DOM;
//! [`MemoryHost`](crate::MemoryHost) is an in-memory implementation.

use std::fmt;
use std::sync::Arc;

use loom_goals_core::EventPath;

/// Event types the tracker listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventType {
	/// Delegated `click` on the document.
	Click,
	/// `popstate` on the window.
	PopState,
	/// `hashchange` on the window.
	HashChange,
	/// `beforeunload` on the window.
	BeforeUnload,
	/// `unload` on the window.
	Unload,
}

impl HostEventType {
	pub fn as_str(&self) -> &'static str {
		match self {
			HostEventType::Click => "click",
			HostEventType::PopState => "popstate",
			HostEventType::HashChange => "hashchange",
			HostEventType::BeforeUnload => "beforeunload",
			HostEventType::Unload => "unload",
		}
	}

	/// Returns true for events registered on the window rather than the document.
	pub fn is_window_event(&self) -> bool {
		!matches!(self, HostEventType::Click)
	}
}

impl fmt::Display for HostEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// An event delivered to a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
	/// A click, with the composed path of its target.
	Click(EventPath),
	PopState,
	HashChange,
	BeforeUnload,
	Unload,
}

impl HostEvent {
	pub fn event_type(&self) -> HostEventType {
		match self {
			HostEvent::Click(_) => HostEventType::Click,
			HostEvent::PopState => HostEventType::PopState,
			HostEvent::HashChange => HostEventType::HashChange,
			HostEvent::BeforeUnload => HostEventType::BeforeUnload,
			HostEvent::Unload => HostEventType::Unload,
		}
	}
}

/// Handle returned by [`Host::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
	pub fn new(id: u64) -> Self {
		Self(id)
	}

	pub fn as_u64(&self) -> u64 {
		self.0
	}
}

/// A registered event callback.
pub type Listener = Arc<dyn Fn(&HostEvent) + Send + Sync>;

/// The page environment the goal tracker runs in.
pub trait Host: Send + Sync + 'static {
	/// The current page URL.
	fn location(&self) -> String;

	/// Whether the host supports the history API and fires `popstate`.
	fn supports_history(&self) -> bool {
		true
	}

	fn add_listener(&self, event_type: HostEventType, listener: Listener) -> ListenerId;

	/// Removes a listener. Unknown ids are ignored.
	fn remove_listener(&self, id: ListenerId);
}

/// Type alias for a shared host.
pub type SharedHost = Arc<dyn Host>;
