// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Goal hit records forwarded to the host event pipeline.
//!
//! A [`MatchEvent`] is produced whenever a live page interaction satisfies a
//! goal. The host SDK converts it into its own event envelope; the analytics
//! properties produced by [`MatchEvent::to_event_properties`] are:
//!
//! | Property | Description |
//! |----------|-------------|
//! | `$goal_key` | The matched goal's key |
//! | `$goal_kind` | `pageview` or `click` |
//! | `$current_url` | The page URL at match time |
//! | `$selector` | The matching selector (click goals only) |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of interaction satisfied the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
	/// The page URL matched a `url` goal.
	Pageview,
	/// A click matched a `click` goal.
	Click,
}

impl MatchKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			MatchKind::Pageview => "pageview",
			MatchKind::Click => "click",
		}
	}
}

/// A goal hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
	pub kind: MatchKind,
	pub goal_key: String,
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub selector: Option<String>,
	pub creation_date: DateTime<Utc>,
}

impl MatchEvent {
	pub fn pageview(goal_key: impl Into<String>, url: impl Into<String>) -> Self {
		Self {
			kind: MatchKind::Pageview,
			goal_key: goal_key.into(),
			url: url.into(),
			selector: None,
			creation_date: Utc::now(),
		}
	}

	pub fn click(
		goal_key: impl Into<String>,
		url: impl Into<String>,
		selector: impl Into<String>,
	) -> Self {
		Self {
			kind: MatchKind::Click,
			goal_key: goal_key.into(),
			url: url.into(),
			selector: Some(selector.into()),
			creation_date: Utc::now(),
		}
	}

	/// Converts this hit to analytics event properties.
	pub fn to_event_properties(&self) -> serde_json::Value {
		let mut props = serde_json::json!({
			"$goal_key": self.goal_key,
			"$goal_kind": self.kind.as_str(),
			"$current_url": self.url,
		});
		if let Some(selector) = &self.selector {
			props["$selector"] = serde_json::json!(selector);
		}
		props
	}
}
