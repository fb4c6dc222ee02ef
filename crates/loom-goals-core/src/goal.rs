// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Goal definitions and the goals wire format.
//!
//! The goals endpoint returns a loosely shaped JSON array. Each entry is
//! validated exactly once here and turned into a [`Goal`] variant; entries that
//! cannot be validated are reported as [`RejectedGoal`]s and never reach the
//! matchers.
//!
//! # Wire format
//!
//! ```json
//! [
//!   { "key": "g1", "kind": "url", "urlMatcher": { "type": "exact", "url": "https://example.com/thanks" } },
//!   { "key": "g2", "kind": "click", "selector": [".buy-button"] },
//!   { "key": "g3", "kind": "pageview", "urls": [{ "kind": "substring", "substring": "/docs" }] },
//!   { "key": "g4", "kind": "custom" }
//! ]
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GoalParseError, Result};

/// How a [`MatchRule`] compares its pattern with a candidate URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchRuleKind {
	/// The normalized URL equals the pattern.
	Exact,
	/// The pattern appears anywhere in the normalized URL.
	Substring,
	/// The pattern is a regular expression searched in the normalized URL.
	Regex,
	/// Like `Exact`, but the query string is always ignored.
	Canonical,
}

impl MatchRuleKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			MatchRuleKind::Exact => "exact",
			MatchRuleKind::Substring => "substring",
			MatchRuleKind::Regex => "regex",
			MatchRuleKind::Canonical => "canonical",
		}
	}
}

impl fmt::Display for MatchRuleKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for MatchRuleKind {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"exact" => Ok(MatchRuleKind::Exact),
			"substring" => Ok(MatchRuleKind::Substring),
			"regex" => Ok(MatchRuleKind::Regex),
			"canonical" | "simple" => Ok(MatchRuleKind::Canonical),
			other => Err(format!("unknown URL match type `{other}`")),
		}
	}
}

/// A URL match rule attached to a goal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchRule {
	pub kind: MatchRuleKind,
	pub pattern: String,
}

impl MatchRule {
	pub fn new(kind: MatchRuleKind, pattern: impl Into<String>) -> Self {
		Self {
			kind,
			pattern: pattern.into(),
		}
	}

	pub fn exact(url: impl Into<String>) -> Self {
		Self::new(MatchRuleKind::Exact, url)
	}

	pub fn canonical(url: impl Into<String>) -> Self {
		Self::new(MatchRuleKind::Canonical, url)
	}

	pub fn substring(substring: impl Into<String>) -> Self {
		Self::new(MatchRuleKind::Substring, substring)
	}

	pub fn regex(pattern: impl Into<String>) -> Self {
		Self::new(MatchRuleKind::Regex, pattern)
	}
}

/// The discriminant of a [`Goal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
	Url,
	Click,
	Custom,
}

impl GoalKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			GoalKind::Url => "url",
			GoalKind::Click => "click",
			GoalKind::Custom => "custom",
		}
	}
}

/// A goal that fires when the page URL matches one of its rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlGoal {
	pub key: String,
	/// Never empty.
	pub rules: Vec<MatchRule>,
}

/// A goal that fires when an element matching one of its selectors is clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickGoal {
	pub key: String,
	/// Never empty, kept in declared order.
	pub selectors: Vec<String>,
	/// Pages on which the goal is armed. Empty means every page.
	pub rules: Vec<MatchRule>,
}

/// A goal recorded by explicit host events only; it has no matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomGoal {
	pub key: String,
}

/// A validated goal definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Goal {
	Url(UrlGoal),
	Click(ClickGoal),
	Custom(CustomGoal),
}

impl Goal {
	pub fn key(&self) -> &str {
		match self {
			Goal::Url(goal) => &goal.key,
			Goal::Click(goal) => &goal.key,
			Goal::Custom(goal) => &goal.key,
		}
	}

	pub fn kind(&self) -> GoalKind {
		match self {
			Goal::Url(_) => GoalKind::Url,
			Goal::Click(_) => GoalKind::Click,
			Goal::Custom(_) => GoalKind::Custom,
		}
	}

	/// Validates a single loosely typed goal entry.
	pub fn from_value(value: serde_json::Value) -> std::result::Result<Self, String> {
		let raw: RawGoal = serde_json::from_value(value).map_err(|e| e.to_string())?;
		raw.validate()
	}
}

/// A goal entry that was dropped during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedGoal {
	/// Position of the entry in the payload.
	pub index: usize,
	/// The entry's key, when it had a readable one.
	pub key: Option<String>,
	pub reason: String,
}

/// The complete, ordered collection of goals fetched for one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalSet {
	goals: Vec<Goal>,
	index: HashMap<String, usize>,
}

impl GoalSet {
	/// Creates an empty goal set.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Builds a goal set from validated goals, dropping later duplicates of a key.
	pub fn from_goals(goals: Vec<Goal>) -> (Self, Vec<RejectedGoal>) {
		let mut set = GoalSet::default();
		let mut rejected = Vec::new();

		for (index, goal) in goals.into_iter().enumerate() {
			if set.index.contains_key(goal.key()) {
				rejected.push(RejectedGoal {
					index,
					key: Some(goal.key().to_string()),
					reason: "duplicate goal key".to_string(),
				});
				continue;
			}
			set.index.insert(goal.key().to_string(), set.goals.len());
			set.goals.push(goal);
		}

		(set, rejected)
	}

	/// Parses a goals payload.
	///
	/// The payload as a whole must be a JSON array; individual entries that fail
	/// validation are returned as rejections instead of failing the parse.
	pub fn from_json(payload: &str) -> Result<(Self, Vec<RejectedGoal>)> {
		let value: serde_json::Value =
			serde_json::from_str(payload).map_err(|e| GoalParseError::InvalidJson(e.to_string()))?;
		Self::from_value(value)
	}

	/// Parses an already decoded goals payload.
	pub fn from_value(value: serde_json::Value) -> Result<(Self, Vec<RejectedGoal>)> {
		let entries = match value {
			serde_json::Value::Array(entries) => entries,
			serde_json::Value::Null => Vec::new(),
			other => return Err(GoalParseError::NotAnArray(json_type_name(&other))),
		};

		let mut goals = Vec::with_capacity(entries.len());
		let mut rejected = Vec::new();
		let mut positions = Vec::with_capacity(entries.len());

		for (index, entry) in entries.into_iter().enumerate() {
			let key = entry
				.get("key")
				.and_then(|k| k.as_str())
				.map(str::to_string);
			match Goal::from_value(entry) {
				Ok(goal) => {
					positions.push(index);
					goals.push(goal);
				}
				Err(reason) => rejected.push(RejectedGoal { index, key, reason }),
			}
		}

		let (set, mut duplicates) = Self::from_goals(goals);
		for dup in &mut duplicates {
			dup.index = positions[dup.index];
		}
		rejected.extend(duplicates);
		rejected.sort_by_key(|r| r.index);

		Ok((set, rejected))
	}

	/// Returns true if a goal with this key is present. O(1).
	pub fn contains_key(&self, key: &str) -> bool {
		self.index.contains_key(key)
	}

	pub fn get(&self, key: &str) -> Option<&Goal> {
		self.index.get(key).map(|&i| &self.goals[i])
	}

	pub fn iter(&self) -> impl Iterator<Item = &Goal> {
		self.goals.iter()
	}

	pub fn len(&self) -> usize {
		self.goals.len()
	}

	pub fn is_empty(&self) -> bool {
		self.goals.is_empty()
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.goals.iter().map(Goal::key)
	}
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
	match value {
		serde_json::Value::Null => "null",
		serde_json::Value::Bool(_) => "boolean",
		serde_json::Value::Number(_) => "number",
		serde_json::Value::String(_) => "string",
		serde_json::Value::Array(_) => "array",
		serde_json::Value::Object(_) => "object",
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGoal {
	key: Option<String>,
	kind: Option<String>,
	url_matcher: Option<RawMatchRule>,
	#[serde(default)]
	urls: Vec<RawMatchRule>,
	selector: Option<RawSelector>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSelector {
	One(String),
	Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawMatchRule {
	#[serde(rename = "type", alias = "kind")]
	rule_type: Option<String>,
	url: Option<String>,
	pattern: Option<String>,
	substring: Option<String>,
}

impl RawMatchRule {
	fn validate(self) -> std::result::Result<MatchRule, String> {
		let kind: MatchRuleKind = self
			.rule_type
			.as_deref()
			.ok_or_else(|| "URL matcher is missing its type".to_string())?
			.parse()?;

		let pattern = match kind {
			MatchRuleKind::Exact | MatchRuleKind::Canonical => self.url.or(self.pattern),
			MatchRuleKind::Substring => self.substring.or(self.pattern).or(self.url),
			MatchRuleKind::Regex => self.pattern.or(self.url),
		};

		match pattern {
			Some(pattern) if !pattern.is_empty() => Ok(MatchRule { kind, pattern }),
			_ => Err(format!("{kind} URL matcher has no pattern")),
		}
	}
}

impl RawGoal {
	fn validate(self) -> std::result::Result<Goal, String> {
		let key = match self.key {
			Some(key) if !key.is_empty() => key,
			_ => return Err("goal has no key".to_string()),
		};

		let mut rules = Vec::with_capacity(self.urls.len() + 1);
		if let Some(rule) = self.url_matcher {
			rules.push(rule.validate()?);
		}
		for rule in self.urls {
			rules.push(rule.validate()?);
		}

		match self.kind.as_deref() {
			Some("url") | Some("pageview") => {
				if rules.is_empty() {
					return Err("url goal has no URL matcher".to_string());
				}
				Ok(Goal::Url(UrlGoal { key, rules }))
			}
			Some("click") => {
				let selectors: Vec<String> = match self.selector {
					Some(RawSelector::One(s)) => vec![s],
					Some(RawSelector::Many(list)) => list,
					None => Vec::new(),
				}
				.into_iter()
				.map(|s| s.trim().to_string())
				.filter(|s| !s.is_empty())
				.collect();

				if selectors.is_empty() {
					return Err("click goal has no selector".to_string());
				}
				Ok(Goal::Click(ClickGoal {
					key,
					selectors,
					rules,
				}))
			}
			Some("custom") => Ok(Goal::Custom(CustomGoal { key })),
			Some(other) => Err(format!("unknown goal kind `{other}`")),
			None => Err("goal has no kind".to_string()),
		}
	}
}
