// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Goal sets compiled into ready-to-run matchers.
//!
//! Compilation happens once per fetched [`GoalSet`]. Regexes and selectors are
//! parsed up front; a goal whose pattern fails to compile is reported as a
//! [`SkippedGoal`] and left out, so it can never block the goals around it.

use crate::click_matcher::ClickMatcher;
use crate::element::EventPath;
use crate::error::PatternError;
use crate::goal::{Goal, GoalSet, MatchRule};
use crate::url_matcher::{CompiledRule, UrlNormalization};

/// A goal left out of a compiled set because one of its patterns is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedGoal {
	pub key: String,
	pub error: PatternError,
}

#[derive(Debug, Clone)]
pub struct CompiledUrlGoal {
	pub key: String,
	rules: Vec<CompiledRule>,
}

impl CompiledUrlGoal {
	pub fn matches(&self, url: &str, policy: &UrlNormalization) -> bool {
		self.rules.iter().any(|rule| rule.matches(url, policy))
	}
}

#[derive(Debug, Clone)]
pub struct CompiledClickGoal {
	pub key: String,
	matcher: ClickMatcher,
	scope: Vec<CompiledRule>,
}

impl CompiledClickGoal {
	/// Returns true if the goal listens for clicks on the page at `url`.
	pub fn is_armed_for(&self, url: &str, policy: &UrlNormalization) -> bool {
		self.scope.is_empty() || self.scope.iter().any(|rule| rule.matches(url, policy))
	}

	pub fn matcher(&self) -> &ClickMatcher {
		&self.matcher
	}
}

/// A clicked goal and the selector that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickHit<'a> {
	pub key: &'a str,
	pub selector: &'a str,
}

/// All matchable goals of one goal set.
#[derive(Debug, Clone, Default)]
pub struct CompiledGoalSet {
	url_goals: Vec<CompiledUrlGoal>,
	click_goals: Vec<CompiledClickGoal>,
	policy: UrlNormalization,
}

impl CompiledGoalSet {
	pub fn compile(set: &GoalSet, policy: UrlNormalization) -> (Self, Vec<SkippedGoal>) {
		let mut compiled = CompiledGoalSet {
			policy,
			..Default::default()
		};
		let mut skipped = Vec::new();

		for goal in set.iter() {
			let result = match goal {
				Goal::Url(goal) => compile_rules(&goal.rules).map(|rules| {
					compiled.url_goals.push(CompiledUrlGoal {
						key: goal.key.clone(),
						rules,
					});
				}),
				Goal::Click(goal) => ClickMatcher::compile(goal.selectors.as_slice())
					.and_then(|matcher| Ok((matcher, compile_rules(&goal.rules)?)))
					.map(|(matcher, scope)| {
						compiled.click_goals.push(CompiledClickGoal {
							key: goal.key.clone(),
							matcher,
							scope,
						});
					}),
				Goal::Custom(_) => Ok(()),
			};

			if let Err(error) = result {
				skipped.push(SkippedGoal {
					key: goal.key().to_string(),
					error,
				});
			}
		}

		(compiled, skipped)
	}

	pub fn policy(&self) -> &UrlNormalization {
		&self.policy
	}

	pub fn url_goals(&self) -> &[CompiledUrlGoal] {
		&self.url_goals
	}

	pub fn click_goals(&self) -> &[CompiledClickGoal] {
		&self.click_goals
	}

	pub fn has_click_goals(&self) -> bool {
		!self.click_goals.is_empty()
	}

	pub fn is_empty(&self) -> bool {
		self.url_goals.is_empty() && self.click_goals.is_empty()
	}

	/// Keys of every `url` goal matching `url`, in goal-set order.
	pub fn matching_url_goals<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a str> + 'a {
		self.url_goals
			.iter()
			.filter(move |goal| goal.matches(url, &self.policy))
			.map(|goal| goal.key.as_str())
	}

	/// Indices into [`click_goals`](Self::click_goals) armed on the page at `url`.
	pub fn armed_click_goals(&self, url: &str) -> Vec<usize> {
		self.click_goals
			.iter()
			.enumerate()
			.filter(|(_, goal)| goal.is_armed_for(url, &self.policy))
			.map(|(i, _)| i)
			.collect()
	}

	/// Evaluates one click against the armed goals. Each goal yields at most one hit.
	pub fn click_hits<'a>(&'a self, armed: &[usize], path: &EventPath) -> Vec<ClickHit<'a>> {
		armed
			.iter()
			.filter_map(|&i| self.click_goals.get(i))
			.filter_map(|goal| {
				goal.matcher.first_match(path).map(|selector| ClickHit {
					key: &goal.key,
					selector,
				})
			})
			.collect()
	}
}

fn compile_rules(rules: &[MatchRule]) -> Result<Vec<CompiledRule>, PatternError> {
	rules.iter().map(CompiledRule::compile).collect()
}
