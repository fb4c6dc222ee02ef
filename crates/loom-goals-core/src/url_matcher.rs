// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! URL matching for `url` goals and page-scoped `click` goals.
//!
//! Every candidate URL is normalized before comparison. The fragment is always
//! removed (unless [`UrlNormalization::keep_hash_routes`] applies), and the
//! query string is removed according to the rule kind:
//!
//! | Rule        | Query string                           |
//! |-------------|----------------------------------------|
//! | `exact`     | removed unless `!strip_query_for_exact` |
//! | `canonical` | always removed                         |
//! | `substring` | removed unless `!strip_query_for_patterns` |
//! | `regex`     | removed unless `!strip_query_for_patterns` |

use std::borrow::Cow;

use regex::{Regex, RegexBuilder};

use crate::error::PatternError;
use crate::goal::{MatchRule, MatchRuleKind};

const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Normalization policy applied to candidate URLs before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlNormalization {
	/// Remove the query string before `exact` comparisons.
	pub strip_query_for_exact: bool,
	/// Remove the query string before `substring` and `regex` matching.
	pub strip_query_for_patterns: bool,
	/// Keep fragments that look like hash routes (`#/path`) for `substring`
	/// and `regex` matching.
	pub keep_hash_routes: bool,
}

impl Default for UrlNormalization {
	fn default() -> Self {
		Self {
			strip_query_for_exact: true,
			strip_query_for_patterns: true,
			keep_hash_routes: false,
		}
	}
}

impl UrlNormalization {
	/// Returns the form of `url` that a rule of `kind` is compared against.
	pub fn normalize<'a>(&self, kind: MatchRuleKind, url: &'a str) -> Cow<'a, str> {
		let (without_fragment, fragment) = match url.split_once('#') {
			Some((base, fragment)) => (base, Some(fragment)),
			None => (url, None),
		};

		let strip_query = match kind {
			MatchRuleKind::Exact => self.strip_query_for_exact,
			MatchRuleKind::Canonical => true,
			MatchRuleKind::Substring | MatchRuleKind::Regex => self.strip_query_for_patterns,
		};
		let base = if strip_query {
			without_fragment
				.split_once('?')
				.map_or(without_fragment, |(path, _)| path)
		} else {
			without_fragment
		};

		let keep_fragment = self.keep_hash_routes
			&& matches!(kind, MatchRuleKind::Substring | MatchRuleKind::Regex);
		match fragment {
			Some(fragment) if keep_fragment && fragment.contains('/') => {
				Cow::Owned(format!("{base}#{fragment}"))
			}
			_ => Cow::Borrowed(base),
		}
	}
}

/// A match rule with its regex, if any, already compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
	rule: MatchRule,
	regex: Option<Regex>,
}

impl CompiledRule {
	/// Compiles a rule. Only `regex` rules can fail.
	pub fn compile(rule: &MatchRule) -> Result<Self, PatternError> {
		if rule.pattern.is_empty() {
			return Err(PatternError::EmptyPattern);
		}

		let regex = match rule.kind {
			MatchRuleKind::Regex => Some(
				RegexBuilder::new(&rule.pattern)
					.size_limit(REGEX_SIZE_LIMIT)
					.build()
					.map_err(|e| PatternError::InvalidRegex {
						pattern: rule.pattern.clone(),
						message: e.to_string(),
					})?,
			),
			_ => None,
		};

		Ok(Self {
			rule: rule.clone(),
			regex,
		})
	}

	pub fn rule(&self) -> &MatchRule {
		&self.rule
	}

	/// Returns true if `candidate` satisfies this rule under `policy`.
	pub fn matches(&self, candidate: &str, policy: &UrlNormalization) -> bool {
		let normalized = policy.normalize(self.rule.kind, candidate);
		let pattern = self.rule.pattern.as_str();

		match self.rule.kind {
			MatchRuleKind::Exact | MatchRuleKind::Canonical => {
				normalized == pattern || normalized.strip_suffix('/') == Some(pattern)
			}
			MatchRuleKind::Substring => normalized.contains(pattern),
			MatchRuleKind::Regex => self
				.regex
				.as_ref()
				.is_some_and(|regex| regex.is_match(&normalized)),
		}
	}
}

/// One-shot match of an uncompiled rule. Invalid regex rules never match.
pub fn url_matches(rule: &MatchRule, candidate: &str, policy: &UrlNormalization) -> bool {
	CompiledRule::compile(rule)
		.map(|compiled| compiled.matches(candidate, policy))
		.unwrap_or(false)
}
