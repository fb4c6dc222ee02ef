// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Click matching for `click` goals.

use crate::element::EventPath;
use crate::error::PatternError;
use crate::selector::SelectorList;

/// The compiled selectors of one click goal, in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickMatcher {
	selectors: Vec<SelectorList>,
}

impl ClickMatcher {
	/// Compiles every selector. One bad selector fails the whole matcher.
	pub fn compile<S: AsRef<str>>(selectors: &[S]) -> Result<Self, PatternError> {
		if selectors.is_empty() {
			return Err(PatternError::EmptyPattern);
		}

		let selectors = selectors
			.iter()
			.map(|s| SelectorList::parse(s.as_ref()))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self { selectors })
	}

	/// Returns the first selector that the click target or one of its
	/// ancestors satisfies. Detached targets never match.
	pub fn first_match(&self, path: &EventPath) -> Option<&str> {
		if !path.is_connected() {
			return None;
		}

		self.selectors
			.iter()
			.find(|selector| selector.matches_path(path))
			.map(SelectorList::source)
	}

	pub fn selectors(&self) -> impl Iterator<Item = &str> {
		self.selectors.iter().map(SelectorList::source)
	}
}
