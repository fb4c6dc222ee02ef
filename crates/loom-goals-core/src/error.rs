// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for goal parsing and matcher compilation.

use thiserror::Error;

/// Result type alias for goal core operations.
pub type Result<T> = std::result::Result<T, GoalParseError>;

/// Errors raised while turning a goals payload into a [`GoalSet`](crate::GoalSet).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GoalParseError {
	/// The payload is not valid JSON.
	#[error("goals payload is not valid JSON: {0}")]
	InvalidJson(String),

	/// The payload is valid JSON but not an array of goals.
	#[error("goals payload must be a JSON array, got {0}")]
	NotAnArray(&'static str),
}

/// Errors raised while compiling a single goal's matchers.
///
/// A pattern error disables only the goal that carries the pattern.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
	/// A `regex` URL rule failed to compile.
	#[error("invalid regex `{pattern}`: {message}")]
	InvalidRegex { pattern: String, message: String },

	/// A CSS selector could not be parsed.
	#[error("invalid selector `{selector}`: {message}")]
	InvalidSelector { selector: String, message: String },

	/// A CSS selector uses syntax the click matcher does not evaluate.
	#[error("unsupported selector `{selector}`: {feature} is not supported")]
	UnsupportedSelector {
		selector: String,
		feature: &'static str,
	},

	/// A rule or selector was empty.
	#[error("empty pattern")]
	EmptyPattern,
}
