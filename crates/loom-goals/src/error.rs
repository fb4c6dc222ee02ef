// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the goal tracking SDK.

use loom_goals_core::GoalParseError;
use thiserror::Error;

/// Result type alias for the goal tracking SDK.
pub type Result<T> = std::result::Result<T, GoalsError>;

/// Errors that can occur in the goal tracking SDK.
///
/// Only builder validation errors ever reach the host; fetch errors are
/// absorbed by the goal manager. Invalid goal patterns are reported per goal
/// by [`CompiledGoalSet::compile`](loom_goals_core::CompiledGoalSet::compile).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GoalsError {
	/// Environment key is missing or empty.
	#[error("Invalid or missing environment key")]
	InvalidEnvironmentKey,

	/// Base URL is missing or cannot host the goals endpoint.
	#[error("Invalid or missing base URL: {0}")]
	InvalidBaseUrl(String),

	/// Goal tracking is enabled but no host was supplied.
	#[error("Goal tracking requires a host")]
	MissingHost,

	/// Goal tracking is enabled outside of a tokio runtime.
	#[error("Goal tracking must be started from within a tokio runtime")]
	NoRuntime,

	/// Failed to build the HTTP client.
	#[error("Failed to build HTTP client: {0}")]
	ClientBuild(String),

	/// The goals request could not be completed.
	#[error("Failed to fetch goals: {0}")]
	Network(String),

	/// Server returned an error response.
	#[error("Server returned an error: {status} - {message}")]
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Error message from server.
		message: String,
	},

	/// The goals payload is malformed.
	#[error("Failed to parse goals payload: {0}")]
	Parse(String),
}

impl From<GoalParseError> for GoalsError {
	fn from(err: GoalParseError) -> Self {
		GoalsError::Parse(err.to_string())
	}
}

impl GoalsError {
	/// Returns true if this error came from the transport.
	pub fn is_network(&self) -> bool {
		matches!(
			self,
			GoalsError::Network(_) | GoalsError::ServerError { .. }
		)
	}

	/// Returns true if a later attempt could succeed.
	pub fn is_retryable(&self) -> bool {
		match self {
			GoalsError::Network(_) => true,
			GoalsError::ServerError { status, .. } => {
				matches!(*status, 408 | 429 | 500 | 502 | 503 | 504)
			}
			_ => false,
		}
	}
}
