// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Loom browser goal tracking.
//!
//! This crate provides the goal definitions fetched from the server and the
//! pure matchers used to evaluate them. It has no async or network
//! dependencies and is shared by the goal manager (`loom-goals`) and any host
//! that wants to evaluate goals directly.
//!
//! # Overview
//!
//! - [`GoalSet`] parses and validates the goals payload into [`Goal`] variants
//! - [`CompiledRule`] and [`UrlNormalization`] implement URL matching
//! - [`SelectorList`] and [`ClickMatcher`] implement click matching against an
//!   [`EventPath`]
//! - [`CompiledGoalSet`] bundles a goal set's matchers, skipping goals whose
//!   patterns fail to compile
//! - [`Document`] is an in-memory element tree for headless hosts
//!
//! # Example
//!
//! ```
//! use loom_goals_core::{CompiledGoalSet, GoalSet, UrlNormalization};
//!
//! let payload = r#"[
//!     {"key": "g1", "kind": "url", "urlMatcher": {"type": "exact", "url": "https://example.com/thanks"}}
//! ]"#;
//!
//! let (goals, rejected) = GoalSet::from_json(payload).unwrap();
//! assert!(rejected.is_empty());
//!
//! let (compiled, skipped) = CompiledGoalSet::compile(&goals, UrlNormalization::default());
//! assert!(skipped.is_empty());
//!
//! let hits: Vec<&str> = compiled
//!     .matching_url_goals("https://example.com/thanks#confirmed")
//!     .collect();
//! assert_eq!(hits, vec!["g1"]);
//! ```

pub mod click_matcher;
pub mod compiled;
pub mod dom;
pub mod element;
pub mod error;
pub mod event;
pub mod goal;
pub mod selector;
pub mod url_matcher;

pub use click_matcher::ClickMatcher;
pub use compiled::{ClickHit, CompiledClickGoal, CompiledGoalSet, CompiledUrlGoal, SkippedGoal};
pub use dom::{Document, NodeId};
pub use element::{ElementData, EventPath};
pub use error::{GoalParseError, PatternError, Result};
pub use event::{MatchEvent, MatchKind};
pub use goal::{
	ClickGoal, CustomGoal, Goal, GoalKind, GoalSet, MatchRule, MatchRuleKind, RejectedGoal, UrlGoal,
};
pub use selector::SelectorList;
pub use url_matcher::{url_matches, CompiledRule, UrlNormalization};
