// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A small CSS selector engine evaluated against [`EventPath`] ancestors.
//!
//! Supported syntax:
//!
//! - selector groups: `a, b`
//! - type and universal selectors: `button`, `*`
//! - `#id`, `.class`
//! - attribute selectors: `[a]`, `[a=v]`, `[a~=v]`, `[a|=v]`, `[a^=v]`,
//!   `[a$=v]`, `[a*=v]`, with bare or quoted values and an optional `i` flag
//! - descendant (whitespace) and child (`>`) combinators
//!
//! Sibling combinators and pseudo-classes need information an event path does
//! not carry and are rejected with [`PatternError::UnsupportedSelector`].

use std::fmt;
use std::str::FromStr;

use crate::element::{ElementData, EventPath};
use crate::error::PatternError;

/// A parsed selector group such as `.buy, #checkout > a`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
	source: String,
	selectors: Vec<ComplexSelector>,
}

impl SelectorList {
	pub fn parse(source: &str) -> Result<Self, PatternError> {
		let trimmed = source.trim();
		if trimmed.is_empty() {
			return Err(PatternError::EmptyPattern);
		}

		let selectors = Parser::new(trimmed).parse_list()?;
		Ok(Self {
			source: trimmed.to_string(),
			selectors,
		})
	}

	/// The selector text as declared (trimmed).
	pub fn source(&self) -> &str {
		&self.source
	}

	/// Returns true if `path.elements()[index]` matches any selector in the group.
	pub fn matches_at(&self, path: &[ElementData], index: usize) -> bool {
		index < path.len()
			&& self.selectors.iter().any(|selector| {
				let mut memo = FailureMemo::new(path.len(), selector.compounds.len());
				selector.matches_at(path, index, &mut memo)
			})
	}

	/// Returns true if the path's target or any of its ancestors matches.
	pub fn matches_path(&self, path: &EventPath) -> bool {
		if !path.is_connected() {
			return false;
		}
		let elements = path.elements();
		self.selectors.iter().any(|selector| {
			// Failures depend only on (element, compound), so one memo serves every start index.
			let mut memo = FailureMemo::new(elements.len(), selector.compounds.len());
			(0..elements.len()).any(|i| selector.matches_at(elements, i, &mut memo))
		})
	}
}

impl FromStr for SelectorList {
	type Err = PatternError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl fmt::Display for SelectorList {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.source)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
	Descendant,
	Child,
}

/// Compound selectors stored right to left; `combinators[i]` joins
/// `compounds[i]` to `compounds[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
	compounds: Vec<Compound>,
	combinators: Vec<Combinator>,
}

impl ComplexSelector {
	fn matches_at(&self, path: &[ElementData], index: usize, memo: &mut FailureMemo) -> bool {
		self.compounds[0].matches(&path[index]) && self.match_from(path, index, 1, memo)
	}

	/// Returns true if compounds `compound..` match ancestors of `path[index]`.
	fn match_from(
		&self,
		path: &[ElementData],
		index: usize,
		compound: usize,
		memo: &mut FailureMemo,
	) -> bool {
		if compound == self.compounds.len() {
			return true;
		}
		if memo.has_failed(index, compound) {
			return false;
		}

		let next = &self.compounds[compound];
		let matched = match self.combinators[compound - 1] {
			Combinator::Child => {
				let parent = index + 1;
				parent < path.len()
					&& next.matches(&path[parent])
					&& self.match_from(path, parent, compound + 1, memo)
			}
			Combinator::Descendant => (index + 1..path.len()).any(|ancestor| {
				next.matches(&path[ancestor]) && self.match_from(path, ancestor, compound + 1, memo)
			}),
		};

		if !matched {
			memo.mark_failed(index, compound);
		}
		matched
	}
}

/// `(element index, compound index)` pairs known not to match, which keeps
/// descendant backtracking at O(depth * compounds).
struct FailureMemo {
	compounds: usize,
	failed: Vec<bool>,
}

impl FailureMemo {
	fn new(depth: usize, compounds: usize) -> Self {
		Self {
			compounds,
			failed: vec![false; depth * compounds],
		}
	}

	fn has_failed(&self, index: usize, compound: usize) -> bool {
		self.failed[index * self.compounds + compound]
	}

	fn mark_failed(&mut self, index: usize, compound: usize) {
		self.failed[index * self.compounds + compound] = true;
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
	tag: Option<String>,
	ids: Vec<String>,
	classes: Vec<String>,
	attributes: Vec<AttributeSelector>,
}

impl Compound {
	fn matches(&self, element: &ElementData) -> bool {
		if let Some(tag) = &self.tag {
			if *tag != element.tag_name {
				return false;
			}
		}
		self.ids.iter().all(|id| element.id.as_deref() == Some(id.as_str()))
			&& self.classes.iter().all(|class| element.has_class(class))
			&& self.attributes.iter().all(|attr| attr.matches(element))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeOperator {
	Equals,
	Includes,
	DashMatch,
	Prefix,
	Suffix,
	Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeSelector {
	name: String,
	test: Option<(AttributeOperator, String)>,
	case_insensitive: bool,
}

impl AttributeSelector {
	fn matches(&self, element: &ElementData) -> bool {
		let Some(actual) = element.attribute(&self.name) else {
			return false;
		};
		let Some((op, expected)) = &self.test else {
			return true;
		};

		let (actual, expected) = if self.case_insensitive {
			(actual.to_lowercase(), expected.to_lowercase())
		} else {
			(actual.to_string(), expected.clone())
		};

		match op {
			AttributeOperator::Equals => actual == expected,
			AttributeOperator::Includes => {
				!expected.is_empty()
					&& !expected.contains(char::is_whitespace)
					&& actual.split_ascii_whitespace().any(|word| word == expected)
			}
			AttributeOperator::DashMatch => {
				actual == expected || actual.starts_with(&format!("{expected}-"))
			}
			AttributeOperator::Prefix => !expected.is_empty() && actual.starts_with(&expected),
			AttributeOperator::Suffix => !expected.is_empty() && actual.ends_with(&expected),
			AttributeOperator::Substring => !expected.is_empty() && actual.contains(&expected),
		}
	}
}

struct Parser<'a> {
	source: &'a str,
	chars: Vec<char>,
	pos: usize,
}

impl<'a> Parser<'a> {
	fn new(source: &'a str) -> Self {
		Self {
			source,
			chars: source.chars().collect(),
			pos: 0,
		}
	}

	fn invalid(&self, message: impl Into<String>) -> PatternError {
		PatternError::InvalidSelector {
			selector: self.source.to_string(),
			message: message.into(),
		}
	}

	fn unsupported(&self, feature: &'static str) -> PatternError {
		PatternError::UnsupportedSelector {
			selector: self.source.to_string(),
			feature,
		}
	}

	fn peek(&self) -> Option<char> {
		self.chars.get(self.pos).copied()
	}

	fn bump(&mut self) -> Option<char> {
		let c = self.peek()?;
		self.pos += 1;
		Some(c)
	}

	/// Returns true if any whitespace was skipped.
	fn skip_whitespace(&mut self) -> bool {
		let start = self.pos;
		while self.peek().is_some_and(char::is_whitespace) {
			self.pos += 1;
		}
		self.pos > start
	}

	fn parse_list(&mut self) -> Result<Vec<ComplexSelector>, PatternError> {
		let mut selectors = Vec::new();
		loop {
			self.skip_whitespace();
			selectors.push(self.parse_complex()?);
			self.skip_whitespace();
			match self.bump() {
				None => return Ok(selectors),
				Some(',') => continue,
				Some(c) => return Err(self.invalid(format!("unexpected `{c}`"))),
			}
		}
	}

	fn parse_complex(&mut self) -> Result<ComplexSelector, PatternError> {
		let mut compounds = vec![self.parse_compound()?];
		let mut combinators = Vec::new();

		loop {
			let had_whitespace = self.skip_whitespace();
			match self.peek() {
				None | Some(',') => break,
				Some('>') => {
					self.pos += 1;
					self.skip_whitespace();
					combinators.push(Combinator::Child);
				}
				Some('+') | Some('~') => return Err(self.unsupported("sibling combinator")),
				Some(_) if had_whitespace => combinators.push(Combinator::Descendant),
				Some(c) => return Err(self.invalid(format!("unexpected `{c}`"))),
			}
			compounds.push(self.parse_compound()?);
		}

		compounds.reverse();
		combinators.reverse();
		Ok(ComplexSelector {
			compounds,
			combinators,
		})
	}

	fn parse_compound(&mut self) -> Result<Compound, PatternError> {
		let mut compound = Compound::default();
		let mut parsed_any = false;

		match self.peek() {
			Some('*') => {
				self.pos += 1;
				parsed_any = true;
			}
			Some(c) if is_ident_char(c) || c == '\\' => {
				compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
				parsed_any = true;
			}
			_ => {}
		}

		loop {
			match self.peek() {
				Some('#') => {
					self.pos += 1;
					compound.ids.push(self.parse_ident()?);
				}
				Some('.') => {
					self.pos += 1;
					compound.classes.push(self.parse_ident()?);
				}
				Some('[') => {
					self.pos += 1;
					compound.attributes.push(self.parse_attribute()?);
				}
				Some(':') => return Err(self.unsupported("pseudo-class")),
				_ => break,
			}
			parsed_any = true;
		}

		if parsed_any {
			Ok(compound)
		} else {
			match self.peek() {
				Some(c) => Err(self.invalid(format!("expected a selector, found `{c}`"))),
				None => Err(self.invalid("expected a selector")),
			}
		}
	}

	fn parse_ident(&mut self) -> Result<String, PatternError> {
		let mut ident = String::new();
		while let Some(c) = self.peek() {
			if c == '\\' {
				self.pos += 1;
				match self.bump() {
					Some(escaped) => ident.push(escaped),
					None => return Err(self.invalid("dangling escape")),
				}
			} else if is_ident_char(c) {
				self.pos += 1;
				ident.push(c);
			} else {
				break;
			}
		}

		if ident.is_empty() {
			Err(self.invalid("expected an identifier"))
		} else {
			Ok(ident)
		}
	}

	fn parse_attribute(&mut self) -> Result<AttributeSelector, PatternError> {
		self.skip_whitespace();
		let name = self.parse_ident()?.to_ascii_lowercase();
		self.skip_whitespace();

		let op = match self.bump() {
			Some(']') => {
				return Ok(AttributeSelector {
					name,
					test: None,
					case_insensitive: false,
				})
			}
			Some('=') => AttributeOperator::Equals,
			Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
				if self.bump() != Some('=') {
					return Err(self.invalid(format!("expected `=` after `{c}`")));
				}
				match c {
					'~' => AttributeOperator::Includes,
					'|' => AttributeOperator::DashMatch,
					'^' => AttributeOperator::Prefix,
					'$' => AttributeOperator::Suffix,
					_ => AttributeOperator::Substring,
				}
			}
			Some(c) => return Err(self.invalid(format!("unexpected `{c}` in attribute selector"))),
			None => return Err(self.invalid("unterminated attribute selector")),
		};

		self.skip_whitespace();
		let value = match self.peek() {
			Some(quote @ ('"' | '\'')) => {
				self.pos += 1;
				self.parse_quoted(quote)?
			}
			_ => self.parse_ident()?,
		};

		let had_whitespace = self.skip_whitespace();
		let mut case_insensitive = false;
		if had_whitespace {
			match self.peek() {
				Some('i') | Some('I') => {
					self.pos += 1;
					case_insensitive = true;
				}
				Some('s') | Some('S') => self.pos += 1,
				_ => {}
			}
			self.skip_whitespace();
		}

		match self.bump() {
			Some(']') => Ok(AttributeSelector {
				name,
				test: Some((op, value)),
				case_insensitive,
			}),
			_ => Err(self.invalid("unterminated attribute selector")),
		}
	}

	fn parse_quoted(&mut self, quote: char) -> Result<String, PatternError> {
		let mut value = String::new();
		loop {
			match self.bump() {
				Some('\\') => match self.bump() {
					Some(escaped) => value.push(escaped),
					None => return Err(self.invalid("dangling escape")),
				},
				Some(c) if c == quote => return Ok(value),
				Some(c) => value.push(c),
				None => return Err(self.invalid("unterminated string")),
			}
		}
	}
}

fn is_ident_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}
