// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Element snapshots and event paths.
//!
//! Hosts capture the composed path of a DOM event (target first, document root
//! last) as a list of [`ElementData`] snapshots. Selector matching only ever
//! looks at an element and its ancestors, so the path carries everything the
//! click matcher needs.

use std::collections::BTreeMap;

/// The selector-relevant state of one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
	/// Lowercase tag name.
	pub tag_name: String,
	pub id: Option<String>,
	pub classes: Vec<String>,
	pub attributes: BTreeMap<String, String>,
}

impl ElementData {
	pub fn new(tag_name: impl Into<String>) -> Self {
		Self {
			tag_name: tag_name.into().to_ascii_lowercase(),
			..Self::default()
		}
	}

	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		let id = id.into();
		self.attributes.insert("id".to_string(), id.clone());
		self.id = Some(id);
		self
	}

	pub fn with_class(mut self, class: impl Into<String>) -> Self {
		let class = class.into();
		if !self.classes.contains(&class) {
			self.classes.push(class);
		}
		self.attributes
			.insert("class".to_string(), self.classes.join(" "));
		self
	}

	/// Sets an attribute. `id` and `class` also update the dedicated fields.
	pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		let name = name.into().to_ascii_lowercase();
		let value = value.into();
		match name.as_str() {
			"id" => return self.with_id(value),
			"class" => {
				self.classes = value.split_ascii_whitespace().map(str::to_string).collect();
			}
			_ => {}
		}
		self.attributes.insert(name, value);
		self
	}

	pub fn has_class(&self, class: &str) -> bool {
		self.classes.iter().any(|c| c == class)
	}

	pub fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes.get(name).map(String::as_str)
	}
}

/// The target-to-root element chain of a DOM event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPath {
	elements: Vec<ElementData>,
	connected: bool,
}

impl EventPath {
	/// Creates a path for a target attached to the document.
	///
	/// `elements[0]` is the event target and the last element is the document
	/// root.
	pub fn connected(elements: Vec<ElementData>) -> Self {
		Self {
			elements,
			connected: true,
		}
	}

	/// Creates a path for a target that is not attached to the document.
	pub fn detached(elements: Vec<ElementData>) -> Self {
		Self {
			elements,
			connected: false,
		}
	}

	pub fn is_connected(&self) -> bool {
		self.connected
	}

	pub fn target(&self) -> Option<&ElementData> {
		self.elements.first()
	}

	pub fn elements(&self) -> &[ElementData] {
		&self.elements
	}

	pub fn len(&self) -> usize {
		self.elements.len()
	}

	pub fn is_empty(&self) -> bool {
		self.elements.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builder_keeps_id_and_class_attributes_in_sync() {
		let el = ElementData::new("BUTTON")
			.with_id("buy")
			.with_class("btn")
			.with_class("primary")
			.with_class("btn");

		assert_eq!(el.tag_name, "button");
		assert_eq!(el.id.as_deref(), Some("buy"));
		assert_eq!(el.classes, vec!["btn", "primary"]);
		assert_eq!(el.attribute("class"), Some("btn primary"));
		assert_eq!(el.attribute("id"), Some("buy"));
	}

	#[test]
	fn class_attribute_splits_into_classes() {
		let el = ElementData::new("div").with_attribute("class", " a  b ");
		assert!(el.has_class("a"));
		assert!(el.has_class("b"));
		assert!(!el.has_class("a b"));
	}

	#[test]
	fn path_target_is_first_element() {
		let path = EventPath::connected(vec![ElementData::new("span"), ElementData::new("html")]);
		assert_eq!(path.target().map(|e| e.tag_name.as_str()), Some("span"));
		assert!(path.is_connected());
		assert!(!EventPath::detached(vec![]).is_connected());
	}
}
