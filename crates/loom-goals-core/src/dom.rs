// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! An arena-backed element tree for headless hosts and tests.
//!
//! The tree models only what goal tracking observes: element identity, the
//! parent chain, and selector-relevant attributes. Creating an element leaves
//! it detached until it is appended under a connected node.

use crate::element::{ElementData, EventPath};
use crate::selector::SelectorList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
	data: ElementData,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}

/// A document with an `<html>` root and a `<body>`.
#[derive(Debug, Clone)]
pub struct Document {
	nodes: Vec<Node>,
	body: NodeId,
}

impl Document {
	pub fn new() -> Self {
		let mut doc = Self {
			nodes: vec![Node {
				data: ElementData::new("html"),
				parent: None,
				children: Vec::new(),
			}],
			body: NodeId(0),
		};
		doc.body = doc.append(doc.root(), ElementData::new("body"));
		doc
	}

	pub fn root(&self) -> NodeId {
		NodeId(0)
	}

	pub fn body(&self) -> NodeId {
		self.body
	}

	/// Creates a detached element.
	pub fn create_element(&mut self, data: ElementData) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(Node {
			data,
			parent: None,
			children: Vec::new(),
		});
		id
	}

	/// Creates an element and appends it under `parent`.
	pub fn append(&mut self, parent: NodeId, data: ElementData) -> NodeId {
		let id = self.create_element(data);
		self.append_child(parent, id);
		id
	}

	/// Moves `child` under `parent`.
	///
	/// Returns false, leaving the tree unchanged, if either node is unknown,
	/// `child` is the root, or the move would make a node its own ancestor.
	pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
		if parent.0 >= self.nodes.len() || child.0 >= self.nodes.len() || child == self.root() {
			return false;
		}
		if self.ancestors(parent).any(|ancestor| ancestor == child) {
			return false;
		}

		self.detach(child);
		self.nodes[child.0].parent = Some(parent);
		self.nodes[parent.0].children.push(child);
		true
	}

	/// Detaches `node` (and its subtree) from its parent.
	pub fn remove(&mut self, node: NodeId) {
		if node.0 < self.nodes.len() && node != self.root() {
			self.detach(node);
		}
	}

	fn detach(&mut self, node: NodeId) {
		if let Some(parent) = self.nodes[node.0].parent.take() {
			self.nodes[parent.0].children.retain(|&c| c != node);
		}
	}

	pub fn element(&self, node: NodeId) -> Option<&ElementData> {
		self.nodes.get(node.0).map(|n| &n.data)
	}

	pub fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
		self.nodes.get_mut(node.0).map(|n| &mut n.data)
	}

	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.nodes.get(node.0).and_then(|n| n.parent)
	}

	pub fn children(&self, node: NodeId) -> &[NodeId] {
		self.nodes
			.get(node.0)
			.map(|n| n.children.as_slice())
			.unwrap_or(&[])
	}

	/// Iterates `node` and then each of its ancestors.
	fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
		std::iter::successors(
			(node.0 < self.nodes.len()).then_some(node),
			move |&n| self.nodes[n.0].parent,
		)
	}

	/// Returns true if `node` is reachable from the root.
	pub fn is_connected(&self, node: NodeId) -> bool {
		self.ancestors(node).last() == Some(self.root())
	}

	/// The composed path a click on `node` would carry.
	pub fn event_path(&self, node: NodeId) -> EventPath {
		let elements: Vec<ElementData> = self
			.ancestors(node)
			.map(|n| self.nodes[n.0].data.clone())
			.collect();

		if self.is_connected(node) {
			EventPath::connected(elements)
		} else {
			EventPath::detached(elements)
		}
	}

	/// Connected elements matching `selector`, in document order.
	pub fn query_selector_all(&self, selector: &SelectorList) -> Vec<NodeId> {
		let mut found = Vec::new();
		let mut stack = vec![self.root()];
		while let Some(node) = stack.pop() {
			let path = self.event_path(node);
			if selector.matches_at(path.elements(), 0) {
				found.push(node);
			}
			stack.extend(self.children(node).iter().rev().copied());
		}
		found
	}
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}
