// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-shot readiness signal.

use std::future::IntoFuture;

use futures::future::BoxFuture;
use tokio::sync::watch;

/// Resolves once the goal manager has finished starting, whatever the outcome.
///
/// Handles are cheap to clone and can be awaited any number of times:
///
/// ```ignore
/// manager.ready().await;
/// ```
#[derive(Debug, Clone)]
pub struct GoalsReady {
	receiver: watch::Receiver<bool>,
}

impl GoalsReady {
	pub(crate) fn new(receiver: watch::Receiver<bool>) -> Self {
		Self { receiver }
	}

	pub fn is_ready(&self) -> bool {
		*self.receiver.borrow()
	}

	/// Waits for readiness. Also returns if the manager is dropped first.
	pub async fn wait(&self) {
		let mut receiver = self.receiver.clone();
		let _ = receiver.wait_for(|ready| *ready).await;
	}
}

impl IntoFuture for GoalsReady {
	type Output = ();
	type IntoFuture = BoxFuture<'static, ()>;

	fn into_future(self) -> Self::IntoFuture {
		Box::pin(async move {
			let mut receiver = self.receiver;
			let _ = receiver.wait_for(|ready| *ready).await;
		})
	}
}
