// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loom_goals::{
	ElementData, GoalManager, GoalsError, GoalsState, GoalsTransport, HostEventType, MatchEvent,
	MatchKind, MemoryHost, NodeId, ReadyOutcome, Result,
};
use parking_lot::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FakeTransport {
	response: Result<String>,
	delay: Duration,
	calls: AtomicUsize,
}

impl FakeTransport {
	fn ok(body: &str) -> Arc<Self> {
		Self::with(Ok(body.to_string()), Duration::ZERO)
	}

	fn with(response: Result<String>, delay: Duration) -> Arc<Self> {
		Arc::new(Self {
			response,
			delay,
			calls: AtomicUsize::new(0),
		})
	}

	fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl GoalsTransport for FakeTransport {
	async fn fetch_goals(&self, _environment_key: &str) -> Result<String> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}
		self.response.clone()
	}
}

#[derive(Clone, Default)]
struct RecordingSink {
	events: Arc<Mutex<Vec<MatchEvent>>>,
	flushes: Arc<AtomicUsize>,
}

impl RecordingSink {
	fn events(&self) -> Vec<MatchEvent> {
		self.events.lock().clone()
	}

	fn flushes(&self) -> usize {
		self.flushes.load(Ordering::SeqCst)
	}

	fn keys(&self) -> Vec<(MatchKind, String)> {
		self.events
			.lock()
			.iter()
			.map(|e| (e.kind, e.goal_key.clone()))
			.collect()
	}
}

impl loom_goals::GoalEventSink for RecordingSink {
	fn report_match(&self, event: MatchEvent) {
		self.events.lock().push(event);
	}

	fn flush(&self) {
		self.flushes.fetch_add(1, Ordering::SeqCst);
	}
}

fn start(host: &Arc<MemoryHost>, transport: Arc<FakeTransport>, sink: &RecordingSink) -> GoalManager {
	GoalManager::builder("env-123")
		.host(host.clone())
		.shared_transport(transport)
		.sink(sink.clone())
		.location_poll_interval(None)
		.start()
		.unwrap()
}

fn nested_buy_button(host: &MemoryHost) -> NodeId {
	host.with_document(|doc| {
		let body = doc.body();
		let button = doc.append(body, ElementData::new("button").with_class("buy-button"));
		doc.append(button, ElementData::new("span").with_attribute("data-label", "Buy"))
	})
}

const THANKS_GOAL: &str = r#"[
	{"key": "g1", "kind": "url", "urlMatcher": {"type": "exact", "url": "https://example.com/thanks"}}
]"#;

#[tokio::test]
async fn exact_url_goal_ignores_fragment() {
	let host = Arc::new(MemoryHost::new("https://example.com/thanks#confirmed"));
	let sink = RecordingSink::default();
	let manager = start(&host, FakeTransport::ok(THANKS_GOAL), &sink);

	manager.ready().await;

	assert_eq!(manager.state(), GoalsState::Ready(ReadyOutcome::Tracking));
	assert!(manager.goal_key_exists("g1"));
	let events = sink.events();
	assert_eq!(events.len(), 1);
	assert_eq!(events[0].kind, MatchKind::Pageview);
	assert_eq!(events[0].goal_key, "g1");
	assert_eq!(events[0].url, "https://example.com/thanks#confirmed");
}

#[tokio::test]
async fn exact_url_goal_does_not_match_other_pages() {
	let host = Arc::new(MemoryHost::new("https://example.com/other"));
	let sink = RecordingSink::default();
	let manager = start(&host, FakeTransport::ok(THANKS_GOAL), &sink);

	manager.ready().await;

	assert!(manager.goal_key_exists("g1"));
	assert!(sink.events().is_empty());
}

#[tokio::test]
async fn navigation_after_ready_reports_matching_pageviews() {
	let host = Arc::new(MemoryHost::new("https://example.com/"));
	let sink = RecordingSink::default();
	let manager = start(&host, FakeTransport::ok(THANKS_GOAL), &sink);

	manager.ready().await;
	assert!(sink.events().is_empty());

	host.pop_state("https://example.com/thanks#confirmed");
	assert_eq!(sink.keys(), vec![(MatchKind::Pageview, "g1".to_string())]);
	assert_eq!(sink.events()[0].url, "https://example.com/thanks#confirmed");

	host.pop_state("https://example.com/other");
	assert_eq!(sink.events().len(), 1);
}

#[tokio::test]
async fn unload_flushes_sink_while_manager_lives() {
	let host = Arc::new(MemoryHost::new("https://example.com/"));
	let sink = RecordingSink::default();
	let manager = start(&host, FakeTransport::ok(THANKS_GOAL), &sink);

	manager.ready().await;
	host.unload();
	assert_eq!(sink.flushes(), 2);

	drop(manager);
	host.unload();
	assert_eq!(sink.flushes(), 2);
	assert_eq!(host.total_listener_count(), 0);
}

#[tokio::test]
async fn unload_flush_is_attached_when_fetching_is_disabled() {
	let host = Arc::new(MemoryHost::new("https://example.com/"));
	let sink = RecordingSink::default();
	let manager = GoalManager::builder("env-123")
		.fetch_goals(false)
		.host(host.clone())
		.sink(sink.clone())
		.start()
		.unwrap();

	manager.ready().await;
	assert_eq!(host.listener_count(HostEventType::Click), 0);

	host.unload();
	assert_eq!(sink.flushes(), 2);
}

#[tokio::test]
async fn click_on_nested_span_matches_ancestor_button_once() {
	let host = Arc::new(MemoryHost::new("https://example.com/"));
	let sink = RecordingSink::default();
	let manager = start(
		&host,
		FakeTransport::ok(r#"[{"key": "g2", "kind": "click", "selector": [".buy-button"]}]"#),
		&sink,
	);
	let span = nested_buy_button(&host);

	manager.ready().await;
	host.click(span);

	let events = sink.events();
	assert_eq!(events.len(), 1);
	assert_eq!(events[0].kind, MatchKind::Click);
	assert_eq!(events[0].goal_key, "g2");
	assert_eq!(events[0].selector.as_deref(), Some(".buy-button"));

	let props = events[0].to_event_properties();
	assert_eq!(props["$goal_key"], "g2");
	assert_eq!(props["$selector"], ".buy-button");
}

#[tokio::test]
async fn network_error_disables_tracking_and_still_signals_ready() {
	let host = Arc::new(MemoryHost::new("https://example.com/thanks"));
	let sink = RecordingSink::default();
	let ready_calls = Arc::new(AtomicUsize::new(0));
	let transport = FakeTransport::with(
		Err(GoalsError::Network("connection refused".to_string())),
		Duration::ZERO,
	);

	let manager = {
		let ready_calls = Arc::clone(&ready_calls);
		GoalManager::builder("env-123")
			.host(host.clone())
			.shared_transport(transport.clone())
			.sink(sink.clone())
			.on_ready(move || {
				ready_calls.fetch_add(1, Ordering::SeqCst);
			})
			.start()
			.unwrap()
	};

	manager.ready().await;
	manager.ready().await;

	assert_eq!(manager.state(), GoalsState::Ready(ReadyOutcome::Disabled));
	assert_eq!(ready_calls.load(Ordering::SeqCst), 1);
	assert_eq!(transport.calls(), 1);
	assert!(!manager.goal_key_exists("g1"));
	assert!(!manager.is_listening());
	assert_eq!(host.listener_count(HostEventType::Click), 0);
	assert_eq!(host.listener_count(HostEventType::PopState), 0);
	assert!(sink.events().is_empty());
}

#[tokio::test]
async fn server_error_disables_tracking() {
	let host = Arc::new(MemoryHost::new("https://example.com/"));
	let sink = RecordingSink::default();
	let transport = FakeTransport::with(
		Err(GoalsError::ServerError {
			status: 500,
			message: "boom".to_string(),
		}),
		Duration::ZERO,
	);
	let manager = start(&host, transport, &sink);

	manager.ready().await;

	assert_eq!(manager.state(), GoalsState::Ready(ReadyOutcome::Disabled));
	assert!(manager.goals().is_none());
}

#[tokio::test]
async fn malformed_payload_disables_tracking() {
	let host = Arc::new(MemoryHost::new("https://example.com/"));
	let sink = RecordingSink::default();
	let manager = start(&host, FakeTransport::ok(r#"{"key": "g1"}"#), &sink);

	manager.ready().await;

	assert_eq!(manager.state(), GoalsState::Ready(ReadyOutcome::Disabled));
	assert!(!manager.goal_key_exists("g1"));
}

#[tokio::test]
async fn invalid_regex_only_skips_its_goal() {
	let host = Arc::new(MemoryHost::new("https://example.com/orders/7/complete"));
	let sink = RecordingSink::default();
	let manager = start(
		&host,
		FakeTransport::ok(
			r#"[
				{"key": "broken", "kind": "url", "urlMatcher": {"type": "regex", "pattern": "(["}},
				{"key": "orders", "kind": "url", "urlMatcher": {"type": "regex", "pattern": "/orders/\\d+/complete$"}}
			]"#,
		),
		&sink,
	);

	manager.ready().await;

	assert_eq!(sink.keys(), vec![(MatchKind::Pageview, "orders".to_string())]);
	assert!(manager.goal_key_exists("broken"));
	assert_eq!(manager.state(), GoalsState::Ready(ReadyOutcome::Tracking));
}

#[tokio::test]
async fn interactions_during_fetch_are_not_matched() {
	let host = Arc::new(MemoryHost::new("https://example.com/"));
	let sink = RecordingSink::default();
	let transport = FakeTransport::with(
		Ok(r#"[{"key": "g2", "kind": "click", "selector": "button"}]"#.to_string()),
		Duration::from_millis(30),
	);
	let manager = start(&host, transport, &sink);
	let span = nested_buy_button(&host);

	assert_eq!(manager.state(), GoalsState::Fetching);
	assert!(!manager.goal_key_exists("g2"));
	host.click(span);

	manager.ready().await;
	assert!(sink.events().is_empty());

	host.click(span);
	assert_eq!(sink.keys(), vec![(MatchKind::Click, "g2".to_string())]);
}

#[tokio::test]
async fn one_listener_per_event_type() {
	let host = Arc::new(MemoryHost::new("https://example.com/"));
	let sink = RecordingSink::default();
	let manager = start(
		&host,
		FakeTransport::ok(
			r#"[
				{"key": "a", "kind": "click", "selector": "button"},
				{"key": "b", "kind": "click", "selector": ".buy-button"},
				{"key": "c", "kind": "url", "urlMatcher": {"type": "substring", "pattern": "/x"}}
			]"#,
		),
		&sink,
	);

	manager.ready().await;

	assert_eq!(host.listener_count(HostEventType::Click), 1);
	assert_eq!(host.listener_count(HostEventType::PopState), 1);
	assert_eq!(host.listener_count(HostEventType::HashChange), 0);

	let span = nested_buy_button(&host);
	host.click(span);
	assert_eq!(
		sink.keys(),
		vec![
			(MatchKind::Click, "a".to_string()),
			(MatchKind::Click, "b".to_string())
		]
	);
}

#[tokio::test]
async fn dropping_the_manager_removes_listeners() {
	let host = Arc::new(MemoryHost::new("https://example.com/"));
	let sink = RecordingSink::default();
	let manager = start(
		&host,
		FakeTransport::ok(r#"[{"key": "g2", "kind": "click", "selector": "button"}]"#),
		&sink,
	);

	manager.ready().await;
	// click and popstate, plus beforeunload and unload
	assert_eq!(host.total_listener_count(), 4);

	drop(manager);
	assert_eq!(host.total_listener_count(), 0);
}

#[tokio::test]
async fn push_state_navigation_is_detected_by_polling() {
	let host = Arc::new(MemoryHost::new("https://example.com/"));
	let sink = RecordingSink::default();
	let manager = GoalManager::builder("env-123")
		.host(host.clone())
		.transport(StaticBody(
			r#"[{"key": "checkout", "kind": "url", "urlMatcher": {"type": "canonical", "url": "https://example.com/checkout"}}]"#,
		))
		.sink(sink.clone())
		.location_poll_interval(Some(Duration::from_millis(10)))
		.start()
		.unwrap();

	manager.ready().await;
	assert!(sink.events().is_empty());

	host.push_state("https://example.com/checkout?step=1");
	tokio::time::sleep(Duration::from_millis(100)).await;
	assert_eq!(sink.keys(), vec![(MatchKind::Pageview, "checkout".to_string())]);

	// Same canonical page, different URL: counts as a new navigation.
	host.pop_state("https://example.com/checkout?step=2");
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(sink.events().len(), 2);
}

struct StaticBody(&'static str);

#[async_trait]
impl GoalsTransport for StaticBody {
	async fn fetch_goals(&self, _environment_key: &str) -> Result<String> {
		Ok(self.0.to_string())
	}
}

#[tokio::test]
async fn fetches_goals_over_http() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/sdk/goals/env-123"))
		.respond_with(ResponseTemplate::new(200).set_body_string(THANKS_GOAL))
		.expect(1)
		.mount(&server)
		.await;

	let host = Arc::new(MemoryHost::new("https://example.com/thanks"));
	let sink = RecordingSink::default();
	let manager = GoalManager::builder("env-123")
		.base_url(server.uri())
		.host(host.clone())
		.sink(sink.clone())
		.start()
		.unwrap();

	manager.ready().await;

	assert!(manager.goal_key_exists("g1"));
	assert_eq!(sink.keys(), vec![(MatchKind::Pageview, "g1".to_string())]);
}

#[tokio::test]
async fn http_not_found_disables_tracking() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.respond_with(ResponseTemplate::new(404))
		.mount(&server)
		.await;

	let host = Arc::new(MemoryHost::new("https://example.com/"));
	let manager = GoalManager::builder("env-123")
		.base_url(server.uri())
		.host(host.clone())
		.start()
		.unwrap();

	manager.ready().await;
	assert_eq!(manager.state(), GoalsState::Ready(ReadyOutcome::Disabled));
}
