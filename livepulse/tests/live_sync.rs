//! End-to-end fast-cycle tests against an in-memory database and a scripted
//! listing feed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use livepulse::Result;
use livepulse::config::AppConfig;
use livepulse::database::models::{EventType, SubscriptionDbModel};
use livepulse::database::repositories::{
    EventRepository, SessionRepository, SqlxEventRepository, SqlxNotificationRepository,
    SqlxSessionRepository, SqlxStreamerRepository, SqlxSubscriptionRepository, StreamerRepository,
    SubscriptionRepository,
};
use livepulse::feed::{FeedPage, ListingClient, LiveItem};
use livepulse::notifier::{NotificationService, SubscriptionMatcher, WebhookSender};
use livepulse::store::{CursorStore, LiveStateStore, SqlxCursorStore, SqlxLiveStateStore};
use livepulse::sync::{LiveSyncOrchestrator, TransitionHandler};

/// Listing feed fake keyed by cursor; pages can be swapped between cycles.
struct FakeFeed {
    pages: Mutex<HashMap<String, FeedPage>>,
}

impl FakeFeed {
    fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
        }
    }

    fn set(&self, cursor: &str, items: Vec<LiveItem>) {
        self.pages.lock().unwrap().insert(
            cursor.to_string(),
            FeedPage { items, next: None },
        );
    }
}

#[async_trait]
impl ListingClient for FakeFeed {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage> {
        let key = cursor.unwrap_or("");
        self.pages
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| livepulse::Error::feed(format!("no page for cursor: {key}")))
    }
}

struct RecordingSender {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl WebhookSender for RecordingSender {
    async fn send(&self, _receiver_id: &str, message: &str) -> Result<()> {
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

struct Harness {
    pool: SqlitePool,
    feed: Arc<FakeFeed>,
    sender: Arc<RecordingSender>,
    orchestrator: LiveSyncOrchestrator,
    sessions: Arc<SqlxSessionRepository>,
    events: Arc<SqlxEventRepository>,
    streamers: Arc<SqlxStreamerRepository>,
    live_state: Arc<dyn LiveStateStore>,
}

impl Harness {
    async fn new(config: AppConfig) -> Self {
        // One connection so every component sees the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let feed = Arc::new(FakeFeed::new());
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
        });

        let streamers = Arc::new(SqlxStreamerRepository::new(pool.clone()));
        let sessions = Arc::new(SqlxSessionRepository::new(pool.clone(), pool.clone()));
        let events = Arc::new(SqlxEventRepository::new(pool.clone()));
        let subscriptions = Arc::new(SqlxSubscriptionRepository::new(pool.clone()));
        let notifications = Arc::new(SqlxNotificationRepository::new(pool.clone()));

        let cursors: Arc<dyn CursorStore> =
            Arc::new(SqlxCursorStore::new(pool.clone(), pool.clone()));
        let live_state: Arc<dyn LiveStateStore> =
            Arc::new(SqlxLiveStateStore::new(pool.clone(), pool.clone()));

        cursors.stage_entries(&[String::new()]).await.unwrap();
        cursors.promote_staged().await.unwrap();

        let notifier = Arc::new(NotificationService::new(
            SubscriptionMatcher::new(subscriptions.clone()),
            sender.clone(),
            notifications,
            events.clone(),
            "https://example.com/live",
        ));
        let handler = Arc::new(TransitionHandler::new(
            streamers.clone(),
            sessions.clone(),
            events.clone(),
            subscriptions.clone(),
            live_state.clone(),
            notifier,
            &config,
        ));
        let orchestrator = LiveSyncOrchestrator::new(
            feed.clone(),
            cursors,
            live_state.clone(),
            handler,
            &config,
        );

        Self {
            pool,
            feed,
            sender,
            orchestrator,
            sessions,
            events,
            streamers,
            live_state,
        }
    }

    async fn subscribe_all_events(&self) {
        let repo = SqlxSubscriptionRepository::new(self.pool.clone());
        for event_type in [
            EventType::Start,
            EventType::End,
            EventType::Topic,
            EventType::Hot,
        ] {
            repo.create(&SubscriptionDbModel::new("discord-main", None, event_type))
                .await
                .unwrap();
        }
    }

    fn sent(&self) -> Vec<String> {
        self.sender.sent.lock().unwrap().clone()
    }

    async fn open_session_count(&self) -> i64 {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM stream_sessions WHERE ended_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .unwrap();
        count
    }

    async fn metrics_count(&self, session_id: &str) -> usize {
        self.sessions.list_metrics(session_id).await.unwrap().len()
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        viewer_threshold: 50,
        notify_min_avg_viewers: 30,
        hot_viewer_threshold: 1000,
        hot_spike_ratio: 1.5,
        handler_concurrency: 1,
        ..AppConfig::default()
    }
}

fn live(channel: &str, viewers: i64, title: &str) -> LiveItem {
    LiveItem {
        channel_id: channel.to_string(),
        channel_name: format!("{channel}-name"),
        live_title: title.to_string(),
        live_category_value: Some("Games".to_string()),
        concurrent_user_count: viewers,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_first_cycle_persists_without_notifying() {
    let harness = Harness::new(test_config()).await;
    harness.subscribe_all_events().await;

    harness
        .feed
        .set("", vec![live("a", 100, "A live"), live("b", 80, "B live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    assert_eq!(harness.open_session_count().await, 2);
    let live_ids = harness.live_state.live_ids().await.unwrap();
    assert!(live_ids.contains("a") && live_ids.contains("b"));
    assert!(harness.sent().is_empty());
}

#[tokio::test]
async fn test_disappeared_channel_ends_session_and_notifies() {
    let harness = Harness::new(test_config()).await;
    harness.subscribe_all_events().await;

    harness
        .feed
        .set("", vec![live("a", 100, "A live"), live("b", 80, "B live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    harness.feed.set("", vec![live("a", 100, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    assert_eq!(harness.open_session_count().await, 1);
    let live_ids = harness.live_state.live_ids().await.unwrap();
    assert!(!live_ids.contains("b"));

    let sent = harness.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("b-name"));
    assert!(sent[0].contains("finished streaming"));
}

#[tokio::test]
async fn test_new_channel_after_first_cycle_notifies_start() {
    let harness = Harness::new(test_config()).await;
    harness.subscribe_all_events().await;

    harness.feed.set("", vec![live("a", 100, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    harness
        .feed
        .set("", vec![live("c", 200, "C live"), live("a", 100, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    let sent = harness.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("c-name"));
    assert!(sent[0].contains("is live"));
    assert!(sent[0].contains("https://example.com/live/c"));
}

#[tokio::test]
async fn test_below_gate_start_is_persisted_but_silent() {
    let mut config = test_config();
    config.notify_min_avg_viewers = 500;
    let harness = Harness::new(config).await;
    harness.subscribe_all_events().await;

    harness.feed.set("", vec![live("a", 100, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    harness
        .feed
        .set("", vec![live("a", 100, "A live"), live("d", 120, "D live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    assert_eq!(harness.open_session_count().await, 2);
    assert!(harness.sent().is_empty());

    let session = harness
        .sessions
        .get_active_for_channel("d")
        .await
        .unwrap()
        .unwrap();
    assert!(harness.events.list_for_session(&session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unsubscribed_event_is_silent() {
    let harness = Harness::new(test_config()).await;
    // No subscriptions at all.

    harness.feed.set("", vec![live("a", 100, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();
    harness
        .feed
        .set("", vec![live("a", 100, "A live"), live("e", 90, "E live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    assert_eq!(harness.open_session_count().await, 2);
    assert!(harness.sent().is_empty());
}

#[tokio::test]
async fn test_unchanged_topic_produces_no_event() {
    let harness = Harness::new(test_config()).await;
    harness.subscribe_all_events().await;

    harness.feed.set("", vec![live("a", 100, "Same title")]);
    harness.orchestrator.run_cycle().await.unwrap();
    harness.orchestrator.run_cycle().await.unwrap();
    harness.orchestrator.run_cycle().await.unwrap();

    let session = harness
        .sessions
        .get_active_for_channel("a")
        .await
        .unwrap()
        .unwrap();
    // Two continuing cycles appended two samples, no events, no messages.
    assert_eq!(harness.metrics_count(&session.id).await, 2);
    assert!(harness.events.list_for_session(&session.id).await.unwrap().is_empty());
    assert!(harness.sent().is_empty());
}

#[tokio::test]
async fn test_topic_change_detected_once() {
    let harness = Harness::new(test_config()).await;
    harness.subscribe_all_events().await;

    harness.feed.set("", vec![live("a", 100, "Chapter one")]);
    harness.orchestrator.run_cycle().await.unwrap();

    harness.feed.set("", vec![live("a", 100, "Chapter two")]);
    harness.orchestrator.run_cycle().await.unwrap();
    // Same changed snapshot again: no second event.
    harness.orchestrator.run_cycle().await.unwrap();

    let session = harness
        .sessions
        .get_active_for_channel("a")
        .await
        .unwrap()
        .unwrap();
    let events = harness.events.list_for_session(&session.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "TOPIC");
    assert!(events[0].summary.as_deref().unwrap().contains("Chapter two"));

    let sent = harness.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("changed topic"));
    assert!(sent[0].contains("Chapter two"));
}

#[tokio::test]
async fn test_hot_spike_fires_once_per_session() {
    let harness = Harness::new(test_config()).await;
    harness.subscribe_all_events().await;

    harness.feed.set("", vec![live("a", 100, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    harness.feed.set("", vec![live("a", 2000, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();
    harness.feed.set("", vec![live("a", 2500, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    let session = harness
        .sessions
        .get_active_for_channel("a")
        .await
        .unwrap()
        .unwrap();
    let hot_events: Vec<_> = harness
        .events
        .list_for_session(&session.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == "HOT")
        .collect();
    assert_eq!(hot_events.len(), 1);

    let sent = harness.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("blowing up"));
}

#[tokio::test]
async fn test_fast_scan_dedupes_and_stops_below_threshold() {
    let harness = Harness::new(test_config()).await;
    harness.subscribe_all_events().await;

    // Second entry cursor repeats channel a and ends with an irrelevant item.
    let cursors = SqlxCursorStore::new(harness.pool.clone(), harness.pool.clone());
    cursors
        .stage_entries(&[String::new(), "c1".to_string()])
        .await
        .unwrap();
    cursors.promote_staged().await.unwrap();

    harness.feed.set("", vec![live("a", 100, "A live")]);
    harness.feed.set(
        "c1",
        vec![
            live("a", 90, "A stale duplicate"),
            live("b", 60, "B live"),
            live("tiny", 10, "below threshold"),
        ],
    );
    harness.orchestrator.run_cycle().await.unwrap();

    assert_eq!(harness.open_session_count().await, 2);
    let live_ids = harness.live_state.live_ids().await.unwrap();
    assert!(live_ids.contains("a") && live_ids.contains("b"));
    assert!(!live_ids.contains("tiny"));

    // First observation wins for duplicated channels.
    let session = harness
        .sessions
        .get_active_for_channel("a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.title, "A live");
}

#[tokio::test]
async fn test_duplicate_start_reuses_open_session() {
    let harness = Harness::new(test_config()).await;
    harness.subscribe_all_events().await;

    harness.feed.set("", vec![live("a", 100, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();
    let first = harness
        .sessions
        .get_active_for_channel("a")
        .await
        .unwrap()
        .unwrap();

    // Drop the channel from the live set, as if the process died between
    // opening the session and recording the diff: the next cycle sees the
    // channel as a fresh start while its session is still open.
    harness
        .live_state
        .apply_diff(&[], &["a".to_string()])
        .await
        .unwrap();
    harness.orchestrator.run_cycle().await.unwrap();

    assert_eq!(harness.open_session_count().await, 1);
    let second = harness
        .sessions
        .get_active_for_channel("a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.id, first.id);
    assert!(harness.sent().is_empty());
}

#[tokio::test]
async fn test_below_threshold_tail_does_not_end_scan() {
    let harness = Harness::new(test_config()).await;
    harness.subscribe_all_events().await;

    let cursors = SqlxCursorStore::new(harness.pool.clone(), harness.pool.clone());
    cursors
        .stage_entries(&[String::new(), "c1".to_string()])
        .await
        .unwrap();
    cursors.promote_staged().await.unwrap();

    // The feed shifted since the walk: the first page already tails off
    // below the threshold, but the second entry page still holds a
    // relevant channel.
    harness
        .feed
        .set("", vec![live("a", 100, "A live"), live("tiny", 10, "small")]);
    harness.feed.set("c1", vec![live("b", 60, "B live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    let live_ids = harness.live_state.live_ids().await.unwrap();
    assert!(live_ids.contains("a") && live_ids.contains("b"));
    assert!(!live_ids.contains("tiny"));
    assert_eq!(harness.open_session_count().await, 2);
}

#[tokio::test]
async fn test_closed_session_aggregates_metrics() {
    let harness = Harness::new(test_config()).await;
    harness.subscribe_all_events().await;

    harness.feed.set("", vec![live("a", 100, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();
    harness.feed.set("", vec![live("a", 300, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();
    harness.feed.set("", vec![live("a", 100, "A live")]);
    harness.orchestrator.run_cycle().await.unwrap();

    let session_id = harness
        .sessions
        .get_active_for_channel("a")
        .await
        .unwrap()
        .unwrap()
        .id;

    harness.feed.set("", vec![]);
    harness.orchestrator.run_cycle().await.unwrap();

    let closed = harness.sessions.get_by_id(&session_id).await.unwrap();
    assert!(closed.ended_at.is_some());
    assert_eq!(closed.peak_viewer_count, 300);
    assert_eq!(closed.average_viewer_count, 200);

    // The rolling average blends the previous average with the session's.
    let streamer = harness
        .streamers
        .get_by_channel_id("a")
        .await
        .unwrap()
        .unwrap();
    assert!(!streamer.is_live);
    assert_eq!(streamer.average_viewer_count, (100 + 200) / 2);
}
