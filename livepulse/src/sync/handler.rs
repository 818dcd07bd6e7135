//! Per-channel transition handling: start, end, continuing.

use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::config::AppConfig;
use crate::database::models::{
    EventType, StreamEventDbModel, StreamMetricsDbModel, StreamSessionDbModel,
};
use crate::database::repositories::{
    EventRepository, SessionRepository, StreamerRepository, SubscriptionRepository,
};
use crate::feed::LiveItem;
use crate::notifier::{LiveEvent, NotificationService};
use crate::store::LiveStateStore;
use crate::sync::BroadcastSnapshot;

/// Applies one channel's observed transition to the database and decides
/// whether it is worth announcing.
///
/// Notification gating: the streamer's rolling average viewer count must
/// reach the configured floor and an active subscription must cover the
/// event. Transitions below the gate are still fully persisted.
pub struct TransitionHandler {
    streamers: Arc<dyn StreamerRepository>,
    sessions: Arc<dyn SessionRepository>,
    events: Arc<dyn EventRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    live_state: Arc<dyn LiveStateStore>,
    notifier: Arc<NotificationService>,
    notify_min_avg_viewers: i64,
    hot_viewer_threshold: i64,
    hot_spike_ratio: f64,
    snapshot_ttl: Duration,
}

impl TransitionHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        streamers: Arc<dyn StreamerRepository>,
        sessions: Arc<dyn SessionRepository>,
        events: Arc<dyn EventRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        live_state: Arc<dyn LiveStateStore>,
        notifier: Arc<NotificationService>,
        config: &AppConfig,
    ) -> Self {
        Self {
            streamers,
            sessions,
            events,
            subscriptions,
            live_state,
            notifier,
            notify_min_avg_viewers: config.notify_min_avg_viewers,
            hot_viewer_threshold: config.hot_viewer_threshold,
            hot_spike_ratio: config.hot_spike_ratio,
            snapshot_ttl: config.snapshot_ttl,
        }
    }

    /// A channel appeared in the observed set.
    pub async fn handle_start(&self, item: &LiveItem, suppress_notify: bool) -> Result<()> {
        let streamer = self
            .streamers
            .get_or_create(&item.channel_id, &item.channel_name, item.concurrent_user_count)
            .await?;

        // At most one open session per streamer; a leftover open session
        // (e.g. after a crash mid-broadcast) is reused instead of duplicated.
        if self
            .sessions
            .get_active_for_channel(&item.channel_id)
            .await?
            .is_some()
        {
            tracing::debug!(channel_id = %item.channel_id, "open session already exists");
            self.streamers.set_live(&item.channel_id, true).await?;
            return Ok(());
        }

        let session = StreamSessionDbModel::new(
            &streamer.id,
            &item.live_title,
            item.category(),
            chrono::Utc::now().to_rfc3339(),
        );
        self.sessions.create(&session).await?;
        self.streamers.set_live(&item.channel_id, true).await?;

        let snapshot = BroadcastSnapshot::from_item(item).to_json()?;
        self.live_state
            .save_snapshot(&session.id, &snapshot, self.snapshot_ttl)
            .await?;

        tracing::info!(
            channel_id = %item.channel_id,
            viewers = item.concurrent_user_count,
            "broadcast started"
        );

        if !suppress_notify
            && self
                .gate(streamer.average_viewer_count, EventType::Start, &item.channel_id)
                .await?
        {
            let event_row =
                StreamEventDbModel::new(&session.id, EventType::Start, item.concurrent_user_count);
            self.events.create(&event_row).await?;

            let event = LiveEvent::Started {
                channel_id: item.channel_id.clone(),
                channel_name: item.channel_name.clone(),
                title: item.live_title.clone(),
                category: item.category().to_string(),
                viewer_count: item.concurrent_user_count,
            };
            self.notifier.dispatch(&event_row.id, &event).await?;
        }
        Ok(())
    }

    /// A previously live channel disappeared from the observed set.
    pub async fn handle_end(&self, channel_id: &str, suppress_notify: bool) -> Result<()> {
        let Some(closed) = self.sessions.close_active_for_channel(channel_id).await? else {
            tracing::debug!(channel_id, "end observed with no open session");
            self.streamers.set_live(channel_id, false).await?;
            return Ok(());
        };

        self.streamers.set_live(channel_id, false).await?;
        self.live_state.delete_snapshot(&closed.id).await?;

        let Some(streamer) = self.streamers.get_by_channel_id(channel_id).await? else {
            return Ok(());
        };

        // Fold the finished session into the rolling average.
        let blended = if streamer.average_viewer_count > 0 {
            (streamer.average_viewer_count + closed.average_viewer_count) / 2
        } else {
            closed.average_viewer_count
        };
        self.streamers
            .update_average_viewers(channel_id, blended)
            .await?;

        tracing::info!(
            channel_id,
            session_id = %closed.id,
            average = closed.average_viewer_count,
            peak = closed.peak_viewer_count,
            "broadcast ended"
        );

        if !suppress_notify
            && self
                .gate(streamer.average_viewer_count, EventType::End, channel_id)
                .await?
        {
            let event_row =
                StreamEventDbModel::new(&closed.id, EventType::End, closed.average_viewer_count);
            self.events.create(&event_row).await?;

            let event = LiveEvent::Ended {
                channel_id: channel_id.to_string(),
                channel_name: streamer.nickname.clone(),
                duration_minutes: session_duration_minutes(&closed),
                average_viewer_count: closed.average_viewer_count,
                peak_viewer_count: closed.peak_viewer_count,
            };
            self.notifier.dispatch(&event_row.id, &event).await?;
        }
        Ok(())
    }

    /// A channel stayed live across cycles: sample metrics, look for a topic
    /// change or a viewer spike.
    pub async fn handle_continuing(&self, item: &LiveItem, suppress_notify: bool) -> Result<()> {
        let Some(session) = self
            .sessions
            .get_active_for_channel(&item.channel_id)
            .await?
        else {
            tracing::debug!(channel_id = %item.channel_id, "continuing channel has no open session");
            return Ok(());
        };

        self.sessions
            .append_metrics(&StreamMetricsDbModel::new(
                &session.id,
                item.concurrent_user_count,
                &item.live_title,
                item.category(),
                &item.tags,
            ))
            .await?;

        self.check_hot_spike(item, &session, suppress_notify).await?;
        self.check_topic_change(item, &session, suppress_notify).await?;
        Ok(())
    }

    async fn check_hot_spike(
        &self,
        item: &LiveItem,
        session: &StreamSessionDbModel,
        suppress_notify: bool,
    ) -> Result<()> {
        let Some(streamer) = self.streamers.get_by_channel_id(&item.channel_id).await? else {
            return Ok(());
        };
        let average = streamer.average_viewer_count;
        let spiking = item.concurrent_user_count >= self.hot_viewer_threshold
            && average > 0
            && (item.concurrent_user_count as f64) > (average as f64) * self.hot_spike_ratio;
        if !spiking {
            return Ok(());
        }
        // At most one hot-spike event per session.
        if self
            .events
            .exists_for_session(&session.id, EventType::Hot)
            .await?
        {
            return Ok(());
        }
        if suppress_notify || !self.gate(average, EventType::Hot, &item.channel_id).await? {
            return Ok(());
        }

        let event_row =
            StreamEventDbModel::new(&session.id, EventType::Hot, item.concurrent_user_count);
        self.events.create(&event_row).await?;
        tracing::info!(
            channel_id = %item.channel_id,
            viewers = item.concurrent_user_count,
            average,
            "viewer spike detected"
        );

        let event = LiveEvent::HotSpike {
            channel_id: item.channel_id.clone(),
            channel_name: item.channel_name.clone(),
            title: item.live_title.clone(),
            viewer_count: item.concurrent_user_count,
            average_viewer_count: average,
        };
        self.notifier.dispatch(&event_row.id, &event).await?;
        Ok(())
    }

    async fn check_topic_change(
        &self,
        item: &LiveItem,
        session: &StreamSessionDbModel,
        suppress_notify: bool,
    ) -> Result<()> {
        let snapshot = BroadcastSnapshot::from_item(item);
        let current = snapshot.to_json()?;
        let stored = self.live_state.get_snapshot(&session.id).await?;

        if stored.as_deref() == Some(current.as_str()) {
            return Ok(());
        }
        let had_previous = stored.is_some();
        self.live_state
            .save_snapshot(&session.id, &current, self.snapshot_ttl)
            .await?;

        // No stored snapshot means we have nothing to compare against
        // (expired, or the start was never observed): store silently. The
        // first cycle after startup also only refreshes the baseline.
        if !had_previous || suppress_notify {
            return Ok(());
        }

        let Some(streamer) = self.streamers.get_by_channel_id(&item.channel_id).await? else {
            return Ok(());
        };
        if !self
            .gate(streamer.average_viewer_count, EventType::Topic, &item.channel_id)
            .await?
        {
            return Ok(());
        }

        let event_row =
            StreamEventDbModel::new(&session.id, EventType::Topic, item.concurrent_user_count)
                .with_summary(&current);
        self.events.create(&event_row).await?;
        tracing::info!(channel_id = %item.channel_id, "topic change detected");

        let event = LiveEvent::TopicChanged {
            channel_id: item.channel_id.clone(),
            channel_name: item.channel_name.clone(),
            title: snapshot.title.clone(),
            category: snapshot.category.clone(),
            tags: snapshot.tags.clone(),
            viewer_count: item.concurrent_user_count,
        };
        self.notifier.dispatch(&event_row.id, &event).await?;
        Ok(())
    }

    async fn gate(&self, average: i64, event_type: EventType, channel_id: &str) -> Result<bool> {
        if average < self.notify_min_avg_viewers {
            return Ok(false);
        }
        self.subscriptions
            .exists_active_for(event_type, channel_id)
            .await
    }
}

fn session_duration_minutes(session: &StreamSessionDbModel) -> i64 {
    let Some(ended_at) = session.ended_at.as_deref() else {
        return 0;
    };
    match (
        chrono::DateTime::parse_from_rfc3339(&session.started_at),
        chrono::DateTime::parse_from_rfc3339(ended_at),
    ) {
        (Ok(start), Ok(end)) => (end - start).num_minutes().max(0),
        _ => 0,
    }
}
