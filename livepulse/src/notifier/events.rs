//! Notification-worthy lifecycle events and their message rendering.

use crate::database::models::EventType;

/// A lifecycle transition that may be announced to subscribers.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    Started {
        channel_id: String,
        channel_name: String,
        title: String,
        category: String,
        viewer_count: i64,
    },
    Ended {
        channel_id: String,
        channel_name: String,
        duration_minutes: i64,
        average_viewer_count: i64,
        peak_viewer_count: i64,
    },
    TopicChanged {
        channel_id: String,
        channel_name: String,
        title: String,
        category: String,
        tags: Vec<String>,
        viewer_count: i64,
    },
    HotSpike {
        channel_id: String,
        channel_name: String,
        title: String,
        viewer_count: i64,
        average_viewer_count: i64,
    },
}

impl LiveEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Started { .. } => EventType::Start,
            Self::Ended { .. } => EventType::End,
            Self::TopicChanged { .. } => EventType::Topic,
            Self::HotSpike { .. } => EventType::Hot,
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            Self::Started { channel_id, .. }
            | Self::Ended { channel_id, .. }
            | Self::TopicChanged { channel_id, .. }
            | Self::HotSpike { channel_id, .. } => channel_id,
        }
    }

    /// Lowercased text subscribers' keywords are matched against.
    pub fn search_text(&self) -> String {
        match self {
            Self::TopicChanged {
                title,
                category,
                tags,
                ..
            } => {
                let mut text = format!("{title} {category}");
                for tag in tags {
                    text.push(' ');
                    text.push_str(tag);
                }
                text.to_lowercase()
            }
            Self::Started {
                title, category, ..
            } => format!("{title} {category}").to_lowercase(),
            Self::HotSpike { title, .. } => title.to_lowercase(),
            Self::Ended { .. } => String::new(),
        }
    }

    /// Render the outbound message body.
    pub fn render_message(&self, watch_url_base: &str) -> String {
        match self {
            Self::Started {
                channel_id,
                channel_name,
                title,
                category,
                viewer_count,
            } => format!(
                "🔴 **{channel_name}** is live!\n{title}\n🎮 {category} · 👀 {viewer_count} viewers\n{}",
                watch_link(watch_url_base, channel_id)
            ),
            Self::Ended {
                channel_name,
                duration_minutes,
                average_viewer_count,
                peak_viewer_count,
                ..
            } => format!(
                "⚫ **{channel_name}** finished streaming.\n⏱ {} · 📊 avg {average_viewer_count} · peak {peak_viewer_count}",
                format_duration(*duration_minutes)
            ),
            Self::TopicChanged {
                channel_id,
                channel_name,
                title,
                category,
                tags,
                ..
            } => {
                let mut message = format!(
                    "📝 **{channel_name}** changed topic\n{title}\n🎮 {category}"
                );
                if !tags.is_empty() {
                    message.push_str(&format!(" · 🏷 {}", tags.join(", ")));
                }
                message.push('\n');
                message.push_str(&watch_link(watch_url_base, channel_id));
                message
            }
            Self::HotSpike {
                channel_id,
                channel_name,
                title,
                viewer_count,
                average_viewer_count,
            } => format!(
                "🔥 **{channel_name}** is blowing up!\n{title}\n👀 {viewer_count} viewers (usually around {average_viewer_count})\n{}",
                watch_link(watch_url_base, channel_id)
            ),
        }
    }
}

fn watch_link(base: &str, channel_id: &str) -> String {
    format!("{}/{channel_id}", base.trim_end_matches('/'))
}

fn format_duration(minutes: i64) -> String {
    let minutes = minutes.max(0);
    if minutes >= 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_text_covers_title_category_tags() {
        let event = LiveEvent::TopicChanged {
            channel_id: "ch".into(),
            channel_name: "Name".into(),
            title: "Dark Souls RUN".into(),
            category: "Games".into(),
            tags: vec!["Souls-like".into()],
            viewer_count: 10,
        };
        let text = event.search_text();
        assert!(text.contains("dark souls run"));
        assert!(text.contains("games"));
        assert!(text.contains("souls-like"));
    }

    #[test]
    fn test_duration_rendering() {
        assert_eq!(format_duration(45), "45m");
        assert_eq!(format_duration(135), "2h 15m");
    }

    #[test]
    fn test_started_message_has_watch_link() {
        let event = LiveEvent::Started {
            channel_id: "abc".into(),
            channel_name: "Name".into(),
            title: "Title".into(),
            category: "Games".into(),
            viewer_count: 100,
        };
        let message = event.render_message("https://example.com/live/");
        assert!(message.contains("https://example.com/live/abc"));
        assert_eq!(event.event_type(), EventType::Start);
    }
}
