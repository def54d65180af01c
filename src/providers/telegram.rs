// src/providers/telegram.rs
//! Telegram Bot API feed source.
//!
//! Polls `getUpdates` for channel posts. One poll returns updates for
//! every channel the bot watches, so posts for channels other than the
//! one being fetched are parked in a pending buffer and served on their
//! own fetch call instead of being dropped.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::{FeedItem, FeedSource, MediaKind, MediaRef};

pub struct TelegramFeed {
    http: reqwest::Client,
    token: String,
    /// Normalized configured channels; posts for any other channel the bot
    /// can see are dropped instead of buffered.
    channels: HashSet<String>,
    last_update_id: AtomicI64,
    pending: Mutex<HashMap<String, Vec<FeedItem>>>,
}

#[derive(Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    channel_post: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    message_id: i64,
    date: i64,
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    photo: Option<Vec<PhotoSize>>,
    #[serde(default)]
    video: Option<FileRef>,
    #[serde(default)]
    document: Option<FileRef>,
}

#[derive(Deserialize)]
struct Chat {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Deserialize)]
struct PhotoSize {
    file_id: String,
}

#[derive(Deserialize)]
struct FileRef {
    file_id: String,
}

fn normalize_channel(channel: &str) -> String {
    channel.trim_start_matches('@').to_lowercase()
}

impl TelegramFeed {
    pub fn new(token: String, channels: &[String]) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            http,
            token,
            channels: channels.iter().map(|c| normalize_channel(c)).collect(),
            last_update_id: AtomicI64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Buffer an item until its channel's own fetch call, unless the
    /// channel is not one we relay.
    fn park(&self, channel: String, item: FeedItem) {
        if !self.channels.contains(&channel) {
            tracing::debug!(%channel, item = item.id, "dropping post for unconfigured channel");
            return;
        }
        let mut g = self.pending.lock().expect("telegram mutex poisoned");
        g.entry(channel).or_default().push(item);
    }

    fn item_from_message(msg: Message) -> Option<(String, FeedItem)> {
        let channel = msg.chat.username?.to_lowercase();
        let text = msg.text.or(msg.caption).unwrap_or_default();
        let mut media = Vec::new();
        if let Some(photos) = msg.photo {
            // Telegram lists ascending resolutions; keep the largest.
            if let Some(best) = photos.last() {
                media.push(MediaRef {
                    kind: MediaKind::Photo,
                    reference: best.file_id.clone(),
                });
            }
        }
        if let Some(video) = msg.video {
            media.push(MediaRef {
                kind: MediaKind::Video,
                reference: video.file_id,
            });
        }
        if let Some(doc) = msg.document {
            media.push(MediaRef {
                kind: MediaKind::Document,
                reference: doc.file_id,
            });
        }
        if text.is_empty() && media.is_empty() {
            return None;
        }
        let posted_at = DateTime::<Utc>::from_timestamp(msg.date, 0).unwrap_or_else(Utc::now);
        Some((
            channel.clone(),
            FeedItem {
                id: msg.message_id,
                channel,
                text,
                media,
                posted_at,
            },
        ))
    }

    async fn poll_updates(&self) -> Result<()> {
        let offset = self.last_update_id.load(Ordering::SeqCst) + 1;
        let url = format!("https://api.telegram.org/bot{}/getUpdates", self.token);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("limit", "100".to_string()),
                ("allowed_updates", r#"["channel_post"]"#.to_string()),
            ])
            .send()
            .await
            .context("telegram getUpdates request")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("telegram getUpdates returned {status}"));
        }
        let body: UpdatesResponse = resp.json().await.context("parsing getUpdates body")?;
        if !body.ok {
            return Err(anyhow!(
                "telegram getUpdates not ok: {}",
                body.description.unwrap_or_default()
            ));
        }

        for update in body.result {
            self.last_update_id.fetch_max(update.update_id, Ordering::SeqCst);
            if let Some(msg) = update.channel_post {
                if let Some((channel, item)) = Self::item_from_message(msg) {
                    self.park(channel, item);
                }
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl FeedSource for TelegramFeed {
    async fn fetch_latest(&self, channel: &str, limit: usize) -> Result<Vec<FeedItem>> {
        self.poll_updates().await?;
        let wanted = normalize_channel(channel);
        let mut items = {
            let mut g = self.pending.lock().expect("telegram mutex poisoned");
            g.remove(&wanted).unwrap_or_default()
        };
        items.sort_by_key(|item| (item.posted_at, item.id));
        items.truncate(limit);
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i64, username: Option<&str>, text: Option<&str>) -> Message {
        Message {
            message_id: id,
            date: 1_700_000_000 + id,
            chat: Chat {
                username: username.map(str::to_string),
            },
            text: text.map(str::to_string),
            caption: None,
            photo: None,
            video: None,
            document: None,
        }
    }

    #[test]
    fn message_mapping_keeps_text_and_channel() {
        let (channel, item) = TelegramFeed::item_from_message(msg(5, Some("NewsFeed"), Some("hi")))
            .expect("mapped");
        assert_eq!(channel, "newsfeed");
        assert_eq!(item.id, 5);
        assert_eq!(item.text, "hi");
    }

    #[test]
    fn empty_messages_are_dropped() {
        assert!(TelegramFeed::item_from_message(msg(1, Some("c"), None)).is_none());
        assert!(TelegramFeed::item_from_message(msg(1, None, Some("x"))).is_none());
    }

    #[test]
    fn unconfigured_channels_are_not_buffered() {
        let feed = TelegramFeed::new("token".into(), &["@NewsFeed".to_string()]);

        let (channel, item) =
            TelegramFeed::item_from_message(msg(1, Some("newsfeed"), Some("story"))).unwrap();
        feed.park(channel, item);
        let (channel, item) =
            TelegramFeed::item_from_message(msg(2, Some("stranger"), Some("noise"))).unwrap();
        feed.park(channel, item);

        let g = feed.pending.lock().unwrap();
        assert_eq!(g.get("newsfeed").map(Vec::len), Some(1));
        assert!(!g.contains_key("stranger"));
    }

    #[test]
    fn caption_fills_in_for_media_posts() {
        let mut m = msg(2, Some("c"), None);
        m.caption = Some("caption text".into());
        m.photo = Some(vec![
            PhotoSize {
                file_id: "small".into(),
            },
            PhotoSize {
                file_id: "large".into(),
            },
        ]);
        let (_, item) = TelegramFeed::item_from_message(m).expect("mapped");
        assert_eq!(item.text, "caption text");
        assert_eq!(item.media.len(), 1);
        assert_eq!(item.media[0].reference, "large");
    }
}
