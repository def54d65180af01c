// src/providers/discord.rs
//! Discord webhook destination.
//!
//! Posts one embed per item and retries transient failures with
//! exponential backoff. A 4xx other than 429 is a permanent rejection
//! and is surfaced immediately without retrying.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::types::{DestinationPlatform, MediaKind, PublishReceipt, TransformedItem};

const EMBED_COLOR: u32 = 0x00b0_f4;

pub struct DiscordPublisher {
    http: reqwest::Client,
    webhook_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    embeds: Vec<Embed<'a>>,
}

#[derive(Serialize)]
struct Embed<'a> {
    title: String,
    description: String,
    color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<EmbedFooter<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedImage<'a>>,
}

#[derive(Serialize)]
struct EmbedImage<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct EmbedFooter<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct WebhookResponse {
    id: String,
}

impl DiscordPublisher {
    pub fn new(webhook_url: String, max_retries: u32) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            http,
            webhook_url,
            max_retries,
        }
    }

    fn build_embed(item: &TransformedItem) -> Embed<'_> {
        let date = chrono::Utc::now().format("%Y-%m-%d");
        let title = format!("📅 {date} | {}", item.title);

        let mut description = item.cleaned_text.clone();
        description.push_str("\n\n**Translation (EN):**\n");
        description.push_str(&item.translation);
        if !item.locations.is_empty() {
            description.push_str("\n\n📍 ");
            description.push_str(&item.locations.join(", "));
        } else if let Some(loc) = &item.primary_location {
            description.push_str("\n\n📍 ");
            description.push_str(loc);
        }
        description.push_str(&format!(
            "\n\n**Source:** {} | **ID:** {}",
            item.channel, item.source_id
        ));
        // Discord caps embed descriptions at 4096 chars.
        if description.chars().count() > 4000 {
            description = description.chars().take(4000).collect::<String>() + "…";
        }

        // Only direct URLs can be embedded; platform file ids need a
        // download step the webhook API does not offer.
        let image = item
            .media
            .iter()
            .find(|m| m.kind == MediaKind::Photo && m.reference.starts_with("http"))
            .map(|m| EmbedImage {
                url: m.reference.as_str(),
            });

        Embed {
            title,
            description,
            color: EMBED_COLOR,
            footer: item.degraded.then_some(EmbedFooter {
                text: "automatic translation unavailable",
            }),
            image,
        }
    }

    async fn send_once(&self, payload: &WebhookPayload<'_>) -> Result<PublishReceipt, RelayError> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .query(&[("wait", "true")])
            .json(payload)
            .send()
            .await
            .map_err(|e| RelayError::Transient(format!("discord request: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            let body: WebhookResponse = resp
                .json()
                .await
                .map_err(|e| RelayError::Transient(format!("discord response body: {e}")))?;
            return Ok(PublishReceipt {
                message_id: body.id,
            });
        }
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(RelayError::Transient(format!("discord returned {status}")));
        }
        let detail = resp.text().await.unwrap_or_default();
        Err(RelayError::Permanent(format!(
            "discord rejected payload ({status}): {detail}"
        )))
    }
}

#[async_trait::async_trait]
impl DestinationPlatform for DiscordPublisher {
    async fn publish(&self, item: &TransformedItem) -> Result<PublishReceipt, RelayError> {
        let payload = WebhookPayload {
            embeds: vec![Self::build_embed(item)],
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(&payload).await {
                Ok(receipt) => {
                    tracing::info!(
                        item = item.source_id,
                        message_id = %receipt.message_id,
                        "published to discord"
                    );
                    return Ok(receipt);
                }
                Err(e @ RelayError::Permanent(_)) => return Err(e),
                Err(e) if attempt > self.max_retries => return Err(e),
                Err(e) => {
                    let backoff = Duration::from_millis(500u64 << (attempt - 1));
                    tracing::warn!(
                        item = item.source_id,
                        attempt,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "discord publish retry"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> TransformedItem {
        TransformedItem {
            source_id: 42,
            channel: "newsfeed".into(),
            cleaned_text: "نص الخبر".into(),
            locations: vec!["Damascus".into()],
            primary_location: Some("Damascus, Syria".into()),
            title: "انفجار في دمشق".into(),
            translation: "An explosion in Damascus.".into(),
            media: vec![],
            degraded: false,
        }
    }

    #[test]
    fn embed_carries_translation_and_source_line() {
        let it = item();
        let embed = DiscordPublisher::build_embed(&it);
        assert!(embed.title.contains("انفجار في دمشق"));
        assert!(embed.description.contains("**Translation (EN):**"));
        assert!(embed.description.contains("An explosion in Damascus."));
        assert!(embed.description.contains("**Source:** newsfeed | **ID:** 42"));
        assert!(embed.description.contains("📍 Damascus"));
        assert!(embed.footer.is_none());
    }

    #[test]
    fn degraded_items_get_a_footer() {
        let mut i = item();
        i.degraded = true;
        let embed = DiscordPublisher::build_embed(&i);
        assert!(embed.footer.is_some());
    }

    #[test]
    fn url_media_becomes_embed_image_but_file_ids_do_not() {
        use crate::types::MediaRef;
        let mut with_url = item();
        with_url.media.push(MediaRef {
            kind: MediaKind::Photo,
            reference: "https://cdn.example/img.jpg".into(),
        });
        assert!(DiscordPublisher::build_embed(&with_url).image.is_some());

        let mut with_file_id = item();
        with_file_id.media.push(MediaRef {
            kind: MediaKind::Photo,
            reference: "AgACAgQAAxkBAAI".into(),
        });
        assert!(DiscordPublisher::build_embed(&with_file_id).image.is_none());
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let mut i = item();
        i.cleaned_text = "ن".repeat(5000);
        let embed = DiscordPublisher::build_embed(&i);
        assert!(embed.description.chars().count() <= 4001);
    }
}
