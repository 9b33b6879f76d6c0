//! Telegram Bot API backend: long-polling transport plus the media store
//! that resolves and annotates Telegram-hosted files.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use homestash_core::config::TelegramConfig;
use homestash_core::domain::item::{MediaRef, OwnerId};

use crate::commands::parse_command;
use crate::events::{ChatEnvelope, ChatEvent};
use crate::media::{MediaError, MediaStore, MARKER_RADIUS, MARKER_WIDTH};
use crate::replies::OutboundMessage;
use crate::transport::{ChatTransport, TransportError};

const LONG_POLL_SECS: u64 = 25;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
    photo: Option<Vec<PhotoSize>>,
    voice: Option<Voice>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    file_id: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct Voice {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_path: Option<String>,
}

/// Map one raw update onto the engine's event model. Updates without a
/// routable payload (edits, stickers, service messages) map to `None` and
/// are skipped.
fn envelope_from_update(update: Update) -> Option<ChatEnvelope> {
    let message = update.message?;
    let owner_id = OwnerId(message.chat.id.to_string());

    let event = if let Some(photo_sizes) = message.photo.filter(|sizes| !sizes.is_empty()) {
        // Telegram sends several downscaled variants; keep the largest.
        let best = photo_sizes
            .into_iter()
            .max_by_key(|size| u64::from(size.width) * u64::from(size.height))?;
        ChatEvent::Photo(MediaRef(best.file_id))
    } else if let Some(voice) = message.voice {
        ChatEvent::Voice(MediaRef(voice.file_id))
    } else if let Some(text) = message.text {
        match parse_command(&text) {
            Some(command) => ChatEvent::Command(command),
            None => ChatEvent::Text(text),
        }
    } else {
        return None;
    };

    Some(ChatEnvelope { update_id: update.update_id.to_string(), owner_id, event })
}

/// Reply-markup payload for a message, per the Bot API schema.
fn reply_markup(message: &OutboundMessage) -> Option<serde_json::Value> {
    match message {
        OutboundMessage::TextWithKeyboard { keyboard, .. } => Some(json!({
            "keyboard": [keyboard.iter().map(|room| json!({"text": room})).collect::<Vec<_>>()],
            "resize_keyboard": true,
            "one_time_keyboard": true,
        })),
        OutboundMessage::TextRemoveKeyboard { .. } => Some(json!({"remove_keyboard": true})),
        _ => None,
    }
}

struct TelegramApi {
    client: reqwest::Client,
    api_base_url: String,
    bot_token: String,
}

impl TelegramApi {
    fn new(config: &TelegramConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECS + 10))
            .build()
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.expose_secret().to_owned(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.bot_token)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.api_base_url, self.bot_token)
    }

    async fn call<T>(&self, method: &str, body: serde_json::Value) -> Result<T, String>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|err| err.to_string())?;

        let payload =
            response.json::<ApiResponse<T>>().await.map_err(|err| err.to_string())?;
        match (payload.ok, payload.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(payload.description.unwrap_or_else(|| "telegram api error".to_owned())),
        }
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, String> {
        let file: TelegramFile =
            self.call("getFile", json!({"file_id": file_id})).await?;
        let file_path = file.file_path.ok_or_else(|| "file has no path".to_owned())?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|err| err.to_string())?;
        let bytes = response.bytes().await.map_err(|err| err.to_string())?;
        Ok(bytes.to_vec())
    }
}

/// Long-polling [`ChatTransport`] over the Telegram Bot API. `acknowledge`
/// advances the `getUpdates` offset; there is no per-update ack on the wire.
pub struct TelegramTransport {
    api: TelegramApi,
    offset: AtomicI64,
    queue: Mutex<VecDeque<ChatEnvelope>>,
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig) -> Result<Self, TransportError> {
        Ok(Self {
            api: TelegramApi::new(config)?,
            offset: AtomicI64::new(0),
            queue: Mutex::new(VecDeque::new()),
        })
    }

    fn bump_offset(&self, update_id: i64) {
        self.offset.fetch_max(update_id + 1, Ordering::SeqCst);
    }

    async fn fetch_batch(&self) -> Result<Vec<ChatEnvelope>, TransportError> {
        let updates: Vec<Update> = self
            .api
            .call(
                "getUpdates",
                json!({
                    "offset": self.offset.load(Ordering::SeqCst),
                    "timeout": LONG_POLL_SECS,
                    "allowed_updates": ["message"],
                }),
            )
            .await
            .map_err(TransportError::Receive)?;

        let mut envelopes = Vec::new();
        for update in updates {
            // Unroutable updates are consumed here so the offset moves past them.
            self.bump_offset(update.update_id);
            if let Some(envelope) = envelope_from_update(update) {
                envelopes.push(envelope);
            } else {
                debug!("skipping telegram update without a routable payload");
            }
        }

        Ok(envelopes)
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.api
            .call::<serde_json::Value>("getMe", json!({}))
            .await
            .map_err(TransportError::Connect)?;
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        loop {
            if let Some(envelope) = self.queue.lock().await.pop_front() {
                return Ok(Some(envelope));
            }

            let batch = self.fetch_batch().await?;
            self.queue.lock().await.extend(batch);
        }
    }

    async fn acknowledge(&self, update_id: &str) -> Result<(), TransportError> {
        let id: i64 = update_id
            .parse()
            .map_err(|_| TransportError::Acknowledge(format!("bad update id `{update_id}`")))?;
        self.bump_offset(id);
        Ok(())
    }

    async fn deliver(
        &self,
        owner_id: &OwnerId,
        messages: &[OutboundMessage],
    ) -> Result<(), TransportError> {
        for message in messages {
            match message {
                OutboundMessage::Text { text }
                | OutboundMessage::TextWithKeyboard { text, .. }
                | OutboundMessage::TextRemoveKeyboard { text } => {
                    let mut body = json!({"chat_id": owner_id.0, "text": text});
                    if let Some(markup) = reply_markup(message) {
                        body["reply_markup"] = markup;
                    }
                    self.api
                        .call::<serde_json::Value>("sendMessage", body)
                        .await
                        .map_err(TransportError::Deliver)?;
                }
                OutboundMessage::PhotoWithCaption { photo, caption } => {
                    self.api
                        .call::<serde_json::Value>(
                            "sendPhoto",
                            json!({"chat_id": owner_id.0, "photo": photo.0, "caption": caption}),
                        )
                        .await
                        .map_err(TransportError::Deliver)?;
                }
                OutboundMessage::Voice { clip } => {
                    let part = reqwest::multipart::Part::bytes(clip.bytes.clone())
                        .file_name("voice.ogg")
                        .mime_str("audio/ogg")
                        .map_err(|err| TransportError::Deliver(err.to_string()))?;
                    let form = reqwest::multipart::Form::new()
                        .text("chat_id", owner_id.0.clone())
                        .part("voice", part);

                    let response = self
                        .api
                        .client
                        .post(self.api.method_url("sendVoice"))
                        .multipart(form)
                        .send()
                        .await
                        .map_err(|err| TransportError::Deliver(err.to_string()))?;
                    if !response.status().is_success() {
                        return Err(TransportError::Deliver(format!(
                            "sendVoice failed with status {}",
                            response.status()
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// [`MediaStore`] over Telegram-hosted files. Inbound file ids are already
/// durable, so `store_photo` is a pass-through; dimension reads and
/// annotation download the actual bytes.
///
/// Annotated copies are written under the system temp directory and the
/// returned [`MediaRef`] holds that local path, NOT a Telegram file id.
/// `deliver` resolves photo refs as file ids, so an annotated ref cannot go
/// back out through it; a caller that wants to send one must upload the
/// file as multipart, the way voice clips are sent.
pub struct TelegramMediaStore {
    api: TelegramApi,
}

impl TelegramMediaStore {
    pub fn new(config: &TelegramConfig) -> Result<Self, MediaError> {
        let api = TelegramApi::new(config).map_err(|err| MediaError::Store(err.to_string()))?;
        Ok(Self { api })
    }

    async fn load_image(&self, image: &MediaRef) -> Result<image::DynamicImage, MediaError> {
        let bytes = self.api.download(&image.0).await.map_err(|detail| MediaError::Fetch {
            reference: image.0.clone(),
            detail,
        })?;

        image::load_from_memory(&bytes).map_err(|err| MediaError::Decode {
            reference: image.0.clone(),
            detail: err.to_string(),
        })
    }
}

#[async_trait]
impl MediaStore for TelegramMediaStore {
    async fn store_photo(&self, source: &MediaRef) -> Result<MediaRef, MediaError> {
        Ok(source.clone())
    }

    async fn image_dimensions(&self, image: &MediaRef) -> Result<(u32, u32), MediaError> {
        let decoded = self.load_image(image).await?;
        Ok((decoded.width(), decoded.height()))
    }

    async fn annotate(&self, image: &MediaRef, x: i64, y: i64) -> Result<MediaRef, MediaError> {
        let mut canvas = self.load_image(image).await?.to_rgba8();
        draw_marker(&mut canvas, x, y);

        let path = std::env::temp_dir().join(format!("homestash-marked-{}.png", uuid::Uuid::new_v4()));
        canvas.save(&path).map_err(|err| MediaError::Store(err.to_string()))?;

        Ok(MediaRef(path.to_string_lossy().into_owned()))
    }
}

/// Draw a red ring of [`MARKER_RADIUS`]/[`MARKER_WIDTH`] centered at `(x, y)`,
/// clipped to the image bounds.
fn draw_marker(canvas: &mut image::RgbaImage, x: i64, y: i64) {
    let red = image::Rgba([255u8, 0, 0, 255]);
    let outer = i64::from(MARKER_RADIUS);
    let inner = outer - i64::from(MARKER_WIDTH);

    for dy in -outer..=outer {
        for dx in -outer..=outer {
            let dist2 = dx * dx + dy * dy;
            if dist2 > outer * outer || dist2 < inner * inner {
                continue;
            }

            let (px, py) = (x + dx, y + dy);
            if px >= 0 && py >= 0 && px < i64::from(canvas.width()) && py < i64::from(canvas.height())
            {
                canvas.put_pixel(px as u32, py as u32, red);
            }
        }
    }
}
