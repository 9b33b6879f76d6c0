use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use homestash_core::domain::item::{MediaRef, NewItem, OwnerId};
use homestash_core::errors::ApplicationError;
use homestash_core::domain::map::FloorMap;
use homestash_core::flows::{parse_coordinates, CaptureStage, MapSetupStage, Session};
use homestash_core::retention::{stale_report_lines, RetentionPolicy};
use homestash_core::search;
use homestash_core::tags::{LemmatizerError, TagExtractor};

use homestash_db::{ItemRepository, MapRepository, RepositoryError};

use crate::commands::BotCommand;
use crate::events::{ChatEnvelope, ChatEvent, EventContext, HandlerResult};
use crate::media::{MediaError, MediaStore};
use crate::replies;
use crate::speech::{location_announcement, SpeechError, SpeechSynthesizer};

/// An external collaborator failed mid-turn. The turn's session is left
/// exactly where it was: neither advanced nor reset.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Lemmatizer(#[from] LemmatizerError),
    #[error(transparent)]
    Speech(#[from] SpeechError),
}

impl EngineError {
    /// Collapse into the shared application-error taxonomy so interfaces can
    /// pick the right user-facing wording.
    pub fn into_application(self) -> ApplicationError {
        match self {
            Self::Repository(error) => ApplicationError::Persistence(error.to_string()),
            Self::Media(error) => ApplicationError::Integration(error.to_string()),
            Self::Lemmatizer(error) => ApplicationError::Integration(error.to_string()),
            Self::Speech(error) => ApplicationError::Integration(error.to_string()),
        }
    }
}

/// Per-owner conversation state machine over the three flows (map setup,
/// item capture, search) plus the on-demand retention scan.
///
/// Exactly one [`Session`] exists per owner, held in process memory behind an
/// `RwLock` and lost on restart. A new command replaces whatever flow was in
/// flight; validation failures reply and keep the state; an owner's turn can
/// never disturb another owner's session.
pub struct ConversationEngine {
    sessions: RwLock<HashMap<OwnerId, Session>>,
    items: Arc<dyn ItemRepository>,
    maps: Arc<dyn MapRepository>,
    tags: TagExtractor,
    media: Arc<dyn MediaStore>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    retention: RetentionPolicy,
}

impl ConversationEngine {
    pub fn new(
        items: Arc<dyn ItemRepository>,
        maps: Arc<dyn MapRepository>,
        tags: TagExtractor,
        media: Arc<dyn MediaStore>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            items,
            maps,
            tags,
            media,
            speech,
            retention,
        }
    }

    /// Current session for an owner; owners without one are `Idle`.
    pub async fn session_for(&self, owner_id: &OwnerId) -> Session {
        self.sessions.read().await.get(owner_id).cloned().unwrap_or_default()
    }

    async fn set_session(&self, owner_id: &OwnerId, session: Session) {
        let mut sessions = self.sessions.write().await;
        if session.is_idle() {
            sessions.remove(owner_id);
        } else {
            sessions.insert(owner_id.clone(), session);
        }
    }

    /// Route one inbound envelope through the owner's current session.
    pub async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EngineError> {
        let owner_id = &envelope.owner_id;

        if let ChatEvent::Command(command) = &envelope.event {
            return self.handle_command(owner_id, command, ctx).await;
        }

        let session = self.session_for(owner_id).await;
        match session {
            Session::Idle => Ok(HandlerResult::Ignored),
            Session::MapSetup(stage) => self.step_map_setup(owner_id, stage, &envelope.event).await,
            Session::Capture(stage) => {
                self.step_capture(owner_id, stage, &envelope.event, ctx).await
            }
            Session::Search => self.step_search(owner_id, &envelope.event, ctx).await,
        }
    }

    async fn handle_command(
        &self,
        owner_id: &OwnerId,
        command: &BotCommand,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EngineError> {
        let messages = match command {
            BotCommand::Start => {
                self.set_session(owner_id, Session::Idle).await;
                vec![replies::help()]
            }
            BotCommand::Map => {
                self.start_flow(owner_id, Session::MapSetup(MapSetupStage::AwaitingImage), ctx)
                    .await;
                vec![replies::map_image_prompt()]
            }
            BotCommand::Add => {
                self.start_flow(owner_id, Session::Capture(CaptureStage::AwaitingPhoto), ctx)
                    .await;
                vec![replies::capture_photo_prompt()]
            }
            BotCommand::Find => {
                self.start_flow(owner_id, Session::Search, ctx).await;
                vec![replies::search_prompt()]
            }
            BotCommand::Cleanup => {
                self.set_session(owner_id, Session::Idle).await;
                self.run_cleanup(owner_id, ctx).await?
            }
            BotCommand::Unknown(name) => vec![replies::unknown_command(name)],
        };

        Ok(HandlerResult::Responded(messages))
    }

    async fn start_flow(&self, owner_id: &OwnerId, session: Session, ctx: &EventContext) {
        info!(
            event_name = "engine.flow_started",
            correlation_id = %ctx.correlation_id,
            owner_id = %owner_id.0,
            flow = session.flow_name(),
            "flow started"
        );
        self.set_session(owner_id, session).await;
    }

    async fn step_map_setup(
        &self,
        owner_id: &OwnerId,
        stage: MapSetupStage,
        event: &ChatEvent,
    ) -> Result<HandlerResult, EngineError> {
        let messages = match (stage, event) {
            (MapSetupStage::AwaitingImage, ChatEvent::Photo(source)) => {
                let image = self.media.store_photo(source).await?;
                self.set_session(
                    owner_id,
                    Session::MapSetup(MapSetupStage::AwaitingCoordinates { image }),
                )
                .await;
                vec![replies::map_coordinates_prompt()]
            }
            (MapSetupStage::AwaitingImage, _) => vec![replies::expected_photo()],
            (MapSetupStage::AwaitingCoordinates { image }, ChatEvent::Text(text)) => {
                if parse_coordinates(text).is_err() {
                    return Ok(HandlerResult::Responded(vec![replies::invalid_coordinates()]));
                }

                let (width, height) = self.media.image_dimensions(&image).await?;
                self.maps
                    .upsert(FloorMap {
                        owner_id: owner_id.clone(),
                        image_ref: image,
                        width,
                        height,
                    })
                    .await?;
                self.set_session(owner_id, Session::Idle).await;
                vec![replies::map_saved()]
            }
            (MapSetupStage::AwaitingCoordinates { .. }, _) => vec![replies::expected_text()],
        };

        Ok(HandlerResult::Responded(messages))
    }

    async fn step_capture(
        &self,
        owner_id: &OwnerId,
        stage: CaptureStage,
        event: &ChatEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EngineError> {
        let messages = match (stage, event) {
            (CaptureStage::AwaitingPhoto, ChatEvent::Photo(source)) => {
                let photo = self.media.store_photo(source).await?;
                self.set_session(
                    owner_id,
                    Session::Capture(CaptureStage::AwaitingDescription { photo }),
                )
                .await;
                vec![replies::capture_description_prompt()]
            }
            (CaptureStage::AwaitingPhoto, _) => vec![replies::expected_photo()],
            (CaptureStage::AwaitingDescription { photo }, ChatEvent::Text(text)) => {
                let tags = self.tags.extract(text).await?;
                self.set_session(
                    owner_id,
                    Session::Capture(CaptureStage::AwaitingLocation {
                        photo,
                        description: text.clone(),
                        tags,
                    }),
                )
                .await;
                vec![replies::capture_location_prompt()]
            }
            (CaptureStage::AwaitingDescription { .. }, _) => vec![replies::expected_text()],
            (
                CaptureStage::AwaitingLocation { photo, description, tags },
                ChatEvent::Text(location),
            ) => {
                let item_id = self
                    .items
                    .save(NewItem {
                        owner_id: owner_id.clone(),
                        name: None,
                        description,
                        photo_ref: photo,
                        tags: tags.clone(),
                        location: location.clone(),
                    })
                    .await?;
                self.set_session(owner_id, Session::Idle).await;
                info!(
                    event_name = "engine.item_saved",
                    correlation_id = %ctx.correlation_id,
                    owner_id = %owner_id.0,
                    item_id = item_id.0,
                    tag_count = tags.len(),
                    "item saved"
                );
                vec![replies::item_saved(&tags)]
            }
            (CaptureStage::AwaitingLocation { .. }, _) => vec![replies::expected_text()],
        };

        Ok(HandlerResult::Responded(messages))
    }

    async fn step_search(
        &self,
        owner_id: &OwnerId,
        event: &ChatEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EngineError> {
        let query = match event {
            ChatEvent::Voice(_) => {
                self.set_session(owner_id, Session::Idle).await;
                return Ok(HandlerResult::Responded(vec![replies::voice_search_unavailable()]));
            }
            ChatEvent::Text(text) => text,
            _ => return Ok(HandlerResult::Responded(vec![replies::expected_text()])),
        };

        let items = self.items.list_for_owner(owner_id).await?;
        let matches = search::search(&items, query);

        let mut messages = Vec::new();
        for item in &matches {
            messages.push(replies::search_match(item));
            if let Some(speech) = &self.speech {
                let clip = speech
                    .synthesize(&location_announcement(&item.location, &item.description))
                    .await?;
                messages.push(replies::OutboundMessage::Voice { clip });
            }
        }
        if messages.is_empty() {
            messages.push(replies::nothing_found());
        }

        self.set_session(owner_id, Session::Idle).await;
        info!(
            event_name = "engine.search_completed",
            correlation_id = %ctx.correlation_id,
            owner_id = %owner_id.0,
            match_count = matches.len(),
            "search completed"
        );

        Ok(HandlerResult::Responded(messages))
    }

    async fn run_cleanup(
        &self,
        owner_id: &OwnerId,
        ctx: &EventContext,
    ) -> Result<Vec<replies::OutboundMessage>, EngineError> {
        let cutoff = self.retention.cutoff(Utc::now());
        let stale = self.items.find_stale(owner_id, cutoff).await?;

        info!(
            event_name = "engine.cleanup_completed",
            correlation_id = %ctx.correlation_id,
            owner_id = %owner_id.0,
            stale_count = stale.len(),
            "retention scan completed"
        );

        if stale.is_empty() {
            Ok(vec![replies::nothing_forgotten()])
        } else {
            Ok(vec![replies::stale_report(&stale_report_lines(&stale))])
        }
    }

    /// Draw the location marker on the owner's stored map, if one exists.
    /// `None` means no map is configured; that is not an error.
    pub async fn annotate_location(
        &self,
        owner_id: &OwnerId,
        x: i64,
        y: i64,
    ) -> Result<Option<MediaRef>, EngineError> {
        let Some(map) = self.maps.find_by_owner(owner_id).await? else {
            return Ok(None);
        };

        let marked = self.media.annotate(&map.image_ref, x, y).await?;
        Ok(Some(marked))
    }
}
