use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use homestash_core::domain::item::OwnerId;

use crate::engine::ConversationEngine;
use crate::events::{ChatEnvelope, EventContext, HandlerResult};
use crate::replies::OutboundMessage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport delivery failed: {0}")]
    Deliver(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Chat backend seam: a stream of inbound envelopes plus outbound delivery.
/// `next_envelope` returning `None` means the stream closed cleanly.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError>;
    async fn acknowledge(&self, update_id: &str) -> Result<(), TransportError>;
    async fn deliver(
        &self,
        owner_id: &OwnerId,
        messages: &[OutboundMessage],
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _update_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn deliver(
        &self,
        _owner_id: &OwnerId,
        _messages: &[OutboundMessage],
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Long-polling event loop: pumps envelopes from the transport into the
/// engine and delivers the replies. A failed turn for one owner is logged and
/// the loop continues; transport failures reconnect with exponential backoff
/// and, once retries are exhausted, degrade without crashing the process.
pub struct PollingRunner {
    transport: Arc<dyn ChatTransport>,
    engine: Arc<ConversationEngine>,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        engine: Arc<ConversationEngine>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, engine, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "chat transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening chat transport connection");
        self.transport.connect().await?;
        info!(attempt, "chat transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "chat transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.chat.update_received",
                update_id = %envelope.update_id,
                correlation_id = %envelope.update_id,
                owner_id = %envelope.owner_id.0,
                event_kind = envelope.event.kind(),
                "received chat update"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.update_id).await {
                warn!(
                    event_name = "ingress.chat.ack_sent",
                    update_id = %envelope.update_id,
                    correlation_id = %envelope.update_id,
                    owner_id = %envelope.owner_id.0,
                    error = %error,
                    "failed to acknowledge chat update"
                );
            } else {
                debug!(
                    event_name = "ingress.chat.ack_sent",
                    update_id = %envelope.update_id,
                    correlation_id = %envelope.update_id,
                    owner_id = %envelope.owner_id.0,
                    "acknowledged chat update"
                );
            }

            let context = EventContext { correlation_id: envelope.update_id.clone() };
            let messages = match self.engine.handle(&envelope, &context).await {
                Ok(HandlerResult::Responded(messages)) => messages,
                Ok(HandlerResult::Ignored) => {
                    debug!(
                        update_id = %envelope.update_id,
                        owner_id = %envelope.owner_id.0,
                        "update ignored by engine"
                    );
                    continue;
                }
                Err(error) => {
                    warn!(
                        update_id = %envelope.update_id,
                        correlation_id = %envelope.update_id,
                        owner_id = %envelope.owner_id.0,
                        error = %error,
                        "engine turn failed; replying with failure notice"
                    );
                    let interface =
                        error.into_application().into_interface(envelope.update_id.clone());
                    vec![OutboundMessage::Text { text: interface.user_message().to_owned() }]
                }
            };

            if let Err(error) = self.transport.deliver(&envelope.owner_id, &messages).await {
                warn!(
                    update_id = %envelope.update_id,
                    correlation_id = %envelope.update_id,
                    owner_id = %envelope.owner_id.0,
                    error = %error,
                    "reply delivery failed; continuing polling loop"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use homestash_core::domain::item::{MediaRef, OwnerId};
    use homestash_core::retention::RetentionPolicy;
    use homestash_core::tags::{Lemmatizer, LemmatizerError, TagExtractor, Token};

    use homestash_db::{InMemoryItemRepository, InMemoryMapRepository};

    use crate::commands::BotCommand;
    use crate::engine::ConversationEngine;
    use crate::events::{ChatEnvelope, ChatEvent};
    use crate::media::InMemoryMediaStore;
    use crate::replies::OutboundMessage;

    use super::{ChatTransport, PollingRunner, ReconnectPolicy, TransportError};

    struct EmptyLemmatizer;

    #[async_trait]
    impl Lemmatizer for EmptyLemmatizer {
        async fn analyze(&self, _text: &str) -> Result<Vec<Token>, LemmatizerError> {
            Ok(Vec::new())
        }
    }

    fn engine() -> Arc<ConversationEngine> {
        Arc::new(ConversationEngine::new(
            Arc::new(InMemoryItemRepository::default()),
            Arc::new(InMemoryMapRepository::default()),
            TagExtractor::new(Arc::new(EmptyLemmatizer)),
            Arc::new(InMemoryMediaStore::default()),
            None,
            RetentionPolicy::default(),
        ))
    }

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<ChatEnvelope>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
        deliveries: Vec<(String, Vec<OutboundMessage>)>,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<ChatEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }

        async fn deliveries(&self) -> Vec<(String, Vec<OutboundMessage>)> {
            self.state.lock().await.deliveries.clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, update_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(update_id.to_owned());
            Ok(())
        }

        async fn deliver(
            &self,
            owner_id: &OwnerId,
            messages: &[OutboundMessage],
        ) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.deliveries.push((owner_id.0.clone(), messages.to_vec()));
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn command_envelope(update_id: &str, command: BotCommand) -> ChatEnvelope {
        ChatEnvelope {
            update_id: update_id.to_owned(),
            owner_id: OwnerId("owner-1".to_owned()),
            event: ChatEvent::Command(command),
        }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(command_envelope("upd-1", BotCommand::Start))), Ok(None)],
        ));

        let runner = PollingRunner::new(
            transport.clone(),
            engine(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["upd-1"]);

        let deliveries = transport.deliveries().await;
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, "owner-1");
        assert!(matches!(
            &deliveries[0].1[0],
            OutboundMessage::Text { text } if text.contains("Добро пожаловать")
        ));
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = PollingRunner::new(
            transport.clone(),
            engine(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn failed_engine_turn_delivers_a_failure_notice() {
        use chrono::{DateTime, Utc};
        use homestash_core::domain::item::{Item, ItemId, NewItem};
        use homestash_db::{ItemRepository, RepositoryError};

        struct FailingItems;

        #[async_trait]
        impl ItemRepository for FailingItems {
            async fn save(&self, _item: NewItem) -> Result<ItemId, RepositoryError> {
                Err(RepositoryError::Database(sqlx::Error::PoolClosed))
            }

            async fn list_for_owner(
                &self,
                _owner_id: &OwnerId,
            ) -> Result<Vec<Item>, RepositoryError> {
                Err(RepositoryError::Database(sqlx::Error::PoolClosed))
            }

            async fn find_stale(
                &self,
                _owner_id: &OwnerId,
                _cutoff: DateTime<Utc>,
            ) -> Result<Vec<Item>, RepositoryError> {
                Err(RepositoryError::Database(sqlx::Error::PoolClosed))
            }
        }

        let engine = Arc::new(ConversationEngine::new(
            Arc::new(FailingItems),
            Arc::new(InMemoryMapRepository::default()),
            TagExtractor::new(Arc::new(EmptyLemmatizer)),
            Arc::new(InMemoryMediaStore::default()),
            None,
            RetentionPolicy::default(),
        ));

        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![Ok(Some(command_envelope("upd-9", BotCommand::Cleanup))), Ok(None)],
        ));

        let runner = PollingRunner::new(transport.clone(), engine, ReconnectPolicy::default());
        runner.start().await.expect("runner");

        let deliveries = transport.deliveries().await;
        assert_eq!(deliveries.len(), 1);
        assert!(matches!(
            &deliveries[0].1[0],
            OutboundMessage::Text { text } if text.contains("временно недоступен")
        ));
    }

    #[tokio::test]
    async fn ignored_updates_produce_no_delivery() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(ChatEnvelope {
                    update_id: "upd-2".to_owned(),
                    owner_id: OwnerId("owner-1".to_owned()),
                    event: ChatEvent::Photo(MediaRef("stray-photo".to_owned())),
                })),
                Ok(None),
            ],
        ));

        let runner =
            PollingRunner::new(transport.clone(), engine(), ReconnectPolicy::default());

        runner.start().await.expect("runner");
        assert!(transport.deliveries().await.is_empty());
        assert_eq!(transport.acknowledgements().await, vec!["upd-2"]);
    }
}
