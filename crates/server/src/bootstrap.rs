use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use homestash_bot::engine::ConversationEngine;
use homestash_bot::media::MediaError;
use homestash_bot::nlp::HttpLemmatizer;
use homestash_bot::speech::{HttpSpeechSynthesizer, SpeechError, SpeechSynthesizer};
use homestash_bot::telegram::{TelegramMediaStore, TelegramTransport};
use homestash_bot::transport::{PollingRunner, ReconnectPolicy, TransportError};
use homestash_core::config::{AppConfig, ConfigError, LoadOptions};
use homestash_core::retention::RetentionPolicy;
use homestash_core::tags::{LemmatizerError, TagExtractor};
use homestash_db::{connect, migrations, DbPool, SqlItemRepository, SqlMapRepository};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<ConversationEngine>,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("nlp client setup failed: {0}")]
    Nlp(#[from] LemmatizerError),
    #[error("speech client setup failed: {0}")]
    Speech(#[from] SpeechError),
    #[error("media store setup failed: {0}")]
    Media(#[from] MediaError),
    #[error("chat transport setup failed: {0}")]
    Transport(#[from] TransportError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let lemmatizer = Arc::new(HttpLemmatizer::new(&config.nlp)?);
    let speech: Option<Arc<dyn SpeechSynthesizer>> = match &config.speech.base_url {
        Some(base_url) => {
            Some(Arc::new(HttpSpeechSynthesizer::new(base_url, &config.speech)?))
        }
        None => None,
    };
    info!(
        event_name = "system.bootstrap.services_wired",
        correlation_id = "bootstrap",
        voice_enabled = speech.is_some(),
        "external service clients constructed"
    );

    let engine = Arc::new(ConversationEngine::new(
        Arc::new(SqlItemRepository::new(db_pool.clone())),
        Arc::new(SqlMapRepository::new(db_pool.clone())),
        TagExtractor::new(lemmatizer),
        Arc::new(TelegramMediaStore::new(&config.telegram)?),
        speech,
        RetentionPolicy { window_days: config.retention.window_days },
    ));

    let transport = Arc::new(TelegramTransport::new(&config.telegram)?);
    let runner = PollingRunner::new(transport, engine.clone(), ReconnectPolicy::default());

    Ok(Application { config, db_pool, engine, runner })
}

#[cfg(test)]
mod tests {
    use homestash_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn valid_options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                telegram_bot_token: Some("123456:test-secret".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_malformed_bot_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                telegram_bot_token: Some("no-colon-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("invalid token must fail").to_string();
        assert!(message.contains("telegram.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_the_engine() {
        let app = bootstrap(valid_options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('items', 'maps')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 2, "bootstrap should expose the catalog tables");

        let owner = homestash_core::domain::item::OwnerId("owner-1".to_owned());
        let session = app.engine.session_for(&owner).await;
        assert!(session.is_idle());

        app.db_pool.close().await;
    }
}
