use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    auth::TokenService,
    config::Config,
    services::{
        AnthropicClient, DisabledGeocoder, Geocoder, KeywordScorer, LlmRelevanceScorer,
        LocalObjectStore, LogMailer, Mailer, MapboxGeocoder, ObjectStore, RelevanceScorer,
        ResendMailer,
    },
};

/// Shared handler state. Every outbound collaborator sits behind a trait object.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub tokens: Arc<TokenService>,
    pub store: Arc<dyn ObjectStore>,
    pub geocoder: Arc<dyn Geocoder>,
    pub scorer: Arc<dyn RelevanceScorer>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Wire the real services chosen by `config`; absent credentials select the offline variant.
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let geocoder: Arc<dyn Geocoder> = match &config.mapbox_token {
            Some(token) => Arc::new(MapboxGeocoder::new(token.clone())),
            None => Arc::new(DisabledGeocoder),
        };
        let scorer: Arc<dyn RelevanceScorer> = match &config.anthropic_api_key {
            Some(key) => Arc::new(LlmRelevanceScorer::new(AnthropicClient::new(
                key.clone(),
                config.llm_model.clone(),
            ))),
            None => Arc::new(KeywordScorer),
        };
        let mailer: Arc<dyn Mailer> = match &config.resend_api_key {
            Some(key) => Arc::new(ResendMailer::new(key.clone(), config.mail_from.clone())),
            None => Arc::new(LogMailer),
        };
        let store = Arc::new(LocalObjectStore::new(
            config.storage_root.clone(),
            config.storage_public_url.clone(),
        ));

        tracing::info!(
            geocoding = config.mapbox_token.is_some(),
            llm_scoring = config.anthropic_api_key.is_some(),
            email = config.resend_api_key.is_some(),
            "Outbound services configured"
        );

        Self {
            db,
            tokens: Arc::new(TokenService::new(&config.jwt_secret, config.token_ttl_minutes)),
            config: Arc::new(config),
            store,
            geocoder,
            scorer,
            mailer,
        }
    }

    #[must_use]
    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = geocoder;
        self
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = store;
        self
    }
}
