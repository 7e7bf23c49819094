//! # Repository Configuration
//!
//! Selects the storage policy and key layout of a repository and opens it
//! over in-memory stores.
//!
//! ```json
//! {"authority": "docs", "versioned": true, "keyStrategy": "timestamp", "index": true}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::IndexProducer;
use crate::keystore::{KeyStore, MemKeyStore, MemTimestampKeyStore};
use crate::meta::{Clock, KeyStrategy, MetaHandler, SystemClock, UnversionedMetaHandler, VersionedMetaHandler};
use crate::repo::Repository;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse repository config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid repository config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Parse(_) => "CONFIG_PARSE_FAILED",
            ConfigError::Invalid(_) => "CONFIG_INVALID",
        }
    }
}

/// Configuration of one document repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepoConfig {
    /// Namespace the repository's paths live in
    pub authority: String,
    /// Keep a version chain, or only the latest generation
    pub versioned: bool,
    /// In-memory backend flavour; `Timestamp` needs `versioned`
    pub key_strategy: KeyStrategy,
    /// Attach an index handler when an index producer is supplied
    pub index: bool,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            authority: "default".to_string(),
            versioned: true,
            key_strategy: KeyStrategy::Standard,
            index: false,
        }
    }
}

impl RepoConfig {
    /// Versioned repository with the standard key layout.
    pub fn versioned(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            ..Self::default()
        }
    }

    /// Repository keeping only the latest generation.
    pub fn unversioned(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            versioned: false,
            ..Self::default()
        }
    }

    /// Use timestamp-capable stores.
    pub fn with_timestamps(mut self) -> Self {
        self.key_strategy = KeyStrategy::Timestamp;
        self
    }

    pub fn with_index(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.authority.trim().is_empty() {
            return Err(ConfigError::Invalid("authority must not be empty".to_string()));
        }
        if self.key_strategy == KeyStrategy::Timestamp && !self.versioned {
            return Err(ConfigError::Invalid(
                "timestamp key strategy requires a versioned repository".to_string(),
            ));
        }
        Ok(())
    }

    pub fn open(&self, producer: Option<Arc<dyn IndexProducer>>) -> ConfigResult<Repository> {
        self.open_with_clock(producer, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        &self,
        producer: Option<Arc<dyn IndexProducer>>,
        clock: Arc<dyn Clock>,
    ) -> ConfigResult<Repository> {
        self.validate()?;

        let document_store: Arc<dyn KeyStore> = match self.key_strategy {
            KeyStrategy::Standard => Arc::new(MemKeyStore::new()),
            KeyStrategy::Timestamp => Arc::new(MemTimestampKeyStore::new()),
        };
        let meta_store = document_store.create_related_key_store("meta");
        let attribute_store = document_store.create_related_key_store("attribute");

        let mut repository = if self.versioned {
            let version_store = document_store.create_related_key_store("version");
            let handler = VersionedMetaHandler::new(document_store, version_store, meta_store, attribute_store)
                .with_clock(clock);
            Repository::versioned(self.authority.clone(), handler)
        } else {
            let handler = UnversionedMetaHandler::new(document_store, meta_store, attribute_store).with_clock(clock);
            Repository::unversioned(self.authority.clone(), handler)
        };

        if let (true, Some(producer)) = (self.index, producer) {
            repository.handler_mut().set_index_producer(producer);
        }

        tracing::info!(
            event = "repository_opened",
            authority = %self.authority,
            versioned = self.versioned,
            key_strategy = ?self.key_strategy,
            indexed = repository.handler().core().has_index(),
            "Repository opened"
        );
        Ok(repository)
    }
}
