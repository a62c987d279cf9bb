use crate::config::Config;
use crate::corpus::bhl::BhlAdapter;
use crate::corpus::gdd::GddAdapter;
use crate::corpus::local::LocalExportAdapter;
use crate::corpus::CorpusAdapter;
use crate::error::{CoreError, CoreResult};
use crate::portal::{CollectionsPortal, HttpPortal};
use crate::regex_bank::RegexBank;
use crate::storage::Storage;
use crate::storage_mysql::StorageMySQL;
use crate::topic::{KeywordTopicClassifier, TopicClassifier};
use std::sync::Arc;

/// Everything a CLI command needs, assembled once from [`Config`]: the
/// compiled regex bank, the persistence and portal backends, the topic
/// classifier, and the named corpus adapters (§6). Grounded in the
/// teacher's `AppState`, generalized from a pair of fixed `mysql_async`
/// pools to the trait-object backends this system's storage/portal/topic
/// seams require.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub bank: Arc<RegexBank>,
    pub storage: Arc<dyn Storage>,
    pub portal: Arc<dyn CollectionsPortal>,
    pub topic: Arc<dyn TopicClassifier>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").field("config", &self.config).finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: Config) -> CoreResult<Self> {
        let bank = Arc::new(RegexBank::compile(&config.regex)?);
        let storage: Arc<dyn Storage> = Arc::new(StorageMySQL::new(&config.db_url)?);
        let portal: Arc<dyn CollectionsPortal> = Arc::new(HttpPortal::new(config.portal_url.clone(), config.backoff.clone()));
        let topic: Arc<dyn TopicClassifier> = Arc::new(KeywordTopicClassifier::default());
        Ok(Self { config, bank, storage, portal, topic })
    }

    /// §6's three named corpus adapters, resolved by the `corpus` CLI
    /// argument. `local:<dir>` points a [`LocalExportAdapter`] at a
    /// directory; `bhl` and `gdd` read their endpoints from config.
    pub fn corpus_adapter(&self, name: &str) -> CoreResult<Arc<dyn CorpusAdapter>> {
        if let Some(dir) = name.strip_prefix("local:") {
            return Ok(Arc::new(LocalExportAdapter::new(dir)));
        }
        match name {
            "bhl" => {
                let key = self
                    .config
                    .bhl_api_key
                    .clone()
                    .ok_or_else(|| CoreError::Configuration("bhl_api_key not set in config".into()))?;
                Ok(Arc::new(BhlAdapter::new(key)))
            }
            "gdd" => {
                let base = self
                    .config
                    .gdd_api_base
                    .clone()
                    .ok_or_else(|| CoreError::Configuration("gdd_api_base not set in config".into()))?;
                Ok(Arc::new(GddAdapter::new(base)))
            }
            other => Err(CoreError::Configuration(format!("unknown corpus adapter {other:?}"))),
        }
    }
}
