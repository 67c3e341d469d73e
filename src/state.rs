use std::{sync::Arc, time::Duration, time::Instant};

use anyhow::{Context, Result};
use tracing::info;

use crate::auth::Keys;
use crate::catalog::{default_catalog, load_catalog, DefectCatalog, CATALOG_FILE};
use crate::config::Config;
use crate::content::Content;
use crate::inference::InferenceClient;
use crate::store::Store;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub inference: InferenceClient,
    pub content: Arc<Content>,
    pub catalog: Arc<DefectCatalog>,
    pub keys: Arc<Keys>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, store: Store) -> Result<Self> {
        let content_dir = config.content_dir.as_deref();

        let catalog = match content_dir.map(|d| d.join(CATALOG_FILE)).filter(|p| p.is_file()) {
            Some(path) => {
                info!("Loading defect catalog from {:?}", path);
                load_catalog(&path)?
            }
            None => default_catalog(),
        };
        let content = Content::load(content_dir)?;

        let inference = InferenceClient::new(
            &config.inference_url()?,
            Duration::from_secs(config.inference.timeout_secs),
        )
        .context("Failed to create inference client")?;
        let keys = Keys::from_config(&config.auth);

        Ok(Self {
            config: Arc::new(config),
            store,
            inference,
            content: Arc::new(content),
            catalog: Arc::new(catalog),
            keys: Arc::new(keys),
            started_at: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
