use std::sync::Arc;

use crate::{config::Config, database::Database};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let database = Database::new(&config.database.url)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        database
            .init()
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        Ok(Self {
            db: Arc::new(database),
            config,
        })
    }
}
