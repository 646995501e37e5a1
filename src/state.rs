use crate::{config::AppConfig, db::DbPool, services::mailer::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, mailer: Mailer) -> Self {
        Self { config, db, mailer }
    }
}
