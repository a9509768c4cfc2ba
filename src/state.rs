use sqlx::SqlitePool;

use crate::{config::Config, mailer::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub mailer: Mailer,
}
