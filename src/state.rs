use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::activity::{ActivityPolicy, ActivityRules, ActivityService, SqliteActivityRepository};
use crate::config::Config;
use crate::identity::{IdentityService, SqliteUserRepository};
use crate::images::{DynObjectStore, LocalObjectStore};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub identity: Arc<IdentityService>,
    pub activities: Arc<ActivityService>,
    pub images: DynObjectStore,
}

impl AppState {
    /// Wire the SQLite repositories and the local image store together.
    pub fn new(db: DbPool, config: Config) -> Self {
        let images: DynObjectStore = Arc::new(LocalObjectStore::new(
            config.uploads_path(),
            &config.storage.public_base,
        ));

        let identity = IdentityService::new(
            Arc::new(SqliteUserRepository::new(db.clone())),
            config.auth.bcrypt_cost,
        );

        let policy = ActivityPolicy {
            rules: ActivityRules {
                reject_future_dates: config.activities.reject_future_dates,
            },
            max_image_bytes: config.storage.max_image_bytes,
        };
        let activities = ActivityService::new(
            Arc::new(SqliteActivityRepository::new(db.clone())),
            images.clone(),
            policy,
        );

        Self {
            db,
            config,
            identity: Arc::new(identity),
            activities: Arc::new(activities),
            images,
        }
    }
}
