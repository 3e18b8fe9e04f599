pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{
    Activity, ActivityDraft, ActivityId, ActivityPatch, ActivityRecord, ActivityRules, Category,
};
pub use repository::{ActivityRepository, DynActivityRepository, SqliteActivityRepository};
pub use service::{ActivityPolicy, ActivityService};
