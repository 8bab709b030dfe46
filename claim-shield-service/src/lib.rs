pub mod config;
pub mod models;
pub mod service;
pub mod store;

pub use config::ServiceConfig;
pub use service::{AppState, build_router, create_app_state};
pub use store::{AssessmentStore, InMemoryAssessmentStore, StoredAssessment};
