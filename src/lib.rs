pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    attempt_service::AttemptService, certificate_service::CertificateService,
    notification_service::Notifier, result_service::ResultService,
};
use crate::store::Datastore;

#[derive(Clone)]
pub struct AppState {
    pub attempt_service: AttemptService,
    pub result_service: ResultService,
    pub certificate_service: CertificateService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn Datastore>, notifier: Arc<dyn Notifier>, config: &Config) -> Self {
        let attempt_service =
            AttemptService::new(store.clone(), notifier.clone(), config.default_passing_marks);
        let result_service = ResultService::new(store.clone());
        let certificate_service =
            CertificateService::new(store, notifier, config.certificate_validity_days);

        Self {
            attempt_service,
            result_service,
            certificate_service,
            jwt_secret: Arc::from(config.jwt_secret.as_str()),
        }
    }
}
