use std::sync::Arc;

use crate::batch::BatchGenerator;
use crate::config::Config;
use crate::db::{CertificateRepository, TrackRepository};
use crate::pdf::{RenderSettings, Renderer};
use crate::services::{CertificateService, TrackService};
use crate::storage::ObjectStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub renderer: Renderer,
    pub certificates: Arc<CertificateService>,
    pub tracks: Arc<TrackService>,
}

impl AppState {
    /// Wires the services over the given repositories and object store.
    pub fn new(
        config: Arc<Config>,
        certificate_repo: Arc<dyn CertificateRepository>,
        track_repo: Arc<dyn TrackRepository>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let renderer = Renderer::new(RenderSettings {
            vertical_correction: config.vertical_correction,
        });
        let generator = BatchGenerator::new(store.clone(), renderer.clone());

        let tracks = Arc::new(TrackService::new(
            track_repo,
            certificate_repo.clone(),
            generator.clone(),
        ));
        let certificates = Arc::new(CertificateService::new(
            certificate_repo,
            tracks.clone(),
            store,
            generator,
            config.legacy_web_root.clone(),
        ));

        Self {
            config,
            renderer,
            certificates,
            tracks,
        }
    }
}
