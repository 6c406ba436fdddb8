use std::sync::Arc;

use crate::config::Config;
use crate::cookies::CookieStore;
use crate::service::JobService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: JobService,
    pub cookies: Arc<CookieStore>,
    pub storage_configured: bool,
}

impl AppState {
    pub fn new(
        config: Config,
        service: JobService,
        cookies: CookieStore,
        storage_configured: bool,
    ) -> Self {
        Self {
            config: Arc::new(config),
            service,
            cookies: Arc::new(cookies),
            storage_configured,
        }
    }
}
