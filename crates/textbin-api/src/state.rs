use std::sync::Arc;

use crate::service::TextService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub service: TextService,
    pub jwt_secret: String,
    pub environment: String,
}
