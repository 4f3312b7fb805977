use std::sync::Arc;

use crate::config::UploadConfig;
use crate::storage::{DocumentStore, ImageStore};

#[derive(Clone)]
pub struct AppState {
    pub images: Arc<ImageStore>,
    pub documents: Arc<DocumentStore>,
    /// Prefix of issued file URLs, without a trailing slash.
    pub base_url: Arc<str>,
    pub uploads: Arc<UploadConfig>,
}
