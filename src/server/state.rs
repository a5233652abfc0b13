//! State shared by every handler.

use crate::convert::Md2Pdf;
use std::sync::Arc;

/// Shared application state accessible to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Md2Pdf>,
}

impl AppState {
    pub fn new(engine: Arc<Md2Pdf>) -> Self {
        Self { engine }
    }
}
