use pdftext_core::TextService;

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: TextService,
}
