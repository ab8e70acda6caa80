use std::collections::HashMap;

use tower_lsp::lsp_types::Url;
use weft_core::FormatOptions;

#[derive(Default)]
pub(super) struct DocumentState {
    pub(super) text: String,
}

#[derive(Default)]
pub(super) struct BackendState {
    pub(super) documents: HashMap<Url, DocumentState>,
    pub(super) format_options: FormatOptions,
    /// Once options arrive via `didChangeConfiguration`, per-request
    /// editor options stop overriding them.
    pub(super) format_options_from_config: bool,
}
