use std::sync::Arc;

use tokio::sync::Mutex;
use tower_lsp::lsp_types::{Position, Range, TextEdit as LspTextEdit, Url};
use tower_lsp::Client;

use weft_core::{
    format_document, CancelToken, CompositeParser, EmbeddedFormatter, FormatOptions, FormatPass,
    FormatRequest, LineIndex, ParseError, TextEdit,
};

use crate::state::BackendState;

pub(crate) struct Backend {
    pub(crate) client: Client,
    pub(crate) parser: Arc<dyn CompositeParser + Send + Sync>,
    pub(crate) formatter: Arc<dyn EmbeddedFormatter + Send + Sync>,
    pub(crate) state: Arc<Mutex<BackendState>>,
}

impl Backend {
    pub(crate) async fn update_document(&self, uri: Url, text: String) {
        let mut state = self.state.lock().await;
        state.documents.entry(uri).or_default().text = text;
    }

    pub(crate) async fn apply_change(&self, uri: &Url, range: Option<Range>, new_text: &str) {
        let mut state = self.state.lock().await;
        let Some(doc) = state.documents.get_mut(uri) else {
            return;
        };
        apply_content_change(&mut doc.text, range, new_text);
    }

    pub(crate) async fn with_document_text<T>(
        &self,
        uri: &Url,
        f: impl FnOnce(&str) -> T,
    ) -> Option<T> {
        let state = self.state.lock().await;
        state.documents.get(uri).map(|doc| f(&doc.text))
    }

    /// Parses the snapshot and runs one formatting attempt. Engine-side
    /// rejections (gates, cancellation, structural errors) all surface as
    /// an empty edit list; only a parse failure is reported.
    pub(crate) fn build_formatting_edits(
        parser: &dyn CompositeParser,
        formatter: &dyn EmbeddedFormatter,
        text: &str,
        options: FormatOptions,
        pass: FormatPass,
        line_range: Option<(usize, usize)>,
    ) -> Result<Vec<LspTextEdit>, ParseError> {
        let (tree, mappings) = parser.parse(text)?;
        let request = FormatRequest {
            text,
            tree: &tree,
            mappings: &mappings,
            options,
            pass,
            line_range,
        };
        let edits = format_document(&request, formatter, None, &CancelToken::new())
            .unwrap_or_default();
        Ok(to_lsp_edits(text, edits))
    }
}

/// Applies one LSP content change to a document snapshot.
pub(crate) fn apply_content_change(text: &mut String, range: Option<Range>, new_text: &str) {
    match range {
        None => *text = new_text.to_string(),
        Some(range) => {
            let index = LineIndex::new(text);
            let start = index.offset_of(range.start.line as usize, range.start.character as usize);
            let end = index.offset_of(range.end.line as usize, range.end.character as usize);
            text.replace_range(start..end, new_text);
        }
    }
}

pub(crate) fn to_lsp_edits(text: &str, edits: Vec<TextEdit>) -> Vec<LspTextEdit> {
    let index = LineIndex::new(text);
    edits
        .into_iter()
        .map(|edit| {
            let (start_line, start_col) = index.position_of(edit.span.offset);
            let (end_line, end_col) = index.position_of(edit.span.end());
            LspTextEdit {
                range: Range {
                    start: Position::new(start_line as u32, start_col as u32),
                    end: Position::new(end_line as u32, end_col as u32),
                },
                new_text: edit.new_text,
            }
        })
        .collect()
}
