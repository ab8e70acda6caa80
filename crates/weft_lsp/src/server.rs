use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::{
    DidChangeConfigurationParams, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DocumentFormattingParams, DocumentOnTypeFormattingOptions,
    DocumentOnTypeFormattingParams, DocumentRangeFormattingParams, InitializeParams,
    InitializeResult, InitializedParams, MessageType, OneOf, ServerCapabilities,
    TextDocumentSyncCapability, TextDocumentSyncKind, TextEdit,
};
use tower_lsp::{LanguageServer, LspService, Server};

use weft_core::{BraceStyle, CompositeParser, EmbeddedFormatter, FormatOptions, FormatPass};

use crate::backend::Backend;
use crate::state::BackendState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WeftFormatConfig {
    pub(crate) indent_size: Option<usize>,
    pub(crate) use_tabs: Option<bool>,
    pub(crate) brace_style: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WeftConfig {
    pub(crate) format: Option<WeftFormatConfig>,
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, _params: InitializeParams) -> Result<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                document_formatting_provider: Some(OneOf::Left(true)),
                document_on_type_formatting_provider: Some(DocumentOnTypeFormattingOptions {
                    first_trigger_character: "}".to_string(),
                    more_trigger_character: None,
                }),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "weft language server ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let config: WeftConfig = match serde_json::from_value(params.settings) {
            Ok(config) => config,
            Err(err) => {
                self.client
                    .log_message(
                        MessageType::WARNING,
                        format!("Failed to parse configuration: {err}"),
                    )
                    .await;
                return;
            }
        };
        let mut state = self.state.lock().await;
        state.format_options_from_config = true;
        if let Some(format) = config.format {
            apply_format_config(&mut state.format_options, format);
        }
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.update_document(params.text_document.uri, params.text_document.text)
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        for change in params.content_changes {
            self.apply_change(&params.text_document.uri, change.range, &change.text)
                .await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.state
            .lock()
            .await
            .documents
            .remove(&params.text_document.uri);
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let uri = params.text_document.uri;
        let Some(source) = self
            .with_document_text(&uri, |content| content.to_string())
            .await
        else {
            return Ok(None);
        };
        let (mut options, from_config) = {
            let state = self.state.lock().await;
            (state.format_options, state.format_options_from_config)
        };
        if !from_config {
            options.indent_size = params.options.tab_size as usize;
            options.use_tabs = !params.options.insert_spaces;
        }
        let parser = Arc::clone(&self.parser);
        let formatter = Arc::clone(&self.formatter);
        let edits = tokio::task::spawn_blocking(move || {
            Backend::build_formatting_edits(
                parser.as_ref(),
                formatter.as_ref(),
                &source,
                options,
                FormatPass::FullDocument,
                None,
            )
        })
        .await
        .map_err(|e| tower_lsp::jsonrpc::Error {
            code: tower_lsp::jsonrpc::ErrorCode::InternalError,
            message: format!("formatting task failed: {e}").into(),
            data: None,
        })?
        .unwrap_or_default();
        Ok(Some(edits))
    }

    async fn on_type_formatting(
        &self,
        params: DocumentOnTypeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        let uri = params.text_document_position.text_document.uri;
        let line = params.text_document_position.position.line as usize;
        let Some(source) = self
            .with_document_text(&uri, |content| content.to_string())
            .await
        else {
            return Ok(None);
        };
        let options = {
            let state = self.state.lock().await;
            state.format_options
        };
        let parser = Arc::clone(&self.parser);
        let formatter = Arc::clone(&self.formatter);
        let edits = tokio::task::spawn_blocking(move || {
            Backend::build_formatting_edits(
                parser.as_ref(),
                formatter.as_ref(),
                &source,
                options,
                FormatPass::OnType,
                Some((line, line + 1)),
            )
        })
        .await
        .ok()
        .and_then(|r| r.ok())
        .unwrap_or_default();
        Ok(Some(edits))
    }

    async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        // Formatting runs whole-document or per keystroke. Advertising
        // range formatting while ignoring the provided range would be
        // surprising, so return no edits and don't advertise it.
        let _ = params;
        Ok(None)
    }
}

pub(crate) fn apply_format_config(options: &mut FormatOptions, config: WeftFormatConfig) {
    if let Some(indent_size) = config.indent_size {
        options.indent_size = indent_size;
    }
    if let Some(use_tabs) = config.use_tabs {
        options.use_tabs = use_tabs;
    }
    if let Some(brace_style) = config.brace_style {
        options.brace_style = match brace_style.as_str() {
            "allman" => BraceStyle::Allman,
            "kr" => BraceStyle::Kr,
            _ => options.brace_style,
        };
    }
}

pub async fn run(
    parser: Arc<dyn CompositeParser + Send + Sync>,
    formatter: Arc<dyn EmbeddedFormatter + Send + Sync>,
) {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let (service, socket) = LspService::new(move |client| Backend {
        client,
        parser: Arc::clone(&parser),
        formatter: Arc::clone(&formatter),
        state: Arc::new(Mutex::new(BackendState::default())),
    });
    Server::new(stdin, stdout, socket).serve(service).await;
}
