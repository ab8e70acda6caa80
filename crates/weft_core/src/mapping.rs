use crate::document::SourceSpan;

/// Pairing of a span in the original composite document with the
/// corresponding span in the generated embedded-language document.
/// Produced by the external parser; read-only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapping {
    pub original: SourceSpan,
    pub generated: SourceSpan,
}

impl SourceMapping {
    pub fn new(original: SourceSpan, generated: SourceSpan) -> Self {
        Self { original, generated }
    }
}

/// Bidirectional offset translation over a sorted mapping list.
///
/// Original spans are non-overlapping; both lookups accept a span's
/// end offset so mapping boundaries stay translatable.
#[derive(Debug, Clone, Default)]
pub struct SpanMapper {
    mappings: Vec<SourceMapping>,
    // Indices into `mappings`, ordered by generated offset.
    by_generated: Vec<usize>,
}

impl SpanMapper {
    pub fn new(mut mappings: Vec<SourceMapping>) -> Self {
        mappings.sort_by_key(|m| m.original.offset);
        let mut by_generated: Vec<usize> = (0..mappings.len()).collect();
        by_generated.sort_by_key(|&i| mappings[i].generated.offset);
        Self {
            mappings,
            by_generated,
        }
    }

    pub fn mappings(&self) -> &[SourceMapping] {
        &self.mappings
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Mapping whose original span contains `offset` (end-inclusive).
    pub fn mapping_at_original(&self, offset: usize) -> Option<&SourceMapping> {
        let idx = self
            .mappings
            .partition_point(|m| m.original.offset <= offset);
        let mapping = self.mappings.get(idx.checked_sub(1)?)?;
        (offset <= mapping.original.end()).then_some(mapping)
    }

    /// Mapping whose generated span contains `offset` (end-inclusive).
    pub fn mapping_at_generated(&self, offset: usize) -> Option<&SourceMapping> {
        let idx = self
            .by_generated
            .partition_point(|&i| self.mappings[i].generated.offset <= offset);
        let mapping = &self.mappings[*self.by_generated.get(idx.checked_sub(1)?)?];
        (offset <= mapping.generated.end()).then_some(mapping)
    }

    /// Generated offset for an original offset inside a mapped run.
    pub fn to_generated(&self, offset: usize) -> Option<usize> {
        let mapping = self.mapping_at_original(offset)?;
        Some(mapping.generated.offset + (offset - mapping.original.offset))
    }

    /// Original offset for a generated offset inside a mapped run.
    pub fn to_original(&self, offset: usize) -> Option<usize> {
        let mapping = self.mapping_at_generated(offset)?;
        Some(mapping.original.offset + (offset - mapping.generated.offset))
    }
}
