use serde::{Deserialize, Serialize};

/// One persisted chunk: `{id, title, content, source, page_number, file_path, embedding}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source: String,
    pub page_number: Option<u32>,
    pub file_path: Option<String>,
    pub embedding: Vec<f32>,
}

/// How stored rows are turned into candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOptions {
    pub snippet_chars: usize,
    pub default_source: String,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self { snippet_chars: 300, default_source: "IEC knowledge base".to_string() }
    }
}

impl RecordOptions {
    pub fn title(&self, title: Option<&str>) -> String {
        match title.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => "untitled".to_string(),
        }
    }

    pub fn source(&self, source: Option<&str>) -> String {
        match source.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => self.default_source.clone(),
        }
    }

    pub fn snippet(&self, content: &str) -> String {
        clip(content, self.snippet_chars)
    }
}

/// First `max_chars` characters followed by `...` when longer.
pub fn clip(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &content[..byte_idx]),
        None => content.to_string(),
    }
}
