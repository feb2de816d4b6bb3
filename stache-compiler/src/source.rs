use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

/// Template text together with where it came from, for diagnostics.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    pub id: SourceId,
    pub path: Option<PathBuf>,
    pub contents: String,
}

impl TemplateSource {
    pub fn new(id: SourceId, path: PathBuf, contents: String) -> Self {
        Self {
            id,
            path: Some(path),
            contents,
        }
    }

    pub fn inline(contents: impl Into<String>) -> Self {
        Self {
            id: SourceId(0),
            path: None,
            contents: contents.into(),
        }
    }

    pub fn display_name(&self) -> String {
        self.path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<inline>".to_string())
    }
}
