use std::path::{Path, PathBuf};

use tera::{Context, Tera};

use crate::error::{Error, Result};

/// A template file located on disk.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    pub path: PathBuf,
    pub body: String,
}

/// Find the first existing `root/candidate`, trying roots in order and, within
/// each root, candidates in order.
pub fn find_template(roots: &[PathBuf], candidates: &[&str]) -> Result<Option<TemplateSource>> {
    for root in roots {
        for candidate in candidates {
            let path = root.join(candidate);
            if path.is_file() {
                let body = std::fs::read_to_string(&path)?;
                tracing::debug!(path = %path.display(), "found template");
                return Ok(Some(TemplateSource { path, body }));
            }
        }
    }
    Ok(None)
}

/// Expand a template. Output is not HTML-escaped.
pub fn render(path: &Path, body: &str, context: &Context) -> Result<String> {
    Tera::one_off(body, context, false).map_err(|source| Error::Template {
        name: path.display().to_string(),
        source,
    })
}
