//! Template loading.

use std::path::{Path, PathBuf};
use tracing::debug;

use super::inputs::is_url;
use crate::core::TemplateSource;
use crate::errors::DeployError;

/// Default directory holding synthesized templates.
pub const DEFAULT_TEMPLATE_DIR: &str = "cdk.out";

/// Resolves the template for a stack.
#[cfg_attr(test, mockall::automock)]
pub trait TemplateLoader: Send + Sync {
    /// Loads the template for `stack`.
    fn load(&self, stack: &str) -> Result<TemplateSource, DeployError>;
}

/// Reads `<workspace>/<template_dir>/<stack>.template.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTemplateLoader {
    root: PathBuf,
}

impl FileTemplateLoader {
    /// Creates a loader. An absolute `template_dir` ignores `workspace`.
    #[must_use]
    pub fn new(workspace: impl AsRef<Path>, template_dir: impl AsRef<Path>) -> Self {
        Self {
            root: workspace.as_ref().join(template_dir),
        }
    }

    /// Returns the template path for `stack`.
    #[must_use]
    pub fn path(&self, stack: &str) -> PathBuf {
        self.root.join(format!("{stack}.template.json"))
    }
}

impl TemplateLoader for FileTemplateLoader {
    fn load(&self, stack: &str) -> Result<TemplateSource, DeployError> {
        let path = self.path(stack);
        debug!(stack = %stack, path = %path.display(), "Loading Stack template");

        std::fs::read_to_string(&path)
            .map(TemplateSource::Body)
            .map_err(|e| DeployError::Template {
                stack: stack.to_string(),
                message: format!("{}: {e}", path.display()),
            })
    }
}

/// Interprets an explicit template value: an https URL is a reference,
/// anything else is the template body.
#[must_use]
pub fn template_from_input(value: &str) -> TemplateSource {
    if is_url(value) {
        TemplateSource::Url(value.to_string())
    } else {
        TemplateSource::Body(value.to_string())
    }
}
