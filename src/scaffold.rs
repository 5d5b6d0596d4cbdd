//! Materializes the template catalog into a project directory.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::BotSpec;
use crate::error::{ProvisionError, Result};
use crate::templates::TemplateSet;

/// Where a scaffold run landed and every file it wrote, in catalog order.
#[derive(Debug, Clone)]
pub struct ScaffoldResult {
    pub root: PathBuf,
    pub files_written: Vec<PathBuf>,
}

pub struct Scaffolder {
    templates: TemplateSet,
    output_dir: PathBuf,
}

impl Scaffolder {
    pub fn new(templates: TemplateSet, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates,
            output_dir: output_dir.into(),
        }
    }

    /// Render every catalog entry for `spec` under `<output_dir>/<name>/`.
    /// Existing files are overwritten with identical content, so re-running
    /// after a crash repairs a partial tree instead of accumulating state.
    pub async fn scaffold(&self, spec: &BotSpec) -> Result<ScaffoldResult> {
        let root = self.output_dir.join(&spec.name);
        let vars: [(&str, &str); 5] = [
            ("name", spec.name.as_str()),
            ("bot_id", spec.bot_id.as_str()),
            ("pair", spec.pair.as_str()),
            ("strategy", spec.strategy.as_str()),
            ("timeframe", spec.timeframe.as_str()),
        ];

        let mut files_written = Vec::with_capacity(self.templates.len());
        for (name, template) in self.templates.entries() {
            let rendered = self.templates.render(name, &vars)?;
            let target = root.join(template.path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| fs_error(parent, source))?;
            }
            tokio::fs::write(&target, rendered)
                .await
                .map_err(|source| fs_error(&target, source))?;
            files_written.push(PathBuf::from(template.path));
        }

        info!(
            "✓ Scaffolded {} files under {}",
            files_written.len(),
            root.display()
        );
        Ok(ScaffoldResult {
            root,
            files_written,
        })
    }
}

fn fs_error(path: &Path, source: std::io::Error) -> ProvisionError {
    ProvisionError::Filesystem {
        path: path.to_path_buf(),
        source,
    }
}
