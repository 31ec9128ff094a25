//! Template directory discovery.

use crate::image::io::{has_template_extension, load_rgb_image};
use crate::image::pyramid::ScaleBand;
use crate::template::Template;
use crate::util::{AutoSceneError, AutoSceneResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The active, read-only set of templates shared by all matcher workers.
pub struct TemplateSet {
    templates: Vec<Template>,
}

impl TemplateSet {
    /// Wraps already built templates. An empty set is rejected.
    pub fn from_templates(templates: Vec<Template>, origin: &str) -> AutoSceneResult<Self> {
        if templates.is_empty() {
            return Err(AutoSceneError::NoTemplatesAvailable {
                dir: origin.to_string(),
            });
        }
        Ok(Self { templates })
    }

    /// Loads every image with a recognized extension from `dir`.
    ///
    /// Files are visited in name order. Files that fail to decode, or whose
    /// scale band ends up empty, are logged and skipped.
    pub fn load_dir(dir: impl AsRef<Path>, band: &ScaleBand) -> AutoSceneResult<Self> {
        let dir = dir.as_ref();
        let origin = dir.display().to_string();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %origin, %err, "template directory is unreadable");
                return Err(AutoSceneError::NoTemplatesAvailable { dir: origin });
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_template_extension(path))
            .collect();
        paths.sort();

        let mut templates = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let built = load_rgb_image(&path).and_then(|rgb| Template::from_frame(&name, &rgb, band));
            match built {
                Ok(template) => {
                    info!(template = %name, levels = template.levels().len(), "loaded template");
                    templates.push(template);
                }
                Err(err) => warn!(template = %name, %err, "skipping template"),
            }
        }

        Self::from_templates(templates, &origin)
    }

    /// Returns the templates in load order.
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Returns the number of active templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Always false for a constructed set; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
