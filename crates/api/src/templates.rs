//! Handlebars template registry.
//!
//! Built-in templates are compiled into the binary. Any `*.hbs` file in the
//! configured templates directory is registered under its file stem and
//! replaces the built-in template of the same name.

use std::path::Path;

use handlebars::Handlebars;
use serde::Serialize;

/// Name of the page served at `/about_us`.
pub const ABOUT_US: &str = "about_us";

const BUILTIN: &[(&str, &str)] = &[(ABOUT_US, "<h1>Nothing to say anymore.</h1>")];

const TEMPLATE_EXTENSION: &str = "hbs";

#[derive(Debug, thiserror::Error)]
pub enum TemplateLoadError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Template error: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),
}

pub struct Templates {
    handlebars: Handlebars<'static>,
}

impl Templates {
    /// Registry holding only the built-in templates.
    pub fn builtin() -> Result<Self, TemplateLoadError> {
        let mut handlebars = Handlebars::new();
        for &(name, source) in BUILTIN {
            handlebars
                .register_template_string(name, source)
                .map_err(Box::new)?;
        }
        Ok(Self { handlebars })
    }

    /// Built-in templates plus the `*.hbs` files found in `dir`.
    ///
    /// A missing directory is not an error.
    pub fn load(dir: &Path) -> Result<Self, TemplateLoadError> {
        let mut templates = Self::builtin()?;
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "No templates directory, using built-ins");
            return Ok(templates);
        }

        let io_err = |source| TemplateLoadError::Io {
            path: dir.display().to_string(),
            source,
        };
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(TEMPLATE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            templates
                .handlebars
                .register_template_file(name, &path)
                .map_err(Box::new)?;
            tracing::debug!(name, path = %path.display(), "Registered template");
        }
        Ok(templates)
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }

    pub fn render<T: Serialize>(
        &self,
        name: &str,
        context: &T,
    ) -> Result<String, handlebars::RenderError> {
        self.handlebars.render(name, context)
    }
}
