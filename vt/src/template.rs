//! Template rendering
//!
//! Tests describe the infrastructure they need as Terraform directives with
//! `{{.Name}}` substitution markers. The renderer fills them from a
//! [`TemplateData`] bag, stores the result as an artifact named after the
//! calling test and hands the text back to the test.

use std::sync::LazyLock;

use handlebars::Handlebars;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::FUNC_NAME_KEY;
use crate::artifact::{ArtifactError, ArtifactWriter};
use crate::caller::{CallStack, short_name};

/// Matches `{{.Name}}` and `{{ .Outer.Inner }}`
static DOT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*\}\}")
        .expect("marker pattern is valid")
});

/// Values substituted into a template, keyed by marker name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TemplateData(Map<String, Value>);

impl TemplateData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Name the artifact explicitly instead of after the calling function
    pub fn with_func_name(self, name: impl Into<String>) -> Self {
        self.with(FUNC_NAME_KEY, name.into())
    }

    /// Artifact name override, when set to a string
    pub fn func_name(&self) -> Option<&str> {
        match self.0.get(FUNC_NAME_KEY) {
            Some(Value::String(name)) => Some(name),
            Some(other) => {
                warn!("Ignoring non-string {} value: {}", FUNC_NAME_KEY, other);
                None
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for TemplateData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for TemplateData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Rewrite `{{.Name}}` markers into Handlebars paths (`{{Name}}`)
pub fn translate_markers(template: &str) -> String {
    DOT_MARKER.replace_all(template, "{{${1}}}").into_owned()
}

/// Fills templates and records each result as an artifact
#[derive(Debug)]
pub struct TemplateRenderer {
    /// Strict, non-escaping Handlebars registry
    hbs: Handlebars<'static>,
    writer: ArtifactWriter,
    /// Frames skipped above the innermost one when naming artifacts
    skip_frames: usize,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(ArtifactWriter::default())
    }
}

impl TemplateRenderer {
    pub fn new(writer: ArtifactWriter) -> Self {
        let mut hbs = Handlebars::new();
        // A marker without a value is an error, never an empty substitution
        hbs.set_strict_mode(true);
        // Output is HCL, not HTML: values are substituted verbatim
        hbs.register_escape_fn(handlebars::no_escape);

        Self {
            hbs,
            writer,
            skip_frames: 0,
        }
    }

    /// Name artifacts after the frame `skip_frames` levels above the innermost one
    pub fn with_skip_frames(mut self, skip_frames: usize) -> Self {
        self.skip_frames = skip_frames;
        self
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    /// Artifact name for this call: the `FuncName` override or the caller's short name
    pub fn attribution_name(&self, stack: &CallStack, data: &TemplateData) -> String {
        match data.func_name() {
            Some(name) => name.to_string(),
            None => short_name(&stack.resolve_caller_name(self.skip_frames)),
        }
    }

    /// Substitute `data` into `template` without writing anything
    ///
    /// `None` on parse or execution failure.
    pub fn fill(&self, template: &str, data: &TemplateData) -> Option<String> {
        let source = translate_markers(template);
        match self.hbs.render_template(&source, data) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Failed to render template: {}", e);
                None
            }
        }
    }

    /// Render `template`, persist it as an artifact and return the text
    ///
    /// A template that fails to render yields an empty string and no
    /// artifact; the calling test must treat an empty result as a failure.
    /// A template that renders successfully to zero bytes is handled the
    /// same way: it returns `Ok("")`, writes no artifact and does not stop
    /// the run, even though writing zero bytes is itself a fatal artifact
    /// error. Errors are reserved for artifacts that could not be written.
    pub fn render(&self, stack: &CallStack, template: &str, data: &TemplateData) -> Result<String, ArtifactError> {
        let name = self.attribution_name(stack, data);
        debug!(%name, keys = data.len(), "TemplateRenderer::render: called");

        let Some(text) = self.fill(template, data) else {
            warn!("Template for '{}' did not render, returning empty result", name);
            return Ok(String::new());
        };
        if text.is_empty() {
            warn!("Template for '{}' rendered to nothing, returning empty result", name);
            return Ok(String::new());
        }

        self.writer.write(&name, text.as_bytes())?;
        Ok(text)
    }
}
