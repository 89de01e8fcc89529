//! Workflow document loader
//!
//! Resolves a workflow id to a document inside a workflows directory and
//! parses it. Documents may be YAML or JSON and support:
//! - `$include` directives for file composition
//! - `${ENV:default}` for environment variable expansion

use crate::config::workflow::Workflow;
use crate::{FlowError, Result};
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use std::borrow::Cow;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").unwrap());

/// File extensions tried, in order, when resolving a workflow id
const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Loads workflow documents by id from a directory
#[derive(Debug, Clone)]
pub struct WorkflowLoader {
    dir: PathBuf,
}

impl WorkflowLoader {
    /// Create a loader rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory searched for documents
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First existing document path for `id`
    pub fn resolve(&self, id: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", id, ext)))
            .find(|path| path.is_file())
    }

    /// Load and validate the workflow named `id`
    pub fn load(&self, id: &str) -> Result<Workflow> {
        let path = self.resolve(id).ok_or_else(|| FlowError::WorkflowNotFound {
            id: id.to_string(),
        })?;
        debug!(path = %path.display(), "Resolved workflow document");
        load_workflow_file(&path)
    }
}

/// Load and validate a workflow document from an explicit path
pub fn load_workflow_file<P: AsRef<Path>>(path: P) -> Result<Workflow> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| FlowError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_document(&content, Some(path))
}

/// Parse document text into a validated workflow
///
/// `origin` is where the text came from. `$include` targets resolve against
/// its directory, so text without an origin cannot include other files.
pub(crate) fn parse_document(content: &str, origin: Option<&Path>) -> Result<Workflow> {
    let mut reader = DocumentReader::default();
    if let Some(path) = origin {
        reader.chain.push(canonical(path));
    }
    let json = reader.read(content, origin)?;

    let workflow: Workflow = serde_json::from_value(json)
        .map_err(|e| FlowError::InvalidWorkflow(format!("{}: {}", document_name(origin), e)))?;
    workflow.validate()?;
    Ok(workflow)
}

/// Replace `${VAR}` and `${VAR:default}` with the environment value
///
/// An unset variable without a default expands to an empty string.
pub(crate) fn expand_env(s: &str) -> Cow<'_, str> {
    ENV_PLACEHOLDER.replace_all(s, |caps: &Captures| {
        env::var(&caps[1]).unwrap_or_else(|_| {
            caps.get(2).map_or("", |default| default.as_str()).to_string()
        })
    })
}

/// Turns YAML text into JSON, splicing `$include` documents and expanding
/// environment placeholders in string values on the way
#[derive(Default)]
struct DocumentReader {
    /// Documents being read, outermost first
    chain: Vec<PathBuf>,
}

impl DocumentReader {
    fn read(&mut self, content: &str, origin: Option<&Path>) -> Result<JsonValue> {
        let yaml: YamlValue = serde_yaml::from_str(content).map_err(|e| {
            FlowError::InvalidWorkflow(format!("Failed to parse {}: {}", document_name(origin), e))
        })?;
        self.convert(yaml, origin, "")
    }

    /// `at` is the dotted location of `value` inside its document
    fn convert(&mut self, value: YamlValue, origin: Option<&Path>, at: &str) -> Result<JsonValue> {
        Ok(match value {
            YamlValue::Null => JsonValue::Null,
            YamlValue::Bool(b) => JsonValue::Bool(b),
            YamlValue::Number(n) => json_number(&n, origin, at)?,
            YamlValue::String(s) => JsonValue::String(expand_env(&s).into_owned()),
            YamlValue::Sequence(items) => JsonValue::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| self.convert(item, origin, &format!("{}[{}]", at, i)))
                    .collect::<Result<_>>()?,
            ),
            YamlValue::Mapping(map) => {
                if let Some(target) = map.get("$include") {
                    let target = target.as_str().ok_or_else(|| {
                        invalid_at(origin, at, "`$include` must name a file")
                    })?;
                    return self.include(target, origin, at);
                }

                let mut object = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    let key = match key {
                        YamlValue::String(s) => s,
                        YamlValue::Number(n) => n.to_string(),
                        YamlValue::Bool(b) => b.to_string(),
                        _ => return Err(invalid_at(origin, at, "mapping keys must be scalars")),
                    };
                    let child_at = if at.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", at, key)
                    };
                    let value = self.convert(value, origin, &child_at)?;
                    object.insert(key, value);
                }
                JsonValue::Object(object)
            }
            YamlValue::Tagged(tagged) => self.convert(tagged.value, origin, at)?,
        })
    }

    fn include(&mut self, target: &str, origin: Option<&Path>, at: &str) -> Result<JsonValue> {
        let base = origin.and_then(Path::parent).ok_or_else(|| {
            invalid_at(
                origin,
                at,
                &format!("cannot include '{}' without a document path", target),
            )
        })?;
        let path = base.join(target);

        let key = canonical(&path);
        if self.chain.contains(&key) {
            return Err(invalid_at(
                origin,
                at,
                &format!("include cycle through {}", path.display()),
            ));
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            FlowError::Config(format!(
                "{} at {} includes {}: {}",
                document_name(origin),
                location(at),
                path.display(),
                e
            ))
        })?;
        debug!(path = %path.display(), at = %location(at), "Including document");

        self.chain.push(key);
        let value = self.read(&content, Some(&path));
        self.chain.pop();
        value
    }
}

fn json_number(n: &serde_yaml::Number, origin: Option<&Path>, at: &str) -> Result<JsonValue> {
    if let Some(i) = n.as_i64() {
        return Ok(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.into());
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .ok_or_else(|| invalid_at(origin, at, &format!("{} is not a JSON number", n)))
}

fn invalid_at(origin: Option<&Path>, at: &str, problem: &str) -> FlowError {
    FlowError::InvalidWorkflow(format!(
        "{} at {}: {}",
        document_name(origin),
        location(at),
        problem
    ))
}

fn document_name(origin: Option<&Path>) -> String {
    origin.map_or_else(|| "inline document".to_string(), |p| p.display().to_string())
}

fn location(at: &str) -> &str {
    if at.is_empty() {
        "top level"
    } else {
        at
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
