//! Operation Registry
//!
//! The declarative catalog of callable operations: the local analytics API
//! surface and the upstream Cosmos REST API. Each operation declares its
//! name, target, path template, parameter schema, pagination convention,
//! and a description used as LLM context.
//!
//! The registry is built once at process start and validated eagerly: a
//! malformed descriptor (duplicate name, path template referencing an
//! undeclared parameter, pagination flag without a rows path) is a
//! configuration error that halts startup. After construction the registry
//! is immutable and safely shared.

pub mod catalog;

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which backend serves an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// The local analytics API
    Local,

    /// The upstream Cosmos REST API
    Upstream,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Local => write!(f, "local"),
            Target::Upstream => write!(f, "upstream"),
        }
    }
}

/// Pagination convention, declared once per operation and never changed at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageConvention {
    /// `skip`/`limit` query parameters (local API)
    OffsetLimit,

    /// Opaque `pagination.key` token (Cosmos REST)
    NextKey,
}

/// Parameter type in an operation schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Bool,
}

impl ParamType {
    /// Whether a JSON value is acceptable for this parameter type.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Float => value.is_number(),
            ParamType::Bool => value.is_boolean(),
        }
    }
}

/// One parameter in an operation schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name
    pub name: String,

    /// Expected type
    pub ty: ParamType,

    /// Whether the parameter must be supplied
    pub required: bool,
}

/// Pagination declaration for an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    /// Cursor convention the backend uses
    pub convention: PageConvention,

    /// Dot-path to the row list inside a response page
    /// (e.g. `delegation_responses`, `validators`, `items`)
    pub rows_path: String,
}

/// Immutable description of one callable operation.
///
/// Created once at startup by the builtin catalog; owned exclusively by the
/// registry and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Unique operation name
    pub name: String,

    /// Which backend serves the operation
    pub target: Target,

    /// HTTP method (the whole surface is read-only, so always GET today)
    pub method: String,

    /// Path template; `{param}` segments are filled from parameters
    pub path: String,

    /// Parameter schema
    pub params: Vec<ParamSpec>,

    /// Pagination declaration, present iff the operation is paginated
    pub paginated: Option<Pagination>,

    /// Free-text description used as LLM context
    pub description: String,
}

impl OperationDescriptor {
    /// Start a descriptor with no parameters and no pagination.
    pub fn new(
        name: impl Into<String>,
        target: Target,
        path: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            method: "GET".to_string(),
            path: path.into(),
            params: Vec::new(),
            paginated: None,
            description: description.into(),
        }
    }

    /// Add a required parameter.
    pub fn with_param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty,
            required: true,
        });
        self
    }

    /// Add an optional parameter.
    pub fn with_optional_param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty,
            required: false,
        });
        self
    }

    /// Declare the operation paginated.
    pub fn with_pagination(
        mut self,
        convention: PageConvention,
        rows_path: impl Into<String>,
    ) -> Self {
        self.paginated = Some(Pagination {
            convention,
            rows_path: rows_path.into(),
        });
        self
    }

    /// Parameter spec by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Names of parameters referenced by the path template.
    pub fn path_params(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.path.as_str();
        while let Some(open) = rest.find('{') {
            let Some(close_rel) = rest[open..].find('}') else {
                break;
            };
            names.push(&rest[open + 1..open + close_rel]);
            rest = &rest[open + close_rel + 1..];
        }
        names
    }
}

/// The operation registry: build-once, read-many.
#[derive(Debug)]
pub struct Registry {
    operations: BTreeMap<String, OperationDescriptor>,
}

impl Registry {
    /// Build a registry from a list of descriptors, validating each one.
    ///
    /// Fails fast with a `Catalog` error on the first malformed descriptor;
    /// the process must not serve requests in that case.
    pub fn new(descriptors: Vec<OperationDescriptor>) -> Result<Self, EngineError> {
        let mut operations = BTreeMap::new();

        for descriptor in descriptors {
            validate_descriptor(&descriptor)?;
            if operations.contains_key(&descriptor.name) {
                return Err(EngineError::Catalog(format!(
                    "Duplicate operation name '{}'",
                    descriptor.name
                )));
            }
            operations.insert(descriptor.name.clone(), descriptor);
        }

        if operations.is_empty() {
            return Err(EngineError::Catalog("Empty operation catalog".into()));
        }

        tracing::info!("Operation registry built with {} operations", operations.len());
        Ok(Self { operations })
    }

    /// Build the registry from the builtin catalog.
    pub fn builtin() -> Result<Self, EngineError> {
        Self::new(catalog::builtin_catalog())
    }

    /// All operations, ordered by name.
    pub fn list(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.values()
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the registry is empty (never true after construction).
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Look up an operation by name.
    pub fn get(&self, name: &str) -> Result<&OperationDescriptor, EngineError> {
        self.operations
            .get(name)
            .ok_or_else(|| EngineError::UnknownOperation(name.to_string()))
    }

    /// Render the catalog as LLM context: one block per operation with its
    /// target, description, parameter schema, and pagination flag.
    pub fn llm_docs(&self) -> String {
        let mut docs = Vec::with_capacity(self.operations.len());
        for op in self.operations.values() {
            let params = if op.params.is_empty() {
                "none".to_string()
            } else {
                op.params
                    .iter()
                    .map(|p| {
                        format!(
                            "{} ({:?}{})",
                            p.name,
                            p.ty,
                            if p.required { ", required" } else { "" }
                        )
                        .to_lowercase()
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let paginated = if op.paginated.is_some() {
                "\n  Paginated: yes (aggregations walk all pages)"
            } else {
                ""
            };
            docs.push(format!(
                "- {} ({}): {}\n  Parameters: {}{}",
                op.name, op.target, op.description, params, paginated
            ));
        }
        docs.join("\n")
    }
}

fn validate_descriptor(op: &OperationDescriptor) -> Result<(), EngineError> {
    if op.name.is_empty() {
        return Err(EngineError::Catalog("Operation with empty name".into()));
    }
    if op.description.is_empty() {
        return Err(EngineError::Catalog(format!(
            "Operation '{}' has no description",
            op.name
        )));
    }

    // Every path template parameter must be declared and required
    for path_param in op.path_params() {
        match op.param(path_param) {
            Some(spec) if spec.required => {}
            Some(_) => {
                return Err(EngineError::Catalog(format!(
                    "Operation '{}': path parameter '{}' must be required",
                    op.name, path_param
                )));
            }
            None => {
                return Err(EngineError::Catalog(format!(
                    "Operation '{}': path template references undeclared parameter '{}'",
                    op.name, path_param
                )));
            }
        }
    }

    // Duplicate parameter names within one schema
    for (i, param) in op.params.iter().enumerate() {
        if op.params[..i].iter().any(|p| p.name == param.name) {
            return Err(EngineError::Catalog(format!(
                "Operation '{}': duplicate parameter '{}'",
                op.name, param.name
            )));
        }
    }

    if let Some(pagination) = &op.paginated {
        if pagination.rows_path.is_empty() {
            return Err(EngineError::Catalog(format!(
                "Operation '{}': paginated but rows_path is empty",
                op.name
            )));
        }
    }

    Ok(())
}
