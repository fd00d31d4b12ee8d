use crate::FieldPath;

pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// The three failure categories callers are expected to distinguish when reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorKind {
    Compilation,
    UnscopedContext,
    CircularFragment,
}

/// A request-scoped compilation failure. Every variant carries the path of the
/// offending field so it can be reported as a field error.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Field '{path}' references the parameter '{parameter}' which is not bound by any enclosing context")]
    DanglingContext { path: FieldPath, parameter: String },
    #[error("Variable ${name} used by '{path}' is missing")]
    MissingVariable { path: FieldPath, name: String },
    #[error("Missing argument named '{name}' for field '{path}'")]
    MissingArgument { path: FieldPath, name: String },
    #[error("The field `{path}` does not have an argument named `{name}`")]
    UnknownArgument { path: FieldPath, name: String },
    #[error("Directive @{directive} on '{path}' requires a boolean `if` argument")]
    InvalidDirectiveArgument { path: FieldPath, directive: String },
    #[error("Unknown fragment named '{name}'")]
    UnknownFragment { path: FieldPath, name: String },
    #[error(
        "Field '{path}' reads the whole context parameter '{parameter}'. Fields requiring a service must select the specific members they depend on."
    )]
    UnscopedContext { path: FieldPath, parameter: String },
    #[error("Fragment '{name}' spreads itself through {}", .cycle.join(" -> "))]
    CircularFragment {
        path: FieldPath,
        name: String,
        cycle: Vec<String>,
    },
    #[error("Field '{path}' depends on '{member}' which was not fetched by the data pass")]
    MissingDependency { path: FieldPath, member: String },
    #[error("Field '{path}' could only be rebased by matching parameters of type {ty}, which is disabled")]
    TypeMatchRejected { path: FieldPath, ty: String },
    #[error("Field '{path}' was expected to resolve to {expected} but resolves to {found}")]
    ShapeMismatch {
        path: FieldPath,
        expected: &'static str,
        found: String,
    },
    #[error("Field '{path}' exceeds the maximum selection depth of {max_depth}")]
    DepthLimit { path: FieldPath, max_depth: usize },
    #[error("Extension {extension} failed on '{path}': {message}")]
    Extension {
        path: FieldPath,
        extension: String,
        message: String,
    },
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::UnscopedContext { .. } => ErrorKind::UnscopedContext,
            CompileError::CircularFragment { .. } => ErrorKind::CircularFragment,
            _ => ErrorKind::Compilation,
        }
    }

    pub fn path(&self) -> &FieldPath {
        match self {
            CompileError::DanglingContext { path, .. }
            | CompileError::MissingVariable { path, .. }
            | CompileError::MissingArgument { path, .. }
            | CompileError::UnknownArgument { path, .. }
            | CompileError::InvalidDirectiveArgument { path, .. }
            | CompileError::UnknownFragment { path, .. }
            | CompileError::UnscopedContext { path, .. }
            | CompileError::CircularFragment { path, .. }
            | CompileError::MissingDependency { path, .. }
            | CompileError::TypeMatchRejected { path, .. }
            | CompileError::ShapeMismatch { path, .. }
            | CompileError::DepthLimit { path, .. }
            | CompileError::Extension { path, .. } => path,
        }
    }
}
