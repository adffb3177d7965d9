use proc_macro2::{Span, TokenStream};
use thiserror::Error;

/// Everything that can be reported about a container declaration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    // Structural usage errors.
    #[error("{0}")]
    Syntax(String),
    #[error("`{0}` has more than one binding")]
    MultipleBindings(String),
    #[error("container members must be named fields")]
    MissingName,
    #[error("`{0}` needs an explicit type")]
    MissingType(String),
    #[error("`{0}` needs one of #[input], #[shared] or #[transient]")]
    UnknownScope(String),
    #[error("unknown option `{key}` on `{subject}`")]
    UnknownOption { subject: String, key: String },
    #[error("duplicate member `{0}`")]
    DuplicateMember(String),
    #[error("input `{0}` cannot declare a construction rule")]
    InputWithConstructionRule(String),
    #[error("factory for `{0}` has a parameter that is neither a name nor `_`")]
    UnnamedClosureParameter(String),

    // Policy errors.
    #[error("{scope} `{name}` needs a factory, typed factory or initializer")]
    MissingFactory { name: String, scope: String },
    #[error("`{name}` binds the concrete type `{ty}`; add `concrete` to allow it")]
    ConcreteOptInRequired { name: String, ty: String },
    #[error("`{0}` declares both a factory and an async factory")]
    ConflictingFactories(String),
    #[error("input `{0}` cannot be produced by an async factory")]
    AsyncFactoryOnInput(String),
    #[error("async factory for `{0}` must be an async closure")]
    NonAsyncFactory(String),

    // Graph errors.
    #[error("`{name}` depends on unknown member `{dependency}`")]
    UnknownDependency { name: String, dependency: String },
    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    // Binding errors.
    #[error("no binding for parameter `{parameter}` of `{name}`")]
    UnboundParameter { name: String, parameter: String },
    #[error("`{name}` is built synchronously but `{dependency}` is produced asynchronously")]
    SyncDependsOnAsync { name: String, dependency: String },
}

/// A reported problem anchored at a provider or container.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub subject: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            subject: subject.into(),
            span,
        }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn to_syn_error(&self) -> syn::Error {
        syn::Error::new(self.span, self.message())
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.subject, self.kind)
    }
}

/// Renders diagnostics as `compile_error!` invocations, one per diagnostic.
pub fn to_compile_errors(diagnostics: &[Diagnostic]) -> TokenStream {
    let mut combined: Option<syn::Error> = None;
    for diagnostic in diagnostics {
        let error = diagnostic.to_syn_error();
        match &mut combined {
            Some(v) => v.combine(error),
            None => combined = Some(error),
        }
    }
    combined
        .map(|v| v.to_compile_error())
        .unwrap_or_default()
}
