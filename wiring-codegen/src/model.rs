//! In-memory declaration model of a single container.
//!
//! A [`Container`] is an ordered list of [`Provider`]s plus the options
//! controlling how strictly it is validated. The model is built once by a
//! front end (see [`crate::parse`]) or by hand, and is then only read by the
//! extractor, validator and generator.

use proc_macro2::Span;
use syn::{Attribute, Expr, ExprClosure, Generics, Ident, Type, Visibility};

/// Lifecycle of a provider inside a container instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// Supplied by the caller of the constructor.
    Input,
    /// Computed at most once per container instance.
    Shared,
    /// Recomputed on every access unless overridden.
    Transient,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Input => "input",
            Scope::Shared => "shared",
            Scope::Transient => "transient",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container-wide switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerOptions {
    /// Require a construction rule for every shared and transient provider.
    pub validate: bool,
    /// Marks a composition root in project graphs.
    pub root: bool,
    /// Check explicit dependency names and dependency cycles.
    pub validate_graph: bool,
    /// Confine the generated container to the thread that built it.
    pub exclusive: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            validate: true,
            root: false,
            validate_graph: true,
            exclusive: false,
        }
    }
}

/// Parameter of a factory closure. `None` is the `_` wildcard.
pub type ClosureParam = Option<Ident>;

/// Closure used as a factory.
#[derive(Debug, Clone)]
pub struct ClosureFactory {
    pub params: Vec<ClosureParam>,
    pub is_async: bool,
    pub fallible: bool,
    pub closure: ExprClosure,
}

impl ClosureFactory {
    /// Builds the closure description, detecting `async |..|` and
    /// `|..| async { .. }` forms and `-> Result<..>` return types.
    ///
    /// Parameters that are neither an identifier nor `_` are returned as
    /// errors so that the caller can report them.
    pub fn from_closure(closure: ExprClosure, fallible: bool) -> Result<Self, Vec<syn::Pat>> {
        let mut params = Vec::with_capacity(closure.inputs.len());
        let mut unnamed = Vec::new();
        for input in &closure.inputs {
            match closure_param_name(input) {
                Some(name) => params.push(name),
                None => unnamed.push(input.clone()),
            }
        }
        if !unnamed.is_empty() {
            return Err(unnamed);
        }
        let is_async =
            closure.asyncness.is_some() || matches!(closure.body.as_ref(), Expr::Async(_));
        let fallible = fallible || returns_result(&closure.output);
        Ok(Self {
            params,
            is_async,
            fallible,
            closure,
        })
    }

    pub fn param_names(&self) -> impl Iterator<Item = &Ident> {
        self.params.iter().flatten()
    }
}

fn closure_param_name(pat: &syn::Pat) -> Option<ClosureParam> {
    match pat {
        syn::Pat::Ident(pat_ident) if pat_ident.subpat.is_none() => {
            Some(Some(pat_ident.ident.clone()))
        }
        syn::Pat::Wild(_) => Some(None),
        syn::Pat::Type(pat_type) => closure_param_name(&pat_type.pat),
        _ => None,
    }
}

fn returns_result(output: &syn::ReturnType) -> bool {
    if let syn::ReturnType::Type(_, ty) = output
        && let Type::Path(type_path) = ty.as_ref()
        && let Some(segment) = type_path.path.segments.last()
    {
        return segment.ident == "Result";
    }
    false
}

/// `typed(Type, dep, ..)`: constructs `Type::new(dep, ..)`.
#[derive(Debug, Clone)]
pub struct TypedFactory {
    pub ty: Type,
    pub deps: Vec<Ident>,
}

/// A `factory = ..` or `async_factory = ..` value.
#[derive(Debug, Clone)]
pub enum Factory {
    Expression(Expr),
    Closure(ClosureFactory),
}

impl Factory {
    /// Classifies an expression, turning closures into [`Factory::Closure`].
    pub fn from_expr(expr: Expr, fallible: bool) -> Result<Self, Vec<syn::Pat>> {
        match expr {
            Expr::Closure(closure) => Ok(Factory::Closure(ClosureFactory::from_closure(
                closure, fallible,
            )?)),
            other => Ok(Factory::Expression(other)),
        }
    }

    pub fn as_closure(&self) -> Option<&ClosureFactory> {
        match self {
            Factory::Closure(closure) => Some(closure),
            Factory::Expression(_) => None,
        }
    }

    pub fn is_async_closure(&self) -> bool {
        self.as_closure().is_some_and(|c| c.is_async)
    }
}

/// The rule that actually produces a provider's value.
#[derive(Debug, Clone, Copy)]
pub enum ConstructionRule<'a> {
    Expression(&'a Expr),
    Closure(&'a ClosureFactory),
    Typed(&'a TypedFactory),
    Initializer(&'a Expr),
}

/// One member of a container.
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: Ident,
    pub ty: Type,
    pub vis: Visibility,
    pub scope: Scope,
    pub factory: Option<Factory>,
    pub async_factory: Option<Factory>,
    pub typed: Option<TypedFactory>,
    pub initializer: Option<Expr>,
    pub concrete: bool,
    pub depends_on: Vec<Ident>,
    /// Attributes passed through to the generated field.
    pub attrs: Vec<Attribute>,
    pub span: Span,
}

impl Provider {
    /// Creates a provider with no construction rule.
    pub fn new(name: Ident, ty: Type, scope: Scope) -> Self {
        let span = name.span();
        Self {
            name,
            ty,
            vis: Visibility::Inherited,
            scope,
            factory: None,
            async_factory: None,
            typed: None,
            initializer: None,
            concrete: false,
            depends_on: Vec::new(),
            attrs: Vec::new(),
            span,
        }
    }

    pub fn with_factory(mut self, factory: Factory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_async_factory(mut self, factory: Factory) -> Self {
        self.async_factory = Some(factory);
        self
    }

    pub fn with_typed(mut self, typed: TypedFactory) -> Self {
        self.typed = Some(typed);
        self
    }

    pub fn with_initializer(mut self, expr: Expr) -> Self {
        self.initializer = Some(expr);
        self
    }

    pub fn with_concrete(mut self, concrete: bool) -> Self {
        self.concrete = concrete;
        self
    }

    pub fn with_depends_on(mut self, names: impl IntoIterator<Item = Ident>) -> Self {
        self.depends_on.extend(names);
        self
    }

    pub fn with_vis(mut self, vis: Visibility) -> Self {
        self.vis = vis;
        self
    }

    pub fn name_str(&self) -> String {
        self.name.to_string()
    }

    /// The effective rule: async factory, then factory, then typed factory,
    /// then initializer.
    pub fn construction_rule(&self) -> Option<ConstructionRule<'_>> {
        if let Some(factory) = self.async_factory.as_ref().or(self.factory.as_ref()) {
            return Some(match factory {
                Factory::Expression(expr) => ConstructionRule::Expression(expr),
                Factory::Closure(closure) => ConstructionRule::Closure(closure),
            });
        }
        if let Some(typed) = &self.typed {
            return Some(ConstructionRule::Typed(typed));
        }
        self.initializer.as_ref().map(ConstructionRule::Initializer)
    }

    /// Every declared rule, regardless of precedence.
    pub fn rules(&self) -> Vec<ConstructionRule<'_>> {
        let mut rules = Vec::new();
        for factory in [&self.async_factory, &self.factory].into_iter().flatten() {
            rules.push(match factory {
                Factory::Expression(expr) => ConstructionRule::Expression(expr),
                Factory::Closure(closure) => ConstructionRule::Closure(closure),
            });
        }
        if let Some(typed) = &self.typed {
            rules.push(ConstructionRule::Typed(typed));
        }
        if let Some(expr) = &self.initializer {
            rules.push(ConstructionRule::Initializer(expr));
        }
        rules
    }

    pub fn has_rule(&self) -> bool {
        self.construction_rule().is_some()
    }

    /// Whether the value is produced by an asynchronous unit of work.
    pub fn is_async(&self) -> bool {
        self.async_factory.is_some()
    }
}

/// A declared container.
#[derive(Debug, Clone)]
pub struct Container {
    pub name: Ident,
    /// Attributes passed through to the generated struct.
    pub attrs: Vec<Attribute>,
    pub vis: Visibility,
    pub generics: Generics,
    pub options: ContainerOptions,
    pub members: Vec<Provider>,
}

impl Container {
    pub fn new(name: Ident, options: ContainerOptions) -> Self {
        Self {
            name,
            attrs: Vec::new(),
            vis: Visibility::Inherited,
            generics: Generics::default(),
            options,
            members: Vec::new(),
        }
    }

    pub fn with_member(mut self, provider: Provider) -> Self {
        self.members.push(provider);
        self
    }

    pub fn member(&self, name: &str) -> Option<&Provider> {
        self.members.iter().find(|p| p.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|p| p.name == name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Provider> {
        self.members.iter().filter(|p| p.scope == Scope::Input)
    }

    /// Names of generic type parameters, which count as polymorphic types.
    pub fn type_params(&self) -> Vec<String> {
        self.generics
            .type_params()
            .map(|param| param.ident.to_string())
            .collect()
    }
}
