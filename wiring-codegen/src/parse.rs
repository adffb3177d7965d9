//! Front end turning annotated structs into [`Container`] models.
//!
//! ```text
//! #[container(root, validate_graph = true)]
//! pub struct App {
//!     #[input]
//!     config: Arc<Config>,
//!     #[shared(factory = |config| Arc::new(ConsoleLogger::new(&config)))]
//!     logger: Arc<dyn Logger>,
//!     #[transient(typed(RequestId), concrete)]
//!     request_id: RequestId,
//! }
//! ```
//!
//! Usage problems are reported as diagnostics next to the model instead of
//! stopping at the first one.

use proc_macro2::TokenStream;
use quote::ToTokens as _;
use syn::meta::ParseNestedMeta;
use syn::parse::Parser as _;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned as _;
use syn::{Attribute, Expr, Fields, Ident, Item, ItemStruct, LitBool, Meta, Token, Type};

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::model::{Container, ContainerOptions, Factory, Provider, Scope, TypedFactory};

pub const CONTAINER_ATTR: &str = "container";
const INPUT_ATTR: &str = "input";
const SHARED_ATTR: &str = "shared";
const TRANSIENT_ATTR: &str = "transient";
const DEPENDS_ON_ATTR: &str = "depends_on";

/// A container model together with the usage problems found while building it.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub container: Container,
    pub diagnostics: Vec<Diagnostic>,
}

/// A container found in a source file.
#[derive(Debug, Clone)]
pub struct FileContainer {
    /// Names of the inline modules enclosing the struct.
    pub modules: Vec<String>,
    pub parsed: Parsed,
}

/// Parses the arguments of `#[container(..)]` and the struct it annotates.
pub fn parse_container(args: TokenStream, item: ItemStruct) -> Parsed {
    let mut diagnostics = Vec::new();
    let subject = item.ident.to_string();
    let options = parse_options(args, &subject, &mut diagnostics);
    let mut container = Container::new(item.ident.clone(), options);
    container.vis = item.vis.clone();
    container.generics = item.generics.clone();
    container.attrs = item
        .attrs
        .iter()
        .filter(|attr| !is_container_attr(attr))
        .cloned()
        .collect();

    match item.fields {
        Fields::Named(fields) => {
            for field in fields.named {
                if let Some(provider) = parse_field(field, &mut diagnostics) {
                    container.members.push(provider);
                }
            }
        }
        Fields::Unnamed(fields) => diagnostics.push(Diagnostic::new(
            DiagnosticKind::MissingName,
            subject,
            fields.span(),
        )),
        Fields::Unit => {}
    }
    Parsed {
        container,
        diagnostics,
    }
}

/// Parses a struct carrying `#[container]` or `#[wiring::container]`.
pub fn parse_annotated(item: &ItemStruct) -> Option<Parsed> {
    let attr = item.attrs.iter().find(|attr| is_container_attr(attr))?;
    let args = match &attr.meta {
        Meta::List(list) => list.tokens.clone(),
        _ => TokenStream::new(),
    };
    Some(parse_container(args, item.clone()))
}

/// Finds every annotated struct in a file, descending into inline modules.
pub fn scan_file(file: &syn::File) -> Vec<FileContainer> {
    let mut found = Vec::new();
    scan_items(&file.items, &mut Vec::new(), &mut found);
    found
}

fn scan_items(items: &[Item], modules: &mut Vec<String>, found: &mut Vec<FileContainer>) {
    for item in items {
        match item {
            Item::Struct(item) => {
                if let Some(parsed) = parse_annotated(item) {
                    found.push(FileContainer {
                        modules: modules.clone(),
                        parsed,
                    });
                }
            }
            Item::Mod(module) => {
                if let Some((_, items)) = &module.content {
                    modules.push(module.ident.to_string());
                    scan_items(items, modules, found);
                    modules.pop();
                }
            }
            _ => {}
        }
    }
}

fn is_container_attr(attr: &Attribute) -> bool {
    attr.path()
        .segments
        .last()
        .is_some_and(|segment| segment.ident == CONTAINER_ATTR)
}

fn parse_options(
    args: TokenStream,
    subject: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> ContainerOptions {
    let mut options = ContainerOptions::default();
    let mut unknown = Vec::new();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("validate") {
            options.validate = parse_flag(&meta)?;
        } else if meta.path.is_ident("root") {
            options.root = parse_flag(&meta)?;
        } else if meta.path.is_ident("validate_graph") {
            options.validate_graph = parse_flag(&meta)?;
        } else if meta.path.is_ident("exclusive") {
            options.exclusive = parse_flag(&meta)?;
        } else {
            unknown.push((path_string(&meta.path), meta.path.span()));
            skip_value(&meta)?;
        }
        Ok(())
    });
    if let Err(error) = parser.parse2(args) {
        diagnostics.push(syntax_error(subject, error));
    }
    for (key, span) in unknown {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::UnknownOption {
                subject: subject.to_owned(),
                key,
            },
            subject,
            span,
        ));
    }
    options
}

#[derive(Default)]
struct ScopeArgs {
    factory: Option<Expr>,
    async_factory: Option<Expr>,
    typed: Option<TypedFactory>,
    init: Option<Expr>,
    concrete: bool,
    fallible: bool,
    repeated: bool,
    unknown: Vec<(String, proc_macro2::Span)>,
}

fn parse_field(field: syn::Field, diagnostics: &mut Vec<Diagnostic>) -> Option<Provider> {
    let Some(name) = field.ident.clone() else {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MissingName,
            "<unnamed>",
            field.span(),
        ));
        return None;
    };
    let subject = name.to_string();
    if matches!(field.ty, Type::Infer(_)) {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MissingType(subject.clone()),
            &subject,
            field.ty.span(),
        ));
    }

    let mut scopes: Vec<(Scope, &Attribute)> = Vec::new();
    let mut depends_on = Vec::new();
    let mut attrs = Vec::new();
    for attr in &field.attrs {
        if attr.path().is_ident(INPUT_ATTR) {
            scopes.push((Scope::Input, attr));
        } else if attr.path().is_ident(SHARED_ATTR) {
            scopes.push((Scope::Shared, attr));
        } else if attr.path().is_ident(TRANSIENT_ATTR) {
            scopes.push((Scope::Transient, attr));
        } else if attr.path().is_ident(DEPENDS_ON_ATTR) {
            match attr.parse_args_with(Punctuated::<Ident, Token![,]>::parse_terminated) {
                Ok(names) => depends_on.extend(names),
                Err(error) => diagnostics.push(syntax_error(&subject, error)),
            }
        } else {
            attrs.push(attr.clone());
        }
    }
    let Some(&(scope, attr)) = scopes.first() else {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::UnknownScope(subject.clone()),
            &subject,
            name.span(),
        ));
        return None;
    };
    if scopes.len() > 1 {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MultipleBindings(subject.clone()),
            &subject,
            scopes[1].1.span(),
        ));
    }

    let mut args = ScopeArgs::default();
    if !matches!(attr.meta, Meta::Path(_))
        && let Err(error) = attr.parse_nested_meta(|meta| parse_scope_arg(&meta, &mut args))
    {
        diagnostics.push(syntax_error(&subject, error));
    }
    if args.repeated {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::MultipleBindings(subject.clone()),
            &subject,
            attr.span(),
        ));
    }
    for (key, span) in args.unknown {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::UnknownOption {
                subject: subject.clone(),
                key,
            },
            &subject,
            span,
        ));
    }

    let mut provider = Provider::new(name, field.ty.clone(), scope)
        .with_vis(field.vis.clone())
        .with_concrete(args.concrete)
        .with_depends_on(depends_on);
    provider.attrs = attrs;
    provider.typed = args.typed;
    provider.initializer = args.init;
    provider.factory = args
        .factory
        .map(|expr| classify(expr, args.fallible, &subject, diagnostics));
    provider.async_factory = args
        .async_factory
        .map(|expr| classify(expr, args.fallible, &subject, diagnostics));
    Some(provider)
}

fn parse_scope_arg(meta: &ParseNestedMeta, args: &mut ScopeArgs) -> syn::Result<()> {
    if meta.path.is_ident("factory") {
        let expr = meta.value()?.parse()?;
        args.repeated |= args.factory.replace(expr).is_some();
    } else if meta.path.is_ident("async_factory") {
        let expr = meta.value()?.parse()?;
        args.repeated |= args.async_factory.replace(expr).is_some();
    } else if meta.path.is_ident("init") {
        let expr = meta.value()?.parse()?;
        args.repeated |= args.init.replace(expr).is_some();
    } else if meta.path.is_ident("typed") {
        let content;
        syn::parenthesized!(content in meta.input);
        let ty: Type = content.parse()?;
        let mut deps = Vec::new();
        while !content.is_empty() {
            content.parse::<Token![,]>()?;
            if content.is_empty() {
                break;
            }
            deps.push(content.parse::<Ident>()?);
        }
        args.repeated |= args.typed.replace(TypedFactory { ty, deps }).is_some();
    } else if meta.path.is_ident("concrete") {
        args.concrete = parse_flag(meta)?;
    } else if meta.path.is_ident("fallible") {
        args.fallible = parse_flag(meta)?;
    } else {
        args.unknown.push((path_string(&meta.path), meta.path.span()));
        skip_value(meta)?;
    }
    Ok(())
}

fn classify(expr: Expr, fallible: bool, subject: &str, diagnostics: &mut Vec<Diagnostic>) -> Factory {
    match Factory::from_expr(expr.clone(), fallible) {
        Ok(factory) => factory,
        Err(patterns) => {
            for pat in patterns {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnnamedClosureParameter(subject.to_owned()),
                    subject,
                    pat.span(),
                ));
            }
            Factory::Expression(expr)
        }
    }
}

fn parse_flag(meta: &ParseNestedMeta) -> syn::Result<bool> {
    if meta.input.peek(Token![=]) {
        Ok(meta.value()?.parse::<LitBool>()?.value)
    } else {
        Ok(true)
    }
}

fn skip_value(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<TokenStream>()?;
    }
    Ok(())
}

fn path_string(path: &syn::Path) -> String {
    path.to_token_stream().to_string().replace(' ', "")
}

fn syntax_error(subject: &str, error: syn::Error) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::Syntax(error.to_string()),
        subject,
        error.span(),
    )
}
