//! Structural, policy and graph checks for a container.
//!
//! Every rule runs over every member and all findings are returned together;
//! an empty list means the container may be generated.
//!
//! Explicit names may carry a leading `_`: `_config` refers to `config` when
//! no member is called `_config`, matching how factory arguments bind.

use std::collections::{BTreeMap, BTreeSet};

use quote::ToTokens as _;
use syn::{GenericArgument, PathArguments, Type};

use crate::cycles::find_cycles;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::extract::references;
use crate::generate::ConstructorPlan;
use crate::model::{Container, Scope};

/// Runs all rules and returns the accumulated diagnostics.
pub fn validate(container: &Container) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let type_params = container.type_params();
    let mut names = BTreeSet::new();

    for provider in &container.members {
        let name = provider.name_str();
        let report = |kind| Diagnostic::new(kind, name.clone(), provider.span);

        if !names.insert(name.clone()) {
            diagnostics.push(report(DiagnosticKind::DuplicateMember(name.clone())));
        }
        if provider.factory.is_some() && provider.async_factory.is_some() {
            diagnostics.push(report(DiagnosticKind::ConflictingFactories(name.clone())));
        }
        match provider.scope {
            Scope::Input => {
                let only_async = provider.async_factory.is_some()
                    && provider.factory.is_none()
                    && provider.typed.is_none()
                    && provider.initializer.is_none();
                if only_async {
                    diagnostics.push(report(DiagnosticKind::AsyncFactoryOnInput(name.clone())));
                } else if provider.has_rule() {
                    diagnostics.push(report(DiagnosticKind::InputWithConstructionRule(
                        name.clone(),
                    )));
                }
            }
            Scope::Shared | Scope::Transient => {
                if container.options.validate && !provider.has_rule() {
                    diagnostics.push(report(DiagnosticKind::MissingFactory {
                        name: name.clone(),
                        scope: provider.scope.to_string(),
                    }));
                }
                if !provider.concrete && is_concrete(&provider.ty, &type_params) {
                    diagnostics.push(report(DiagnosticKind::ConcreteOptInRequired {
                        name: name.clone(),
                        ty: type_string(&provider.ty),
                    }));
                }
            }
        }
        if let Some(factory) = &provider.async_factory
            && !factory.is_async_closure()
        {
            diagnostics.push(report(DiagnosticKind::NonAsyncFactory(name.clone())));
        }
    }

    if container.options.validate_graph {
        validate_graph(container, &mut diagnostics);
    }
    validate_bindings(container, &mut diagnostics);
    tracing::debug!(
        container = %container.name,
        diagnostics = diagnostics.len(),
        "validated container",
    );
    diagnostics
}

fn validate_graph(container: &Container, diagnostics: &mut Vec<Diagnostic>) {
    let known: BTreeSet<String> = container.members.iter().map(|p| p.name_str()).collect();
    let mut adjacency: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for provider in &container.members {
        let name = provider.name_str();
        let refs = references(provider);
        let mut edges = Vec::new();
        for dependency in &refs.explicit {
            match known_member(&known, dependency) {
                Some(member) => push_edge(&mut edges, member),
                None => diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnknownDependency {
                        name: name.clone(),
                        dependency: dependency.clone(),
                    },
                    name.clone(),
                    provider.span,
                )),
            }
        }
        for dependency in refs.scanned.iter().filter(|v| known.contains(*v)) {
            push_edge(&mut edges, dependency);
        }
        adjacency.insert(name, edges);
    }
    for cycle in find_cycles(&adjacency) {
        let anchor = cycle
            .first()
            .and_then(|v| container.member(v))
            .or_else(|| container.members.first());
        let (subject, span) = match anchor {
            Some(p) => (p.name_str(), p.span),
            None => (container.name.to_string(), container.name.span()),
        };
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DependencyCycle(cycle),
            subject,
            span,
        ));
    }
}

/// Checks that every factory argument binds, and that no synchronously built
/// member consumes an asynchronous one.
fn validate_bindings(container: &Container, diagnostics: &mut Vec<Diagnostic>) {
    let known: BTreeSet<String> = container.members.iter().map(|p| p.name_str()).collect();
    let plan = ConstructorPlan::build(container);
    for (provider, step) in container.members.iter().zip(&plan.steps) {
        let name = provider.name_str();
        for arg in &step.args {
            let kind = match arg.source.as_deref().and_then(|v| plan.step(v)) {
                Some(dep) if dep.is_async && !step.is_async => DiagnosticKind::SyncDependsOnAsync {
                    name: name.clone(),
                    dependency: dep.provider.clone(),
                },
                Some(_) => continue,
                None => {
                    // Unknown names are already reported by the graph rules.
                    let reported = container.options.validate_graph
                        && arg
                            .param
                            .as_deref()
                            .is_some_and(|v| known_member(&known, v).is_none());
                    if reported {
                        continue;
                    }
                    DiagnosticKind::UnboundParameter {
                        name: name.clone(),
                        parameter: arg.param.clone().unwrap_or_else(|| "_".into()),
                    }
                }
            };
            diagnostics.push(Diagnostic::new(kind, name.clone(), provider.span));
        }
    }
}

/// The member an explicit name refers to, trying the name without its `_`.
fn known_member<'a>(known: &'a BTreeSet<String>, name: &str) -> Option<&'a String> {
    known
        .get(name)
        .or_else(|| name.strip_prefix('_').and_then(|v| known.get(v)))
}

fn push_edge(edges: &mut Vec<String>, name: &str) {
    if !edges.iter().any(|v| v == name) {
        edges.push(name.to_owned());
    }
}

/// Whether a declared type names a concrete type rather than an interface.
///
/// `Option`, references, `Arc`/`Rc`/`Box` and grouping are looked through.
/// Trait objects, `impl Trait` and the container's own type parameters are
/// not concrete.
pub fn is_concrete(ty: &Type, type_params: &[String]) -> bool {
    match ty {
        Type::Paren(inner) => is_concrete(&inner.elem, type_params),
        Type::Group(inner) => is_concrete(&inner.elem, type_params),
        Type::Reference(inner) => is_concrete(&inner.elem, type_params),
        Type::TraitObject(_) | Type::ImplTrait(_) => false,
        Type::Infer(_) | Type::Macro(_) | Type::Verbatim(_) | Type::Never(_) => false,
        Type::Path(type_path) => {
            if type_path.qself.is_some() {
                return false;
            }
            if let Some(ident) = type_path.path.get_ident()
                && type_params.iter().any(|v| ident == v)
            {
                return false;
            }
            match unwrap_wrapper(type_path) {
                Some(inner) => is_concrete(inner, type_params),
                None => true,
            }
        }
        _ => true,
    }
}

const WRAPPERS: &[&str] = &["Option", "Arc", "Rc", "Box"];

fn unwrap_wrapper(type_path: &syn::TypePath) -> Option<&Type> {
    let segment = type_path.path.segments.last()?;
    if !WRAPPERS.iter().any(|v| segment.ident == v) {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

pub(crate) fn type_string(ty: &Type) -> String {
    ty.to_token_stream()
        .to_string()
        .replace(" < ", "<")
        .replace(" >", ">")
        .replace("< ", "<")
        .replace(" ,", ",")
}
