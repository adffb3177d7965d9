//! Constructor and accessor generation for validated containers.
//!
//! Generation happens in two steps. [`ConstructorPlan::build`] decides the
//! parameter list, the per-member step and how every factory argument is
//! resolved. [`generate`] renders that plan into the container struct, its
//! `new` function and one accessor per member.
//!
//! Factory arguments are matched against the bindings visible to a member:
//! shared members see earlier inputs and shared members, transient members
//! see every input and shared member plus earlier transients. A parameter is
//! matched by exact name, then with a leading `_` stripped, then by position.
//! Positional matching is a convenience: reordering two parameters of the
//! same type silently swaps them.
//!
//! [`generate`] expects a container that [`validate`](crate::validate())
//! accepted. Unbound arguments and synchronous shared members consuming
//! asynchronous ones are reported there, from the same plan.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use proc_macro2::{Group, TokenTree};
use syn::visit_mut::{self, VisitMut};
use syn::{Expr, Ident, Macro, Member, Pat, PatType, Type};

use crate::extract::{is_self, scan_expr, self_field};
use crate::model::{ConstructionRule, Container, Provider, Scope};

/// How a constructor parameter is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// An input value, no default.
    Required,
    /// An optional override for a shared or transient member.
    Override,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Ident,
    pub ty: Type,
    pub kind: ParamKind,
}

/// How a factory argument found its binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Exact,
    Stripped,
    Positional,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgBinding {
    /// Parameter name, `None` for `_`.
    pub param: Option<String>,
    /// Member the argument is bound to.
    pub source: Option<String>,
    pub resolution: Resolution,
}

/// What the constructor does for one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Input taken from its parameter.
    Bind,
    /// Shared value computed once, unless overridden.
    Memoize,
    /// Shared value computed by a spawned unit of work, unless overridden.
    Defer,
    /// Transient member: only the override is stored.
    Override,
    /// Shared member without a rule: stores the override, fails on access.
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub provider: String,
    pub kind: StepKind,
    pub args: Vec<ArgBinding>,
    /// Whether the member's value is only available after an `.await`.
    pub is_async: bool,
}

/// Inspectable form of the generated constructor.
#[derive(Debug, Clone)]
pub struct ConstructorPlan {
    pub params: Vec<Param>,
    /// One step per member, in declaration order.
    pub steps: Vec<Step>,
    /// Whether `new` returns a `Result` because a shared factory can fail.
    pub fallible: bool,
}

impl ConstructorPlan {
    pub fn build(container: &Container) -> Self {
        let mut params = Vec::new();
        for (scope, kind) in [
            (Scope::Input, ParamKind::Required),
            (Scope::Shared, ParamKind::Override),
            (Scope::Transient, ParamKind::Override),
        ] {
            for provider in container.members.iter().filter(|p| p.scope == scope) {
                params.push(Param {
                    name: provider.name.clone(),
                    ty: provider.ty.clone(),
                    kind,
                });
            }
        }
        let mut steps: Vec<Step> = Vec::with_capacity(container.members.len());
        for (index, provider) in container.members.iter().enumerate() {
            let kind = step_kind(provider);
            let args = match kind {
                StepKind::Bind | StepKind::Placeholder => Vec::new(),
                _ => resolve_args(provider, &available(container, index)),
            };
            // Transients only see earlier transients, so one pass settles them.
            let is_async = match kind {
                StepKind::Defer => true,
                StepKind::Override => {
                    provider.is_async()
                        || args.iter().any(|arg| {
                            let Some(dep) = arg.source.as_deref().and_then(|v| container.position(v))
                            else {
                                return false;
                            };
                            match steps.get(dep) {
                                Some(step) => step.is_async,
                                None => step_kind(&container.members[dep]) == StepKind::Defer,
                            }
                        })
                }
                StepKind::Bind | StepKind::Memoize | StepKind::Placeholder => false,
            };
            steps.push(Step {
                provider: provider.name_str(),
                kind,
                args,
                is_async,
            });
        }
        let fallible = container
            .members
            .iter()
            .any(|p| step_kind(p) == StepKind::Memoize && is_fallible(p));
        Self {
            params,
            steps,
            fallible,
        }
    }

    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.to_string()).collect()
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.provider == name)
    }
}

fn step_kind(provider: &Provider) -> StepKind {
    match provider.scope {
        Scope::Input => StepKind::Bind,
        Scope::Shared if !provider.has_rule() => StepKind::Placeholder,
        Scope::Shared if provider.is_async() => StepKind::Defer,
        Scope::Shared => StepKind::Memoize,
        Scope::Transient => StepKind::Override,
    }
}

fn is_fallible(provider: &Provider) -> bool {
    matches!(provider.construction_rule(), Some(ConstructionRule::Closure(c)) if c.fallible)
}

/// Members whose bindings a member's factory may use, in declaration order.
fn available(container: &Container, index: usize) -> Vec<&Provider> {
    let scope = container.members[index].scope;
    container
        .members
        .iter()
        .enumerate()
        .filter(|&(i, member)| match scope {
            Scope::Input => false,
            Scope::Shared => i < index && member.scope != Scope::Transient,
            Scope::Transient => i != index && (member.scope != Scope::Transient || i < index),
        })
        .map(|(_, member)| member)
        .collect()
}

fn resolve_args(provider: &Provider, available: &[&Provider]) -> Vec<ArgBinding> {
    match provider.construction_rule() {
        None => Vec::new(),
        Some(ConstructionRule::Closure(closure)) => resolve_params(
            closure.params.iter().map(|v| v.as_ref().map(Ident::to_string)),
            available,
        ),
        Some(ConstructionRule::Typed(typed)) => {
            resolve_params(typed.deps.iter().map(|v| Some(v.to_string())), available)
        }
        Some(ConstructionRule::Expression(expr) | ConstructionRule::Initializer(expr)) => {
            scan_expr(expr)
                .into_iter()
                .filter(|name| available.iter().any(|p| p.name == name))
                .map(|name| ArgBinding {
                    param: Some(name.clone()),
                    source: Some(name),
                    resolution: Resolution::Exact,
                })
                .collect()
        }
    }
}

fn resolve_params(
    params: impl Iterator<Item = Option<String>>,
    available: &[&Provider],
) -> Vec<ArgBinding> {
    let find = |name: &str| available.iter().find(|p| p.name == name).map(|p| p.name_str());
    params
        .enumerate()
        .map(|(index, param)| {
            if let Some(name) = &param {
                if let Some(source) = find(name) {
                    return ArgBinding {
                        param,
                        source: Some(source),
                        resolution: Resolution::Exact,
                    };
                }
                if let Some(stripped) = name.strip_prefix('_')
                    && let Some(source) = find(stripped)
                {
                    return ArgBinding {
                        param,
                        source: Some(source),
                        resolution: Resolution::Stripped,
                    };
                }
            }
            match available.get(index) {
                Some(p) => ArgBinding {
                    param,
                    source: Some(p.name_str()),
                    resolution: Resolution::Positional,
                },
                None => ArgBinding {
                    param,
                    source: None,
                    resolution: Resolution::Unresolved,
                },
            }
        })
        .collect()
}

/// Renders a validated container.
pub fn generate(container: &Container) -> TokenStream {
    let generator = Generator::new(container);
    let tokens = generator.render();
    tracing::debug!(container = %container.name, "generated container");
    tokens
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Place {
    Constructor,
    Accessor,
}

struct Evaluation {
    binds: Vec<TokenStream>,
    awaits: Vec<TokenStream>,
    value: TokenStream,
}

struct Generator<'a> {
    container: &'a Container,
    plan: ConstructorPlan,
    accessor_result: Vec<bool>,
}

impl<'a> Generator<'a> {
    fn new(container: &'a Container) -> Self {
        let plan = ConstructorPlan::build(container);
        let mut generator = Self {
            container,
            plan,
            accessor_result: vec![false; container.members.len()],
        };
        for (index, provider) in container.members.iter().enumerate() {
            if provider.scope != Scope::Transient {
                continue;
            }
            let step = &generator.plan.steps[index];
            let mut is_result = step.is_async || is_fallible(provider);
            for arg in &step.args {
                let Some(dep) = arg.source.as_deref().and_then(|v| container.position(v)) else {
                    continue;
                };
                if container.members[dep].scope == Scope::Transient {
                    is_result |= generator.accessor_result[dep];
                }
            }
            generator.accessor_result[index] = is_result;
        }
        generator
    }

    fn render(&self) -> TokenStream {
        let container = self.container;
        let name = &container.name;
        let vis = &container.vis;
        let attrs = &container.attrs;
        let generics = &container.generics;
        let where_clause = &generics.where_clause;
        let (impl_generics, ty_generics, _) = generics.split_for_impl();

        let mut fields = Vec::new();
        let mut inits = Vec::new();
        for provider in &container.members {
            let field = &provider.name;
            let field_attrs = &provider.attrs;
            let ty = self.storage_type(provider);
            fields.push(quote! { #(#field_attrs)* #field: #ty });
            inits.push(quote! { #field });
        }
        if container.options.exclusive {
            fields.push(quote! {
                __wiring_exclusive: ::core::marker::PhantomData<*const ()>
            });
            inits.push(quote! { __wiring_exclusive: ::core::marker::PhantomData });
        }

        let params = self.plan.params.iter().map(|param| {
            let name = &param.name;
            let ty = &param.ty;
            match param.kind {
                ParamKind::Required => quote! { #name: #ty },
                ParamKind::Override => quote! { #name: ::core::option::Option<#ty> },
            }
        });
        let steps = container
            .members
            .iter()
            .zip(&self.plan.steps)
            .map(|(provider, step)| self.render_step(provider, step));
        let (output, result) = if self.plan.fallible {
            (
                quote! { ::core::result::Result<Self, ::wiring::StdError> },
                quote! { ::core::result::Result::Ok(Self { #(#inits),* }) },
            )
        } else {
            (quote! { Self }, quote! { Self { #(#inits),* } })
        };
        let accessors = container
            .members
            .iter()
            .enumerate()
            .map(|(index, provider)| self.render_accessor(index, provider));

        quote! {
            #(#attrs)*
            #vis struct #name #generics #where_clause {
                #(#fields),*
            }

            impl #impl_generics #name #ty_generics #where_clause {
                #[allow(clippy::too_many_arguments, clippy::redundant_clone)]
                #vis fn new(#(#params),*) -> #output {
                    #(#steps)*
                    #result
                }

                #(#accessors)*
            }
        }
    }

    fn storage_type(&self, provider: &Provider) -> TokenStream {
        let ty = &provider.ty;
        match step_kind(provider) {
            StepKind::Bind | StepKind::Memoize => quote! { #ty },
            StepKind::Defer => quote! { ::wiring::Deferred<#ty> },
            StepKind::Override | StepKind::Placeholder => {
                quote! { ::core::option::Option<#ty> }
            }
        }
    }

    fn render_step(&self, provider: &Provider, step: &Step) -> TokenStream {
        let name = &provider.name;
        let ty = &provider.ty;
        match step.kind {
            StepKind::Bind | StepKind::Override | StepKind::Placeholder => TokenStream::new(),
            StepKind::Memoize => {
                let Evaluation { binds, value, .. } =
                    self.evaluate(provider, step, Place::Constructor, false);
                quote! {
                    let #name: #ty = match #name {
                        ::core::option::Option::Some(value) => value,
                        ::core::option::Option::None => {
                            #(#binds)*
                            #value
                        }
                    };
                }
            }
            StepKind::Defer => {
                let Evaluation {
                    binds,
                    awaits,
                    value,
                } = self.evaluate(provider, step, Place::Constructor, true);
                quote! {
                    let #name: ::wiring::Deferred<#ty> = match #name {
                        ::core::option::Option::Some(value) => ::wiring::Deferred::ready(value),
                        ::core::option::Option::None => {
                            #(#binds)*
                            ::wiring::Deferred::spawn(async move {
                                #(#awaits)*
                                let value: #ty = #value;
                                ::core::result::Result::<#ty, ::wiring::StdError>::Ok(value)
                            })
                        }
                    };
                }
            }
        }
    }

    fn render_accessor(&self, index: usize, provider: &Provider) -> TokenStream {
        let name = &provider.name;
        let ty = &provider.ty;
        let vis = &provider.vis;
        match step_kind(provider) {
            StepKind::Bind | StepKind::Memoize => quote! {
                #vis fn #name(&self) -> #ty {
                    ::core::clone::Clone::clone(&self.#name)
                }
            },
            StepKind::Defer => quote! {
                #vis async fn #name(&self) -> ::core::result::Result<#ty, ::wiring::SharedError> {
                    self.#name.get().await
                }
            },
            StepKind::Placeholder => {
                let missing = self.missing(provider);
                quote! {
                    #vis fn #name(&self) -> #ty {
                        match &self.#name {
                            ::core::option::Option::Some(value) => ::core::clone::Clone::clone(value),
                            ::core::option::Option::None => #missing,
                        }
                    }
                }
            }
            StepKind::Override if !provider.has_rule() => {
                let missing = self.missing(provider);
                quote! {
                    #vis fn #name(&self) -> #ty {
                        match &self.#name {
                            ::core::option::Option::Some(value) => ::core::clone::Clone::clone(value),
                            ::core::option::Option::None => #missing,
                        }
                    }
                }
            }
            StepKind::Override => {
                let is_async = self.plan.steps[index].is_async;
                let Evaluation {
                    binds,
                    awaits,
                    value,
                } = self.evaluate(provider, &self.plan.steps[index], Place::Accessor, is_async);
                let asyncness = is_async.then(|| quote! { async });
                if self.accessor_result[index] {
                    quote! {
                        #vis #asyncness fn #name(&self) -> ::core::result::Result<#ty, ::wiring::StdError> {
                            if let ::core::option::Option::Some(value) = &self.#name {
                                return ::core::result::Result::Ok(::core::clone::Clone::clone(value));
                            }
                            #(#binds)*
                            #(#awaits)*
                            let value: #ty = #value;
                            ::core::result::Result::Ok(value)
                        }
                    }
                } else {
                    quote! {
                        #vis fn #name(&self) -> #ty {
                            if let ::core::option::Option::Some(value) = &self.#name {
                                return ::core::clone::Clone::clone(value);
                            }
                            #(#binds)*
                            let value: #ty = #value;
                            value
                        }
                    }
                }
            }
        }
    }

    fn missing(&self, provider: &Provider) -> TokenStream {
        let container = self.container.name.to_string();
        let name = provider.name_str();
        quote! { ::wiring::missing_factory(#container, #name) }
    }

    /// Binds the arguments of a member's rule and builds the value expression.
    fn evaluate(&self, provider: &Provider, step: &Step, place: Place, is_async: bool) -> Evaluation {
        let mut binds = Vec::new();
        let mut awaits = Vec::new();
        let Some(rule) = provider.construction_rule() else {
            return Evaluation {
                binds,
                awaits,
                value: self.missing(provider),
            };
        };
        let positional = matches!(rule, ConstructionRule::Closure(_) | ConstructionRule::Typed(_));
        let mut locals = Vec::new();
        let mut types = Vec::new();
        for (index, arg) in step.args.iter().enumerate() {
            let dependency = arg.source.as_deref().and_then(|v| self.container.member(v));
            types.push(dependency.map(|dep| &dep.ty));
            let local = match (positional, dependency) {
                (false, Some(dep)) => dep.name.clone(),
                _ => format_ident!("__wiring_arg{}", index),
            };
            if let Some(dep) = dependency {
                let (capture, needs_await) = self.capture(dep, place, is_async);
                binds.push(quote! { let #local = #capture; });
                if needs_await {
                    awaits.push(quote! { let #local = #local.get().await?; });
                }
            }
            locals.push(local);
        }
        let value = match rule {
            ConstructionRule::Closure(closure) => {
                let mut body = closure.closure.clone();
                for (input, ty) in body.inputs.iter_mut().zip(&types) {
                    if let Some(ty) = ty {
                        annotate(input, ty);
                    }
                }
                let mut call = quote! { (#body)(#(#locals),*) };
                if closure.is_async {
                    call = quote! { #call.await };
                }
                if closure.fallible {
                    call = quote! { #call? };
                }
                call
            }
            ConstructionRule::Typed(typed) => {
                let ty = &typed.ty;
                let call = quote! { <#ty>::new(#(#locals),*) };
                match pointer_path(&provider.ty) {
                    Some(pointer) => quote! { #pointer::new(#call) },
                    None => call,
                }
            }
            ConstructionRule::Expression(expr) | ConstructionRule::Initializer(expr) => {
                let names: Vec<String> = step.args.iter().filter_map(|a| a.source.clone()).collect();
                let mut expr = expr.clone();
                SelfAccess { names: &names }.visit_expr_mut(&mut expr);
                quote! { #expr }
            }
        };
        Evaluation {
            binds,
            awaits,
            value,
        }
    }

    /// Expression producing a dependency, and whether it must still be awaited.
    fn capture(&self, dep: &Provider, place: Place, is_async: bool) -> (TokenStream, bool) {
        let name = &dep.name;
        let receiver = match place {
            Place::Constructor => quote! { #name },
            Place::Accessor => quote! { self.#name },
        };
        match step_kind(dep) {
            StepKind::Bind | StepKind::Memoize => {
                (quote! { ::core::clone::Clone::clone(&#receiver) }, false)
            }
            StepKind::Defer => (quote! { ::core::clone::Clone::clone(&#receiver) }, is_async),
            StepKind::Placeholder if place == Place::Accessor => (quote! { self.#name() }, false),
            StepKind::Placeholder => {
                let missing = self.missing(dep);
                (
                    quote! {
                        match &#name {
                            ::core::option::Option::Some(value) => ::core::clone::Clone::clone(value),
                            ::core::option::Option::None => #missing,
                        }
                    },
                    false,
                )
            }
            StepKind::Override => {
                let index = self.container.position(&dep.name_str()).unwrap_or_default();
                match (self.plan.steps[index].is_async, self.accessor_result[index]) {
                    (true, _) => (quote! { self.#name().await? }, false),
                    (false, true) => (quote! { self.#name()? }, false),
                    (false, false) => (quote! { self.#name() }, false),
                }
            }
        }
    }
}

/// Gives an untyped closure parameter the type of the member bound to it.
fn annotate(pat: &mut Pat, ty: &Type) {
    if matches!(pat, Pat::Type(_)) {
        return;
    }
    let inner = pat.clone();
    *pat = Pat::Type(PatType {
        attrs: Vec::new(),
        pat: Box::new(inner),
        colon_token: Default::default(),
        ty: Box::new(ty.clone()),
    });
}

/// `Arc`, `Rc` or `Box` path of a pointer-typed member, without arguments.
fn pointer_path(ty: &Type) -> Option<syn::Path> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if !["Arc", "Rc", "Box"].iter().any(|v| segment.ident == v) {
        return None;
    }
    let mut path = type_path.path.clone();
    if let Some(last) = path.segments.last_mut() {
        last.arguments = syn::PathArguments::None;
    }
    Some(path)
}

/// Rewrites `self.name` into `name` for resolved bindings.
struct SelfAccess<'a> {
    names: &'a [String],
}

impl VisitMut for SelfAccess<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        let replacement = match &*expr {
            Expr::Field(field) if is_self(&field.base) => match &field.member {
                Member::Named(ident) if self.names.iter().any(|v| ident == v) => {
                    Some(ident.clone())
                }
                _ => None,
            },
            _ => None,
        };
        if let Some(ident) = replacement {
            *expr = syn::parse_quote!(#ident);
            return;
        }
        visit_mut::visit_expr_mut(self, expr);
    }

    fn visit_macro_mut(&mut self, mac: &mut Macro) {
        mac.tokens = self.rewrite_tokens(mac.tokens.clone());
    }
}

impl SelfAccess<'_> {
    /// Token-level form of the rewrite for macro arguments.
    fn rewrite_tokens(&self, tokens: TokenStream) -> TokenStream {
        let tokens: Vec<TokenTree> = tokens.into_iter().collect();
        let mut output = Vec::with_capacity(tokens.len());
        let mut index = 0;
        while index < tokens.len() {
            if let Some(field) = self_field(&tokens[index..])
                && self.names.iter().any(|v| field == v)
            {
                output.push(TokenTree::Ident(field.clone()));
                index += 3;
                continue;
            }
            match &tokens[index] {
                TokenTree::Group(group) => {
                    let mut rewritten = Group::new(group.delimiter(), self.rewrite_tokens(group.stream()));
                    rewritten.set_span(group.span());
                    output.push(TokenTree::Group(rewritten));
                }
                token => output.push(token.clone()),
            }
            index += 1;
        }
        output.into_iter().collect()
    }
}
