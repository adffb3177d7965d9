//! Project-wide graph of containers.
//!
//! The first pass registers every container under an id made of its file
//! path and module path, so equally named containers in different files stay
//! apart. The second pass resolves call sites to container names: a name
//! that matches one container becomes an edge, a name that matches several
//! is recorded as ambiguous instead of guessed.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use syn::visit::{self, Visit};
use syn::{Expr, ExprCall, ExprPath, ExprStruct};

use crate::cycles::{find_cycles, join};
use crate::model::{ConstructionRule, Container, Scope};

/// A container as seen by the project graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDecl {
    pub file: String,
    /// Enclosing inline modules.
    pub modules: Vec<String>,
    pub name: String,
    pub is_root: bool,
    pub required_inputs: Vec<String>,
}

impl ContainerDecl {
    pub fn new(file: impl Into<String>, modules: Vec<String>, container: &Container) -> Self {
        let mut required_inputs: Vec<String> =
            container.inputs().map(|p| p.name_str()).collect();
        required_inputs.sort();
        Self {
            file: file.into(),
            modules,
            name: container.name.to_string(),
            is_root: container.options.root,
            required_inputs,
        }
    }

    /// `file::module::Name`.
    pub fn id(&self) -> String {
        let mut parts = vec![self.file.clone()];
        parts.extend(self.modules.iter().cloned());
        parts.push(self.name.clone());
        parts.join("::")
    }
}

/// A construction expression found inside a container.
#[derive(Debug, Clone)]
pub struct CallSite {
    /// Id of the container whose member contains the call.
    pub caller: String,
    pub callee: Expr,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub file: String,
    pub is_root: bool,
    pub required_inputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
}

impl GraphEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, label: Option<&str>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: label.map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousReference {
    pub source_id: String,
    pub name: String,
    pub candidates: Vec<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    AmbiguousReference,
    DependencyCycle,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GraphIssue {
    pub category: IssueCategory,
    pub source_id: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphReport {
    pub passed: bool,
    pub issues: Vec<GraphIssue>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    ambiguous: Vec<AmbiguousReference>,
}

impl ProjectGraph {
    pub fn build(containers: &[ContainerDecl], call_sites: &[CallSite]) -> Self {
        let mut nodes = Vec::with_capacity(containers.len());
        let mut by_name: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for decl in containers {
            let id = decl.id();
            by_name.entry(&decl.name).or_default().insert(id.clone());
            nodes.push(GraphNode {
                id,
                name: decl.name.clone(),
                file: decl.file.clone(),
                is_root: decl.is_root,
                required_inputs: decl.required_inputs.clone(),
            });
        }

        let mut edges = Vec::new();
        let mut ambiguous = Vec::new();
        for call in call_sites {
            let Some(name) = callee_display_name(&call.callee) else {
                continue;
            };
            let Some(ids) = by_name.get(name.as_str()) else {
                continue;
            };
            if ids.len() == 1 {
                if let Some(to) = ids.first() {
                    edges.push(GraphEdge::new(&call.caller, to, call.label.as_deref()));
                }
            } else {
                tracing::debug!(caller = %call.caller, %name, "ambiguous container reference");
                ambiguous.push(AmbiguousReference {
                    source_id: call.caller.clone(),
                    name,
                    candidates: ids.iter().cloned().collect(),
                    label: call.label.clone(),
                });
            }
        }
        Self {
            nodes: normalize_nodes(nodes),
            edges: dedup_edges(edges),
            ambiguous,
        }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn ambiguous(&self) -> &[AmbiguousReference] {
        &self.ambiguous
    }

    pub fn adjacency(&self) -> BTreeMap<String, Vec<String>> {
        let mut adjacency: BTreeMap<String, Vec<String>> = self
            .nodes
            .iter()
            .map(|node| (node.id.clone(), Vec::new()))
            .collect();
        for edge in &self.edges {
            adjacency
                .entry(edge.from.clone())
                .or_default()
                .push(edge.to.clone());
        }
        adjacency
    }

    pub fn cycles(&self) -> Vec<Vec<String>> {
        find_cycles(&self.adjacency())
    }

    /// Reports every cycle and every ambiguous reference, sorted.
    pub fn validate(&self) -> GraphReport {
        let mut issues = Vec::new();
        for cycle in self.cycles() {
            issues.push(GraphIssue {
                category: IssueCategory::DependencyCycle,
                source_id: cycle.first().cloned().unwrap_or_default(),
                detail: join(&cycle),
            });
        }
        for reference in &self.ambiguous {
            issues.push(GraphIssue {
                category: IssueCategory::AmbiguousReference,
                source_id: reference.source_id.clone(),
                detail: format!(
                    "`{}` matches {}",
                    reference.name,
                    reference.candidates.join(", "),
                ),
            });
        }
        issues.sort();
        GraphReport {
            passed: issues.is_empty(),
            issues,
        }
    }
}

/// Merges nodes sharing an id: roots are OR-ed and required inputs united.
/// The result is sorted by id.
pub fn normalize_nodes(nodes: Vec<GraphNode>) -> Vec<GraphNode> {
    let mut merged: BTreeMap<String, (GraphNode, BTreeSet<String>)> = BTreeMap::new();
    for node in nodes {
        match merged.get_mut(&node.id) {
            Some((existing, inputs)) => {
                existing.is_root |= node.is_root;
                inputs.extend(node.required_inputs);
            }
            None => {
                let inputs = node.required_inputs.iter().cloned().collect();
                merged.insert(node.id.clone(), (node, inputs));
            }
        }
    }
    merged
        .into_values()
        .map(|(mut node, inputs)| {
            node.required_inputs = inputs.into_iter().collect();
            node
        })
        .collect()
}

/// Drops repeated `(from, to, label)` edges, keeping first-seen order.
pub fn dedup_edges(edges: Vec<GraphEdge>) -> Vec<GraphEdge> {
    let mut seen = BTreeSet::new();
    edges
        .into_iter()
        .filter(|edge| seen.insert((edge.from.clone(), edge.to.clone(), edge.label.clone())))
        .collect()
}

/// Type name a construction expression refers to: the last path segment
/// starting with an uppercase letter, so `Foo::new`, `Foo` and
/// `crate::app::Foo::with_config` all give `Foo`.
pub fn callee_display_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Paren(inner) => callee_display_name(&inner.expr),
        Expr::Group(inner) => callee_display_name(&inner.expr),
        Expr::Path(path) => path
            .path
            .segments
            .iter()
            .rev()
            .map(|segment| segment.ident.to_string())
            .find(|name| name.starts_with(char::is_uppercase) && name != "Self"),
        _ => None,
    }
}

/// Call sites inside a container's construction rules, labelled with the
/// member they belong to.
pub fn call_sites(container: &Container, caller: &str) -> Vec<CallSite> {
    let mut sites = Vec::new();
    for provider in &container.members {
        if provider.scope == Scope::Input {
            continue;
        }
        let mut collector = CallCollector::default();
        for rule in provider.rules() {
            match rule {
                ConstructionRule::Expression(expr) | ConstructionRule::Initializer(expr) => {
                    collector.visit_expr(expr)
                }
                ConstructionRule::Closure(closure) => collector.visit_expr_closure(&closure.closure),
                ConstructionRule::Typed(typed) => {
                    if let syn::Type::Path(type_path) = &typed.ty {
                        collector.callees.push(path_expr(&type_path.path));
                    }
                }
            }
        }
        sites.extend(collector.callees.into_iter().map(|callee| CallSite {
            caller: caller.to_owned(),
            callee,
            label: Some(provider.name_str()),
        }));
    }
    sites
}

#[derive(Default)]
struct CallCollector {
    callees: Vec<Expr>,
}

impl<'ast> Visit<'ast> for CallCollector {
    fn visit_expr_call(&mut self, node: &'ast ExprCall) {
        self.callees.push((*node.func).clone());
        visit::visit_expr_call(self, node);
    }

    fn visit_expr_struct(&mut self, node: &'ast ExprStruct) {
        self.callees.push(path_expr(&node.path));
        visit::visit_expr_struct(self, node);
    }
}

fn path_expr(path: &syn::Path) -> Expr {
    Expr::Path(ExprPath {
        attrs: Vec::new(),
        qself: None,
        path: path.clone(),
    })
}
