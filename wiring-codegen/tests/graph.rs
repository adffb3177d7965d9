use quote::quote;
use syn::parse_quote;
use wiring_codegen::graph::{
    GraphEdge, GraphNode, IssueCategory, call_sites, callee_display_name, dedup_edges,
    normalize_nodes,
};
use wiring_codegen::{CallSite, ContainerDecl, ProjectGraph, parse_container};

fn decl(file: &str, name: &str) -> ContainerDecl {
    ContainerDecl {
        file: file.into(),
        modules: Vec::new(),
        name: name.into(),
        is_root: false,
        required_inputs: Vec::new(),
    }
}

fn call(caller: &str, callee: syn::Expr, label: Option<&str>) -> CallSite {
    CallSite {
        caller: caller.into(),
        callee,
        label: label.map(str::to_owned),
    }
}

#[test]
fn test_node_merge() {
    let node = |is_root: bool, inputs: &[&str]| GraphNode {
        id: "src/app.rs::App".into(),
        name: "App".into(),
        file: "src/app.rs".into(),
        is_root,
        required_inputs: inputs.iter().map(|v| v.to_string()).collect(),
    };
    let other = GraphNode {
        id: "src/lib.rs::Lib".into(),
        name: "Lib".into(),
        file: "src/lib.rs".into(),
        is_root: false,
        required_inputs: Vec::new(),
    };
    let merged = normalize_nodes(vec![
        other.clone(),
        node(false, &["config", "clock"]),
        node(true, &["logger", "clock"]),
    ]);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].id, "src/app.rs::App");
    assert!(merged[0].is_root);
    assert_eq!(merged[0].required_inputs, vec!["clock", "config", "logger"]);
    assert_eq!(merged[1], other);

    let again = normalize_nodes(merged.clone());
    assert_eq!(again, merged);
}

#[test]
fn test_edge_dedup_keeps_first_seen_order() {
    let edges = dedup_edges(vec![
        GraphEdge::new("A", "B", None),
        GraphEdge::new("A", "B", None),
        GraphEdge::new("A", "B", Some("client")),
        GraphEdge::new("A", "B", Some("client")),
        GraphEdge::new("B", "C", None),
    ]);
    assert_eq!(
        edges,
        vec![
            GraphEdge::new("A", "B", None),
            GraphEdge::new("A", "B", Some("client")),
            GraphEdge::new("B", "C", None),
        ],
    );
}

#[test]
fn test_callee_display_name() {
    let name = |expr: syn::Expr| callee_display_name(&expr);
    assert_eq!(name(parse_quote!(Foo::new)), Some("Foo".into()));
    assert_eq!(name(parse_quote!(Foo)), Some("Foo".into()));
    assert_eq!(name(parse_quote!(crate::app::Foo::with_config)), Some("Foo".into()));
    assert_eq!(name(parse_quote!((Foo::new))), Some("Foo".into()));
    assert_eq!(name(parse_quote!(make_foo)), None);
    assert_eq!(name(parse_quote!(Self::new)), None);
    assert_eq!(name(parse_quote!(foo.bar)), None);
}

#[test]
fn test_container_ids() {
    let mut nested = decl("src/app.rs", "App");
    nested.modules = vec!["inner".into()];
    assert_eq!(nested.id(), "src/app.rs::inner::App");
    assert_eq!(decl("src/app.rs", "App").id(), "src/app.rs::App");
}

#[test]
fn test_edges_and_ambiguity() {
    let containers = vec![
        decl("a.rs", "App"),
        decl("b.rs", "Database"),
        decl("c.rs", "Cache"),
        decl("d.rs", "Cache"),
    ];
    let sites = vec![
        call("a.rs::App", parse_quote!(Database::new), Some("db")),
        call("a.rs::App", parse_quote!(Database::connect), Some("db")),
        call("a.rs::App", parse_quote!(Cache::new), Some("cache")),
        call("a.rs::App", parse_quote!(String::new), Some("name")),
    ];
    let graph = ProjectGraph::build(&containers, &sites);
    assert_eq!(graph.nodes().len(), 4);
    assert_eq!(
        graph.edges(),
        &[GraphEdge::new("a.rs::App", "b.rs::Database", Some("db"))],
    );
    assert_eq!(graph.ambiguous().len(), 1);
    let ambiguous = &graph.ambiguous()[0];
    assert_eq!(ambiguous.name, "Cache");
    assert_eq!(ambiguous.candidates, vec!["c.rs::Cache", "d.rs::Cache"]);

    let report = graph.validate();
    assert!(!report.passed);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].category, IssueCategory::AmbiguousReference);
    assert_eq!(report.issues[0].source_id, "a.rs::App");
}

#[test]
fn test_cross_container_cycle() {
    let containers = vec![decl("a.rs", "A"), decl("b.rs", "B"), decl("c.rs", "C")];
    let sites = vec![
        call("a.rs::A", parse_quote!(B::new), None),
        call("b.rs::B", parse_quote!(C::new), None),
        call("c.rs::C", parse_quote!(A::new), None),
    ];
    let report = ProjectGraph::build(&containers, &sites).validate();
    assert!(!report.passed);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].category, IssueCategory::DependencyCycle);
    assert_eq!(report.issues[0].source_id, "a.rs::A");
    assert_eq!(
        report.issues[0].detail,
        "a.rs::A -> b.rs::B -> c.rs::C -> a.rs::A",
    );
}

#[test]
fn test_report_is_sorted() {
    let containers = vec![
        decl("z.rs", "Z"),
        decl("y.rs", "Dup"),
        decl("x.rs", "Dup"),
        decl("a.rs", "A"),
    ];
    let sites = vec![
        call("z.rs::Z", parse_quote!(Dup::new), None),
        call("a.rs::A", parse_quote!(Dup::new), None),
        call("z.rs::Z", parse_quote!(Z::new), None),
    ];
    let report = ProjectGraph::build(&containers, &sites).validate();
    let issues: Vec<(IssueCategory, &str)> = report
        .issues
        .iter()
        .map(|v| (v.category, v.source_id.as_str()))
        .collect();
    assert_eq!(
        issues,
        vec![
            (IssueCategory::AmbiguousReference, "a.rs::A"),
            (IssueCategory::AmbiguousReference, "z.rs::Z"),
            (IssueCategory::DependencyCycle, "z.rs::Z"),
        ],
    );
}

#[test]
fn test_clean_project_passes() {
    let containers = vec![decl("a.rs", "App"), decl("b.rs", "Child")];
    let sites = vec![call("a.rs::App", parse_quote!(Child::new), Some("child"))];
    let report = ProjectGraph::build(&containers, &sites).validate();
    assert!(report.passed);
    assert!(report.issues.is_empty());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json, serde_json::json!({ "passed": true, "issues": [] }));
}

#[test]
fn test_call_sites_from_container() {
    let parsed = parse_container(
        quote!(root),
        parse_quote! {
            struct App {
                #[input]
                config: Arc<Config>,
                #[shared(factory = |config| Child::new(config), concrete)]
                child: Child,
                #[shared(typed(Other, config), concrete)]
                other: Other,
                #[transient(init = Session { id: 1 }, concrete)]
                session: Session,
            }
        },
    );
    let sites = call_sites(&parsed.container, "app.rs::App");
    let found: Vec<(Option<String>, Option<String>)> = sites
        .iter()
        .map(|v| (callee_display_name(&v.callee), v.label.clone()))
        .collect();
    assert_eq!(
        found,
        vec![
            (Some("Child".into()), Some("child".into())),
            (Some("Other".into()), Some("other".into())),
            (Some("Session".into()), Some("session".into())),
        ],
    );

    let decl = ContainerDecl::new("app.rs", Vec::new(), &parsed.container);
    assert!(decl.is_root);
    assert_eq!(decl.required_inputs, vec!["config"]);
}

#[test]
fn test_issue_serialization() {
    let containers = vec![decl("a.rs", "A")];
    let sites = vec![call("a.rs::A", parse_quote!(A::new), None)];
    let report = ProjectGraph::build(&containers, &sites).validate();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["issues"][0]["category"], "dependency-cycle");
    assert_eq!(json["issues"][0]["detail"], "a.rs::A -> a.rs::A");
}
