use quote::quote;
use syn::parse_quote;
use wiring_codegen::parse::parse_annotated;
use wiring_codegen::{ConstructionRule, DiagnosticKind, Factory, Scope, parse_container, scan_file};

fn kinds(args: proc_macro2::TokenStream, item: syn::ItemStruct) -> Vec<DiagnosticKind> {
    parse_container(args, item)
        .diagnostics
        .into_iter()
        .map(|v| v.kind)
        .collect()
}

#[test]
fn test_options() {
    let parsed = parse_container(
        quote!(root, validate = false, validate_graph = false, exclusive),
        parse_quote!(struct App {}),
    );
    assert!(parsed.diagnostics.is_empty());
    let options = parsed.container.options;
    assert!(options.root);
    assert!(!options.validate);
    assert!(!options.validate_graph);
    assert!(options.exclusive);

    let defaults = parse_container(quote!(), parse_quote!(struct App {})).container.options;
    assert!(defaults.validate);
    assert!(defaults.validate_graph);
    assert!(!defaults.root);
    assert!(!defaults.exclusive);
}

#[test]
fn test_unknown_option() {
    assert_eq!(
        kinds(quote!(strict = true, lazy), parse_quote!(struct App {})),
        vec![
            DiagnosticKind::UnknownOption {
                subject: "App".into(),
                key: "strict".into(),
            },
            DiagnosticKind::UnknownOption {
                subject: "App".into(),
                key: "lazy".into(),
            },
        ],
    );
}

#[test]
fn test_members() {
    let parsed = parse_container(
        quote!(),
        parse_quote! {
            pub struct App {
                #[input]
                pub config: Arc<Config>,
                /// Application logger.
                #[shared(factory = |config| Arc::new(Console::new(config)))]
                logger: Arc<dyn Logger>,
                #[transient(typed(RequestId, config), concrete)]
                #[depends_on(logger)]
                request_id: RequestId,
            }
        },
    );
    assert!(parsed.diagnostics.is_empty());
    let container = parsed.container;
    assert_eq!(container.name, "App");
    let scopes: Vec<Scope> = container.members.iter().map(|p| p.scope).collect();
    assert_eq!(scopes, vec![Scope::Input, Scope::Shared, Scope::Transient]);

    let logger = container.member("logger").unwrap();
    assert_eq!(logger.attrs.len(), 1);
    match logger.construction_rule() {
        Some(ConstructionRule::Closure(closure)) => {
            assert!(!closure.is_async);
            assert!(!closure.fallible);
            assert_eq!(closure.param_names().count(), 1);
        }
        other => panic!("unexpected rule: {other:?}"),
    }

    let request_id = container.member("request_id").unwrap();
    assert!(request_id.concrete);
    assert_eq!(request_id.depends_on.len(), 1);
    match request_id.construction_rule() {
        Some(ConstructionRule::Typed(typed)) => assert_eq!(typed.deps.len(), 1),
        other => panic!("unexpected rule: {other:?}"),
    }
}

#[test]
fn test_rule_precedence() {
    let parsed = parse_container(
        quote!(),
        parse_quote! {
            struct App {
                #[shared(init = fallback(), typed(Impl), factory = make_service)]
                service: Arc<dyn Service>,
            }
        },
    );
    let service = &parsed.container.members[0];
    assert_eq!(service.rules().len(), 3);
    assert!(matches!(
        service.construction_rule(),
        Some(ConstructionRule::Expression(_)),
    ));
    assert!(matches!(service.factory, Some(Factory::Expression(_))));
}

#[test]
fn test_fallible_and_async_closures() {
    let parsed = parse_container(
        quote!(),
        parse_quote! {
            struct App {
                #[shared(factory = |path| -> Result<Arc<dyn Store>, StdError> { open(path) })]
                a: Arc<dyn Store>,
                #[shared(async_factory = async |path| connect(path).await, fallible)]
                b: Arc<dyn Store>,
                #[shared(async_factory = |_path| async move { 1 })]
                c: Arc<dyn Store>,
            }
        },
    );
    assert!(parsed.diagnostics.is_empty());
    let closures: Vec<(bool, bool)> = parsed
        .container
        .members
        .iter()
        .map(|p| match p.construction_rule() {
            Some(ConstructionRule::Closure(c)) => (c.is_async, c.fallible),
            _ => panic!("expected a closure"),
        })
        .collect();
    assert_eq!(closures, vec![(false, true), (true, true), (true, false)]);
}

#[test]
fn test_structural_errors() {
    assert_eq!(
        kinds(
            quote!(),
            parse_quote! {
                struct App {
                    #[input]
                    #[shared]
                    a: Arc<dyn A>,
                    b: Arc<dyn B>,
                    #[shared(factory = make, factory = other)]
                    c: Arc<dyn C>,
                    #[transient(eager)]
                    d: Arc<dyn D>,
                    #[shared(factory = |(x, y)| x + y)]
                    e: Arc<dyn E>,
                    #[input]
                    f: _,
                }
            },
        ),
        vec![
            DiagnosticKind::MultipleBindings("a".into()),
            DiagnosticKind::UnknownScope("b".into()),
            DiagnosticKind::MultipleBindings("c".into()),
            DiagnosticKind::UnknownOption {
                subject: "d".into(),
                key: "eager".into(),
            },
            DiagnosticKind::UnnamedClosureParameter("e".into()),
            DiagnosticKind::MissingType("f".into()),
        ],
    );
}

#[test]
fn test_tuple_struct() {
    assert_eq!(
        kinds(quote!(), parse_quote!(struct App(u32);)),
        vec![DiagnosticKind::MissingName],
    );
}

#[test]
fn test_invalid_attribute_syntax() {
    let parsed = parse_container(
        quote!(),
        parse_quote! {
            struct App {
                #[shared(factory)]
                a: Arc<dyn A>,
            }
        },
    );
    assert_eq!(parsed.diagnostics.len(), 1);
    assert!(matches!(parsed.diagnostics[0].kind, DiagnosticKind::Syntax(_)));
    assert_eq!(parsed.diagnostics[0].subject, "a");
}

#[test]
fn test_annotated_struct() {
    let item: syn::ItemStruct = parse_quote! {
        #[derive(Clone)]
        #[wiring::container(root)]
        struct App {
            #[input]
            name: String,
        }
    };
    let parsed = parse_annotated(&item).unwrap();
    assert!(parsed.container.options.root);
    assert_eq!(parsed.container.attrs.len(), 1);

    let plain: syn::ItemStruct = parse_quote!(struct Plain;);
    assert!(parse_annotated(&plain).is_none());
}

#[test]
fn test_scan_file() {
    let file: syn::File = parse_quote! {
        use wiring::container;

        #[container(root)]
        struct App {
            #[input]
            name: String,
        }

        mod nested {
            mod deeper {
                #[container]
                struct Child {}
            }

            struct NotAContainer;
        }
    };
    let found = scan_file(&file);
    assert_eq!(found.len(), 2);
    assert!(found[0].modules.is_empty());
    assert_eq!(found[0].parsed.container.name, "App");
    assert_eq!(found[1].modules, vec!["nested", "deeper"]);
    assert_eq!(found[1].parsed.container.name, "Child");
}
