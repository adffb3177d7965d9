use quote::quote;
use syn::parse_quote;
use wiring_codegen::generate::{ParamKind, Resolution, StepKind};
use wiring_codegen::{ConstructorPlan, Container, generate, parse_container};

fn container(item: syn::ItemStruct) -> Container {
    let parsed = parse_container(quote!(validate = false), item);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    parsed.container
}

fn resolutions(plan: &ConstructorPlan, name: &str) -> Vec<(Option<String>, Resolution)> {
    plan.step(name)
        .unwrap()
        .args
        .iter()
        .map(|arg| (arg.source.clone(), arg.resolution))
        .collect()
}

#[test]
fn test_parameter_order() {
    let plan = ConstructorPlan::build(&container(parse_quote! {
        struct App {
            #[transient(factory = || 1, concrete)]
            t: u32,
            #[shared(factory = || 2, concrete)]
            s: u32,
            #[input]
            a: u32,
            #[shared(factory = || 3, concrete)]
            s2: u32,
            #[input]
            b: u32,
        }
    }));
    assert_eq!(plan.param_names(), vec!["a", "b", "s", "s2", "t"]);
    let kinds: Vec<ParamKind> = plan.params.iter().map(|p| p.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ParamKind::Required,
            ParamKind::Required,
            ParamKind::Override,
            ParamKind::Override,
            ParamKind::Override,
        ],
    );
    let steps: Vec<&str> = plan.steps.iter().map(|s| s.provider.as_str()).collect();
    assert_eq!(steps, vec!["t", "s", "a", "s2", "b"]);
}

#[test]
fn test_step_kinds() {
    let plan = ConstructorPlan::build(&container(parse_quote! {
        struct App {
            #[input]
            a: u32,
            #[shared(factory = |a| a + 1, concrete)]
            b: u32,
            #[shared(async_factory = async |b| b + 1, concrete)]
            c: u32,
            #[shared(concrete)]
            d: u32,
            #[transient(factory = |a| a * 2, concrete)]
            e: u32,
        }
    }));
    let kinds: Vec<StepKind> = plan.steps.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            StepKind::Bind,
            StepKind::Memoize,
            StepKind::Defer,
            StepKind::Placeholder,
            StepKind::Override,
        ],
    );
    assert!(!plan.fallible);
}

#[test]
fn test_argument_resolution() {
    let plan = ConstructorPlan::build(&container(parse_quote! {
        struct App {
            #[input]
            config: Arc<Config>,
            #[input]
            clock: Arc<dyn Clock>,
            #[shared(factory = |config, _clock| make(config, _clock))]
            exact: Arc<dyn A>,
            #[shared(factory = |cfg, clk| make(cfg, clk))]
            positional: Arc<dyn A>,
            #[shared(factory = |_, _, _, _, extra| make(extra))]
            unresolved: Arc<dyn A>,
        }
    }));
    assert_eq!(
        resolutions(&plan, "exact"),
        vec![
            (Some("config".into()), Resolution::Exact),
            (Some("clock".into()), Resolution::Stripped),
        ],
    );
    assert_eq!(
        resolutions(&plan, "positional"),
        vec![
            (Some("config".into()), Resolution::Positional),
            (Some("clock".into()), Resolution::Positional),
        ],
    );
    let unresolved = resolutions(&plan, "unresolved");
    assert_eq!(unresolved[0], (Some("config".into()), Resolution::Positional));
    assert_eq!(unresolved[4], (None, Resolution::Unresolved));
}

#[test]
fn test_shared_sees_only_earlier_members() {
    let plan = ConstructorPlan::build(&container(parse_quote! {
        struct App {
            #[shared(factory = |later| later)]
            early: Arc<dyn A>,
            #[shared(factory = || make())]
            later: Arc<dyn A>,
            #[transient(factory = |later, next| make(later, next))]
            current: Arc<dyn A>,
            #[transient(factory = || make())]
            next: Arc<dyn A>,
        }
    }));
    assert_eq!(
        resolutions(&plan, "early"),
        vec![(None, Resolution::Unresolved)],
    );
    let current = resolutions(&plan, "current");
    assert_eq!(current[0], (Some("later".into()), Resolution::Exact));
    // `next` is declared after `current`, so the second argument falls back
    // to the second visible member.
    assert_eq!(current[1], (Some("later".into()), Resolution::Positional));
}

#[test]
fn test_expression_rules_bind_scanned_names() {
    let plan = ConstructorPlan::build(&container(parse_quote! {
        struct App {
            #[input]
            config: Arc<Config>,
            #[shared(init = Arc::new(Console::new(self.config.clone(), level)))]
            logger: Arc<dyn Logger>,
        }
    }));
    assert_eq!(
        resolutions(&plan, "logger"),
        vec![(Some("config".into()), Resolution::Exact)],
    );
}

#[test]
fn test_fallible_constructor() {
    let item: syn::ItemStruct = parse_quote! {
        struct App {
            #[input]
            path: String,
            #[shared(factory = |path| open(path), fallible)]
            store: Arc<dyn Store>,
        }
    };
    let container = container(item);
    assert!(ConstructorPlan::build(&container).fallible);
    let tokens = generate(&container).to_string();
    assert!(tokens.contains("Result < Self , :: wiring :: StdError >"));
}

#[test]
fn test_transient_failures_do_not_make_new_fallible() {
    let container = container(parse_quote! {
        struct App {
            #[transient(factory = || parse(), fallible)]
            value: Arc<dyn Value>,
        }
    });
    assert!(!ConstructorPlan::build(&container).fallible);
    let tokens = generate(&container).to_string();
    assert!(tokens.contains("fn value (& self) -> :: core :: result :: Result < Arc < dyn Value > , :: wiring :: StdError >"));
}

#[test]
fn test_generated_surface() {
    let container = container(parse_quote! {
        pub struct App {
            #[input]
            pub config: Arc<Config>,
            #[shared(factory = |config| Arc::new(Console::new(config)))]
            pub logger: Arc<dyn Logger>,
            #[shared(async_factory = async |config| connect(config).await)]
            pub pool: Arc<dyn Pool>,
            #[transient(async_factory = async |pool| pool.session().await)]
            pub session: Box<dyn Session>,
        }
    });
    let tokens = generate(&container).to_string();
    assert!(tokens.contains("pub fn new (config : Arc < Config > , logger : :: core :: option :: Option < Arc < dyn Logger > > , pool : :: core :: option :: Option < Arc < dyn Pool > > , session : :: core :: option :: Option < Box < dyn Session > >) -> Self"));
    assert!(tokens.contains("pool : :: wiring :: Deferred < Arc < dyn Pool > >"));
    assert!(tokens.contains(":: wiring :: Deferred :: spawn"));
    assert!(tokens.contains(":: wiring :: Deferred :: ready"));
    assert!(tokens.contains("pub async fn pool (& self) -> :: core :: result :: Result < Arc < dyn Pool > , :: wiring :: SharedError >"));
    assert!(tokens.contains("pub async fn session (& self)"));
    assert!(tokens.contains("pub fn logger (& self) -> Arc < dyn Logger >"));
    assert!(!tokens.contains("#[input]"));
    assert!(!tokens.contains("__wiring_exclusive"));
}

#[test]
fn test_exclusive_marker() {
    let parsed = parse_container(
        quote!(exclusive),
        parse_quote! {
            struct App {
                #[input]
                a: u32,
            }
        },
    );
    let tokens = generate(&parsed.container).to_string();
    assert!(tokens.contains("__wiring_exclusive : :: core :: marker :: PhantomData < * const () >"));
}

#[test]
fn test_missing_factory_placeholder() {
    let container = container(parse_quote! {
        struct App {
            #[shared]
            a: Arc<dyn A>,
        }
    });
    let tokens = generate(&container).to_string();
    assert!(tokens.contains(":: wiring :: missing_factory (\"App\" , \"a\")"));
}

#[test]
fn test_typed_factory_wraps_pointer() {
    let container = container(parse_quote! {
        struct App {
            #[input]
            pool: Arc<dyn Pool>,
            #[shared(typed(SqlRepo, pool))]
            repo: Arc<dyn Repo>,
        }
    });
    let tokens = generate(&container).to_string();
    assert!(tokens.contains("Arc :: new (< SqlRepo > :: new (__wiring_arg0))"));
}

#[test]
fn test_self_access_is_rewritten() {
    let container = container(parse_quote! {
        struct App {
            #[input]
            config: Arc<Config>,
            #[shared(init = Arc::new(Console::new(self.config.clone())))]
            logger: Arc<dyn Logger>,
        }
    });
    let tokens = generate(&container).to_string();
    assert!(tokens.contains("Console :: new (config . clone ())"));
    assert!(!tokens.contains("self . config . clone"));
}

#[test]
fn test_macro_arguments_bind_members() {
    let container = container(parse_quote! {
        struct App {
            #[input]
            config: Arc<Config>,
            #[shared(init = format!("{}:{}", self.config.name, prefix), concrete)]
            label: String,
        }
    });
    let plan = ConstructorPlan::build(&container);
    assert_eq!(
        resolutions(&plan, "label"),
        vec![(Some("config".into()), Resolution::Exact)],
    );
    let tokens = generate(&container).to_string();
    assert!(tokens.contains("let config = :: core :: clone :: Clone :: clone (& config) ;"));
    assert!(tokens.contains("format ! (\"{}:{}\" , config . name , prefix)"));
    assert!(!tokens.contains("self . config"));
}

#[test]
fn test_async_propagates_through_transients() {
    let plan = ConstructorPlan::build(&container(parse_quote! {
        struct App {
            #[input]
            name: String,
            #[shared(async_factory = async |name| connect(name).await)]
            pool: Arc<dyn Pool>,
            #[transient(factory = |pool| pool.session())]
            session: Box<dyn Session>,
            #[transient(factory = |session| session.id(), concrete)]
            session_id: u64,
            #[transient(factory = |name| name.len(), concrete)]
            name_len: usize,
        }
    }));
    let flags: Vec<(&str, bool)> = plan
        .steps
        .iter()
        .map(|step| (step.provider.as_str(), step.is_async))
        .collect();
    assert_eq!(
        flags,
        vec![
            ("name", false),
            ("pool", true),
            ("session", true),
            ("session_id", true),
            ("name_len", false),
        ],
    );
}
