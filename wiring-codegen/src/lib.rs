//! # wiring-codegen
//!
//! Compiler behind the `#[container]` attribute of the `wiring` crate.
//!
//! A container declaration goes through a fixed pipeline:
//!
//! - [`parse`] turns an annotated struct into a [`Container`] model;
//! - [`extract`] finds the dependency names each [`Provider`] refers to;
//! - [`validate`](validate()) checks structural, policy and graph rules using
//!   [`find_cycles`];
//! - [`generate`](generate()) renders the constructor and accessors for a
//!   container without diagnostics.
//!
//! The [`graph`] module works at project scope: it links containers of many
//! files through their call sites and reports cross-container cycles and
//! ambiguous references.
//!
//! ```rust
//! let item: syn::ItemStruct = syn::parse_quote! {
//!     struct App {
//!         #[input]
//!         name: String,
//!         #[shared(factory = |name| name.len(), concrete)]
//!         len: usize,
//!     }
//! };
//! let parsed = wiring_codegen::parse_container(quote::quote!(), item);
//! assert!(parsed.diagnostics.is_empty());
//! assert!(wiring_codegen::validate(&parsed.container).is_empty());
//! ```

pub mod cycles;
pub mod diagnostic;
pub mod extract;
pub mod generate;
pub mod graph;
pub mod model;
pub mod parse;
pub mod validate;

use proc_macro2::TokenStream;
use syn::ItemStruct;

pub use cycles::find_cycles;
pub use diagnostic::{Diagnostic, DiagnosticKind, to_compile_errors};
pub use extract::{References, references};
pub use generate::{ConstructorPlan, generate};
pub use graph::{CallSite, ContainerDecl, GraphReport, ProjectGraph};
pub use model::{
    ClosureFactory, ConstructionRule, Container, ContainerOptions, Factory, Provider, Scope,
    TypedFactory,
};
pub use parse::{Parsed, parse_container, scan_file};
pub use validate::validate;

/// Parses, validates and generates a container.
///
/// Any diagnostic, from the front end or the validator, suppresses the
/// generated code; all of them are returned as `compile_error!`s instead.
pub fn expand(args: TokenStream, item: ItemStruct) -> TokenStream {
    let Parsed {
        container,
        mut diagnostics,
    } = parse_container(args, item);
    diagnostics.extend(validate(&container));
    if !diagnostics.is_empty() {
        return to_compile_errors(&diagnostics);
    }
    generate(&container)
}

/// Checks a container without generating code.
pub fn check(parsed: &Parsed) -> Vec<Diagnostic> {
    let mut diagnostics = parsed.diagnostics.clone();
    diagnostics.extend(validate(&parsed.container));
    diagnostics
}
