//! # wiring
//!
//! Compile-time dependency injection containers.
//!
//! A container is a struct whose fields are tagged with a lifecycle scope.
//! The [`container`] attribute checks the declaration while compiling and
//! generates a constructor that builds every member in declaration order,
//! plus one accessor per member.
//!
//! ## Scopes
//!
//! - `#[input]`: supplied by the caller of `new`.
//! - `#[shared(..)]`: built once per container instance and cloned on access.
//! - `#[transient(..)]`: rebuilt on every access.
//!
//! Shared and transient members take an optional override in `new`; an
//! override replaces the member's factory for the lifetime of the instance.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct Console {
//!     prefix: String,
//! }
//!
//! impl Greeter for Console {
//!     fn greet(&self) -> String {
//!         format!("{} world", self.prefix)
//!     }
//! }
//!
//! #[wiring::container]
//! struct App {
//!     #[input]
//!     prefix: String,
//!     #[shared(factory = |prefix| Arc::new(Console { prefix }))]
//!     greeter: Arc<dyn Greeter>,
//!     #[transient(factory = |greeter| greeter.greet(), concrete)]
//!     message: String,
//! }
//!
//! let app = App::new("hello".to_string(), None, None);
//! assert_eq!(app.message(), "hello world");
//! ```
//!
//! Binding a concrete type at shared or transient scope needs the `concrete`
//! flag; trait objects, `impl Trait` and generic parameters do not.
//!
//! ## Asynchronous Members
//!
//! A shared member with an `async_factory` is computed by a unit of work
//! spawned on the current Tokio runtime during `new`. Its accessor is async
//! and every caller awaits the same [`Deferred`] result, so the factory runs
//! at most once.
//!
//! ## Features
//!
//! - `macros` (default): Enables the [`container`] attribute

mod deferred;

pub use deferred::*;

#[cfg(feature = "macros")]
pub use wiring_macros::container;

pub type StdError = Box<dyn std::error::Error + Send + Sync>;

/// Fails the access to a member that has neither a factory nor an override.
///
/// Only reachable from containers declared with `validate = false`.
#[cold]
#[track_caller]
pub fn missing_factory(container: &str, provider: &str) -> ! {
    panic!("`{container}::{provider}` has no factory and no override was supplied")
}
