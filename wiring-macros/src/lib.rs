use proc_macro::TokenStream;
use syn::{Error, ItemStruct};

/// Attribute macro turning a struct into a dependency injection container.
///
/// Every field needs one of `#[input]`, `#[shared(..)]` or
/// `#[transient(..)]`. Problems in the declaration are reported as compile
/// errors and no code is generated for the container.
#[proc_macro_attribute]
pub fn container(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = proc_macro2::TokenStream::from(attr);
    let output = match syn::parse::<ItemStruct>(item) {
        Ok(item) => wiring_codegen::expand(args, item),
        Err(err) => Error::new(
            err.span(),
            "#[container] can only be applied to structs with named fields",
        )
        .to_compile_error(),
    };
    output.into()
}
