#![doc = include_str!("../README.md")]

use unsynn::*;

unsynn! {
    /// Attributes, visibility, qualifiers and signature of the test function.
    struct Signature {
        items: Any<Cons<Except<BraceGroup>, TokenTree>>,
    }

    struct TestFn {
        signature: Signature,
        body: BraceGroup,
    }
}

impl quote::ToTokens for Signature {
    fn to_tokens(&self, tokens: &mut unsynn::TokenStream) {
        self.items.to_tokens(tokens)
    }
}

/// Runs `facet_testhelpers::setup()` before the test body.
///
/// ```ignore
/// #[facet_testhelpers::test]
/// fn resolves_nested_fields() {
///     // tracing output is filtered by FACET_LOG
/// }
/// ```
///
/// An argument replaces the default `#[test]` attribute, e.g.
/// `#[facet_testhelpers::test(tokio::test)]`.
#[proc_macro_attribute]
pub fn test(
    attr: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let item = TokenStream::from(item);
    let TestFn { signature, body } = match item.to_token_iter().parse::<TestFn>() {
        Ok(parsed) => parsed,
        Err(err) => {
            let message = format!("#[facet_testhelpers::test] expects a function: {err}");
            return quote::quote! { ::core::compile_error!(#message); }.into();
        }
    };

    let test_attr = if attr.is_empty() {
        quote::quote! { #[::core::prelude::rust_2024::test] }
    } else {
        let attr = TokenStream::from(attr);
        quote::quote! { #[#attr] }
    };
    let body = body.0.stream();

    quote::quote! {
        #test_attr
        #signature {
            ::facet_testhelpers::setup();
            #body
        }
    }
    .into()
}
