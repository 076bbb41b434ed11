extern crate proc_macro;

mod trackable_expand;

use trackable_expand::expand_trackable;

#[proc_macro_derive(Trackable, attributes(trackable))]
pub fn trackable(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(item as syn::DeriveInput);

    expand_trackable(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
