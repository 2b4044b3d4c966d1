use crate::imports::*;

// adapted from https://github.com/lumol-org/soa-derive/blob/master/soa-derive-internal/src/input.rs
pub(crate) trait TokenStreamIterator {
    fn concat_by(self, f: impl Fn(TokenStream2, TokenStream2) -> TokenStream2) -> TokenStream2;
    fn concat(self) -> TokenStream2;
}

impl<T: Iterator<Item = TokenStream2>> TokenStreamIterator for T {
    fn concat_by(mut self, f: impl Fn(TokenStream2, TokenStream2) -> TokenStream2) -> TokenStream2 {
        match self.next() {
            Some(first) => self.fold(first, f),
            None => quote! {},
        }
    }

    fn concat(self) -> TokenStream2 {
        self.concat_by(|a, b| quote! { #a #b })
    }
}

/// Returns named fields of `item_struct`, aborting on tuple and unit structs
pub(crate) fn named_fields(item_struct: &syn::ItemStruct) -> Vec<&syn::Field> {
    match &item_struct.fields {
        syn::Fields::Named(named) => named.named.iter().collect(),
        _ => abort!(
            item_struct.ident.span(),
            "only structs with named fields are supported"
        ),
    }
}
