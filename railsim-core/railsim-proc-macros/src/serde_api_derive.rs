use crate::imports::*;

pub(crate) fn serde_api_derive(input: TokenStream) -> TokenStream {
    let item = syn::parse_macro_input!(input as syn::DeriveInput);
    let ident = &item.ident;
    let (impl_generics, type_generics, where_clause) = item.generics.split_for_impl();
    let mut generated = TokenStream2::new();
    generated.append_all(quote! {
        impl #impl_generics SerdeAPI for #ident #type_generics #where_clause {}
    });
    generated.into()
}
