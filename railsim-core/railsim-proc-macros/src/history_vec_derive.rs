use crate::imports::*;
use crate::utilities::{named_fields, TokenStreamIterator};

pub(crate) fn history_vec_derive(input: TokenStream) -> TokenStream {
    let item_struct = syn::parse_macro_input!(input as syn::ItemStruct);
    let original_name = &item_struct.ident;
    let original_name_str: String = original_name.to_string();
    let new_name = Ident::new(
        &format!("{}HistoryVec", original_name.to_token_stream()),
        original_name.span(),
    );
    let new_name_str: String = new_name.to_string();
    let fields = named_fields(&item_struct);
    let field_names = fields
        .iter()
        .filter_map(|f| f.ident.as_ref())
        .collect::<Vec<_>>();
    let first_field = match field_names.first() {
        Some(first) => *first,
        None => abort!(original_name.span(), "`HistoryVec` needs at least one field"),
    };
    let vec_fields = fields
        .iter()
        .map(|f| {
            let ident = &f.ident;
            let ty = &f.ty;
            let docs = f
                .attrs
                .iter()
                .filter(|attr| attr.path.is_ident("doc"))
                .collect::<Vec<&syn::Attribute>>();
            quote! {
                #(#docs)*
                pub #ident: Vec<#ty>,
            }
        })
        .concat();
    let vec_new = field_names
        .iter()
        .map(|ident| {
            quote! {
                #ident: Vec::new(),
            }
        })
        .concat();
    let struct_doc = format!("Stores history of [{original_name_str}] as one vec per field");
    let push_doc = format!("Pushes fields of [{original_name_str}] to [{new_name_str}]");
    let pop_doc = format!("Remove and return last element as [{original_name_str}]");
    let get_doc = format!("Returns element at `i` as [{original_name_str}], if any");
    let state_vec_doc = format!("Return history as vec of [{original_name_str}]");

    let mut generated = TokenStream2::new();
    generated.append_all(quote! {
        #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
        #[doc = #struct_doc]
        pub struct #new_name {
            #vec_fields
        }

        impl Init for #new_name { }
        impl SerdeAPI for #new_name { }

        impl #new_name {
            /// Creates new empty vec container
            pub fn new() -> #new_name {
                #new_name {
                    #vec_new
                }
            }

            #[doc = #push_doc]
            pub fn push(&mut self, state: #original_name) {
                #(self.#field_names.push(state.#field_names);)*
            }

            /// Clears all history vecs
            pub fn clear(&mut self) {
                #(self.#field_names.clear();)*
            }

            #[doc = #pop_doc]
            pub fn pop(&mut self) -> Option<#original_name> {
                if self.is_empty() {
                    return None;
                }
                #(
                    let #field_names = self.#field_names.pop()?;
                )*
                Some(#original_name { #(#field_names),* })
            }

            #[doc = #get_doc]
            pub fn get(&self, i: usize) -> Option<#original_name> {
                if i >= self.len() {
                    return None;
                }
                Some(#original_name {
                    #(#field_names: self.#field_names[i].clone(),)*
                })
            }

            /// Returns len of contained vectors
            pub fn len(&self) -> usize {
                self.#first_field.len()
            }

            /// Returns true if contained vecs are empty
            pub fn is_empty(&self) -> bool {
                self.#first_field.is_empty()
            }

            #[doc = #state_vec_doc]
            pub fn state_vec(&self) -> Vec<#original_name> {
                (0..self.len()).filter_map(|i| self.get(i)).collect()
            }
        }

        impl Default for #new_name {
            fn default() -> #new_name {
                #new_name::new()
            }
        }
    });
    generated.into()
}
