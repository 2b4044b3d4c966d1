mod imports;
use imports::*;
mod history_vec_derive;
mod serde_api_derive;
mod utilities;

#[proc_macro_error]
#[proc_macro_derive(HistoryVec)]
/// Generate HistoryVec that acts like a vec of states but
/// stores each field of state as a vec field.
pub fn history_vec_derive(input: TokenStream) -> TokenStream {
    history_vec_derive::history_vec_derive(input)
}

#[proc_macro_error]
#[proc_macro_derive(SerdeAPI)]
/// Implements `SerdeAPI` with its default file and string methods.  The type must also
/// implement `Init`.
pub fn serde_api_derive(input: TokenStream) -> TokenStream {
    serde_api_derive::serde_api_derive(input)
}
