use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, spanned::Spanned, FnArg, Ident, ItemFn, Pat,
    Signature, Token, Type,
};

/// Transform an asynchronous test into a synchronous one running against its
/// own freshly built server, and inject the local client.
///
/// The only injectable dependency is [`rocket::local::asynchronous::Client`].
///
/// Accepted arguments:
///  - `voter`: register and log in as `NewUser::example()` first.
///  - `admin`: insert `User::admin_example()` and log in as them first.
///  - `fraud`: make the random fraud check flag every vote.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);
    let args = parse_macro_input!(args with Punctuated::<Ident, Token![,]>::parse_terminated);

    // Reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let mut fraud = false;
    let mut logins = Vec::new();
    for arg in &args {
        if arg == "fraud" {
            fraud = true;
        } else if arg == "voter" {
            logins.push(quote! {
                rocket_client
                    .post(uri!(crate::api::auth::register))
                    .header(rocket::http::ContentType::JSON)
                    .body(rocket::serde::json::json!(crate::model::user::NewUser::example()).to_string())
                    .dispatch()
                    .await;
            });
        } else if arg == "admin" {
            logins.push(quote! {
                rocket_client
                    .rocket()
                    .state::<crate::model::election::Election>()
                    .unwrap()
                    .users()
                    .insert(crate::model::user::User::admin_example())
                    .unwrap();

                rocket_client
                    .post(uri!(crate::api::auth::login))
                    .header(rocket::http::ContentType::JSON)
                    .body(rocket::serde::json::json!(crate::model::api::Credentials::admin_example()).to_string())
                    .dispatch()
                    .await;
            });
        } else {
            return syn::Error::new(arg.span(), "Expected any of `voter`, `admin` or `fraud`")
                .into_compile_error()
                .into();
        }
    }

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> rocket::local::asynchronous::Client {
                let election = crate::model::election::Election::example(#fraud);
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_election(crate::Config::example(), election),
                )
                .await
                .unwrap();

                #(#logins)*

                rocket_client
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let rocket_client = setup().await;
                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut args = vec![];
    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself
                let last = type_path.path.segments.last().unwrap();
                if last.ident == "Client" {
                    if !args.is_empty() {
                        return Err(syn::Error::new(
                            input.span(),
                            "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                        ));
                    }
                    args.push(quote! { rocket_client });
                    continue;
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected `client_ident: Client`",
        ));
    }

    Ok(args)
}
