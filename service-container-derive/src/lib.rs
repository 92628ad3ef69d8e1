//! Derive macro for service-container
//!
//! `#[derive(Autowire)]` describes a struct as a class the container can
//! build: every named field becomes a constructor parameter, in declaration
//! order.
//!
//! # Example
//!
//! ```rust,ignore
//! use service_container::{Autowire, Container};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Logger;
//!
//! #[derive(Autowire)]
//! #[autowire(name = "Mailer")]
//! struct SmtpMailer {
//!     #[inject]
//!     logger: Arc<Logger>,
//!     host: String,
//!     #[param(default)]
//!     port: u16,
//! }
//!
//! let container = Container::new();
//! container.register_class(ClassDef::without_constructor::<Logger>("Logger"));
//! container.register_class_of::<SmtpMailer>();
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr, Type};

/// Derive `service_container::Autowire`.
///
/// # Attributes
///
/// - `#[autowire(name = "...")]` on the struct - class name (defaults to the
///   struct name)
/// - `#[inject]` - field of type `Arc<T>` resolved through the container
///   under the name of `T`
/// - `#[inject("Name")]` - same, resolved under `Name`
/// - `#[param(default)]` - plain field whose declared default is
///   `Default::default()`
///
/// Plain fields are filled from supplied arguments by position or by field
/// name and must be `Clone`.
#[proc_macro_derive(Autowire, attributes(autowire, inject, param))]
pub fn derive_autowire(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_autowire(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_autowire(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Autowire cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Autowire can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Autowire can only be derived for structs",
            ));
        }
    };

    let class_name = class_name_attr(&input.attrs)?.unwrap_or_else(|| name.to_string());

    let mut params = Vec::new();
    let mut field_inits = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let Some(field_name) = field.ident.as_ref() else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let param_name = field_name.to_string();
        let field_type = &field.ty;

        match inject_attr(&field.attrs)? {
            Some(explicit) => {
                let inner = extract_arc_inner_type(field_type).ok_or_else(|| {
                    syn::Error::new_spanned(
                        field_type,
                        "Fields marked with #[inject] must have type Arc<T>",
                    )
                })?;
                let service = match explicit {
                    Some(service) => service,
                    None => type_name_of(inner).ok_or_else(|| {
                        syn::Error::new_spanned(
                            inner,
                            "cannot derive a service name from this type, use #[inject(\"Name\")]",
                        )
                    })?,
                };
                params.push(quote! {
                    ::service_container::Param::service(#param_name, #service)
                });
                field_inits.push(quote! {
                    #field_name: args.get::<#inner>(#index)?
                });
            }
            None => {
                let param = if has_param_default(&field.attrs)? {
                    quote! {
                        ::service_container::Param::new(#param_name).with_default(
                            ::service_container::Value::new(
                                <#field_type as ::std::default::Default>::default()
                            )
                        )
                    }
                } else {
                    quote! { ::service_container::Param::new(#param_name) }
                };
                params.push(param);
                field_inits.push(quote! {
                    #field_name: args.cloned::<#field_type>(#index)?
                });
            }
        }
    }

    Ok(quote! {
        impl ::service_container::Autowire for #name {
            fn class_def() -> ::service_container::ClassDef {
                ::service_container::ClassDef::new::<Self, _>(
                    #class_name,
                    [#(#params),*],
                    |args: ::service_container::ResolvedArgs| {
                        let _ = &args;
                        ::std::result::Result::Ok(Self {
                            #(#field_inits),*
                        })
                    },
                )
            }
        }
    })
}

/// `#[autowire(name = "...")]`
fn class_name_attr(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut name = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("autowire")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(name)
}

/// `#[inject]` gives `Some(None)`, `#[inject("Name")]` gives `Some(Some(name))`
fn inject_attr(attrs: &[Attribute]) -> syn::Result<Option<Option<String>>> {
    for attr in attrs {
        if attr.path().is_ident("inject") {
            if attr.meta.require_path_only().is_ok() {
                return Ok(Some(None));
            }
            let service = attr.parse_args::<LitStr>()?;
            return Ok(Some(Some(service.value())));
        }
    }
    Ok(None)
}

/// `#[param(default)]`
fn has_param_default(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut default = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("param")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                default = true;
                Ok(())
            } else {
                Err(meta.error("expected `default`"))
            }
        })?;
    }
    Ok(default)
}

/// Extract T from Arc<T>
fn extract_arc_inner_type(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty {
        let segment = type_path.path.segments.last()?;
        if segment.ident == "Arc" {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                    return Some(inner);
                }
            }
        }
    }
    None
}

/// Last path segment of a type, used as the default service name
fn type_name_of(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    }
}
