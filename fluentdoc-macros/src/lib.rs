//! Procedural macros for the fluentdoc project.
//!
//! `#[derive(Document)]` turns struct and field attributes into an implementation of
//! `fluentdoc::document::Document`:
//!
//! ```ignore
//! #[derive(Serialize, Deserialize, Document)]
//! #[document(collection = "entities")]
//! pub struct Entity {
//!     #[document(id)]
//!     pub key: String,
//!     pub name: String,
//!     #[document(ignore)]
//!     #[serde(default)]
//!     pub some_cache: HashMap<String, String>,
//!     #[document(index)]
//!     pub age: i32,
//! }
//! ```
//!
//! Struct attributes:
//! - `collection = "name"`: target collection (defaults to the snake_case type name)
//!
//! Field attributes:
//! - `id`: the identity field
//! - `index`: secondary index
//! - `unique`: unique secondary index
//! - `ignore`: excluded from persistence (`#[serde(skip)]` and
//!   `#[serde(skip_serializing)]` imply it)
//!
//! Field names are the serialized names: a field's `#[serde(rename = "...")]` wins,
//! otherwise the struct's `#[serde(rename_all = "...")]` applies. Generic structs get the
//! serde bounds `Document` needs added to the generated impl.

#[allow(unused_extern_crates)]
extern crate self as fluentdoc_macros;

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Fields, LitStr, Token, ext::IdentExt, meta::ParseNestedMeta,
    parse_macro_input, parse_quote,
};

#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct ContainerOptions {
    collection: Option<String>,
    rename_all: Option<RenameRule>,
}

#[derive(Default)]
struct FieldOptions {
    rename: Option<String>,
    identity: bool,
    index: bool,
    unique: bool,
    ignored: bool,
}

/// The serde `rename_all` rules, applied to snake_case field names the way serde does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> syn::Result<Self> {
        Ok(match lit.value().as_str() {
            "lowercase" => RenameRule::Lower,
            "UPPERCASE" => RenameRule::Upper,
            "PascalCase" => RenameRule::Pascal,
            "camelCase" => RenameRule::Camel,
            "snake_case" => RenameRule::Snake,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnake,
            "kebab-case" => RenameRule::Kebab,
            "SCREAMING-KEBAB-CASE" => RenameRule::ScreamingKebab,
            other => {
                return Err(syn::Error::new_spanned(
                    lit,
                    format!("unknown serde rename rule `{other}`"),
                ));
            }
        })
    }

    fn apply(self, field: &str) -> String {
        match self {
            RenameRule::Lower | RenameRule::Snake => field.to_string(),
            RenameRule::Upper | RenameRule::ScreamingSnake => field.to_ascii_uppercase(),
            RenameRule::Pascal => field.from_case(Case::Snake).to_case(Case::Pascal),
            RenameRule::Camel => field.from_case(Case::Snake).to_case(Case::Camel),
            RenameRule::Kebab => field.replace('_', "-"),
            RenameRule::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let container = parse_container_attrs(&input.attrs)?;
    let collection = container
        .collection
        .unwrap_or_else(|| ident.to_string().to_case(Case::Snake));

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    ident,
                    "Document can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "Document can only be derived for structs",
            ));
        }
    };

    let declarations = fields
        .iter()
        .map(|field| {
            let mut options = FieldOptions::default();
            parse_field_attrs(&field.attrs, &mut options)?;

            let rust_name = field
                .ident
                .as_ref()
                .map(|ident| ident.unraw().to_string())
                .unwrap_or_default();
            let name = serialized_name(&rust_name, options.rename.as_deref(), container.rename_all);

            Ok(field_schema(&name, &options))
        })
        .collect::<syn::Result<Vec<_>>>()?;

    let (_, ty_generics, _) = input.generics.split_for_impl();
    let mut generics = input.generics.clone();
    if generics.type_params().next().is_some() {
        generics.make_where_clause().predicates.push(parse_quote! {
            #ident #ty_generics: ::fluentdoc::serde::Serialize
                + for<'de> ::fluentdoc::serde::Deserialize<'de>
                + ::core::marker::Send
                + ::core::marker::Sync
                + 'static
        });
    }
    let (impl_generics, _, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::fluentdoc::document::Document for #ident #ty_generics #where_clause {
            fn collection_name() -> &'static str {
                #collection
            }

            fn schema() -> ::fluentdoc::schema::DocumentSchema {
                ::fluentdoc::schema::DocumentSchema::new()
                    #(.field(#declarations))*
            }
        }
    })
}

fn serialized_name(rust_name: &str, rename: Option<&str>, rename_all: Option<RenameRule>) -> String {
    match (rename, rename_all) {
        (Some(rename), _) => rename.to_string(),
        (None, Some(rule)) => rule.apply(rust_name),
        (None, None) => rust_name.to_string(),
    }
}

fn parse_container_attrs(attrs: &[Attribute]) -> syn::Result<ContainerOptions> {
    let mut options = ContainerOptions::default();

    for attr in attrs {
        if attr.path().is_ident("document") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("collection") {
                    options.collection = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported document attribute, expected `collection`"))
                }
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    options.rename_all = serialize_value(&meta)?
                        .map(|lit| RenameRule::parse(&lit))
                        .transpose()?
                        .or(options.rename_all);
                    Ok(())
                } else {
                    skip_serde_meta(&meta)
                }
            })?;
        }
    }

    Ok(options)
}

fn parse_field_attrs(attrs: &[Attribute], options: &mut FieldOptions) -> syn::Result<()> {
    for attr in attrs {
        if attr.path().is_ident("document") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    options.identity = true;
                } else if meta.path.is_ident("index") {
                    options.index = true;
                } else if meta.path.is_ident("unique") {
                    options.unique = true;
                } else if meta.path.is_ident("ignore") {
                    options.ignored = true;
                } else {
                    return Err(meta.error(
                        "unsupported document attribute, expected `id`, `index`, `unique` or `ignore`",
                    ));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    if let Some(lit) = serialize_value(&meta)? {
                        options.rename = Some(lit.value());
                    }
                    Ok(())
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    options.ignored = true;
                    Ok(())
                } else {
                    skip_serde_meta(&meta)
                }
            })?;
        }
    }

    Ok(())
}

/// Reads the serialize-side value of `key = "..."` or `key(serialize = "...", ..)`.
fn serialize_value(meta: &ParseNestedMeta) -> syn::Result<Option<LitStr>> {
    if meta.input.peek(Token![=]) {
        return Ok(Some(meta.value()?.parse::<LitStr>()?));
    }

    let mut serialize = None;
    meta.parse_nested_meta(|nested| {
        if nested.path.is_ident("serialize") {
            serialize = Some(nested.value()?.parse::<LitStr>()?);
            Ok(())
        } else {
            skip_serde_meta(&nested)
        }
    })?;

    Ok(serialize)
}

/// Consumes a serde option this macro does not care about, including its value or list.
fn skip_serde_meta(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|nested| skip_serde_meta(&nested))?;
    }
    Ok(())
}

fn field_schema(name: &str, options: &FieldOptions) -> TokenStream2 {
    let mut declaration = quote! { ::fluentdoc::schema::FieldSchema::new(#name) };

    if options.identity {
        declaration.extend(quote! { .identity() });
    }
    if options.unique {
        declaration.extend(quote! { .unique() });
    } else if options.index {
        declaration.extend(quote! { .indexed() });
    }
    if options.ignored {
        declaration.extend(quote! { .ignored() });
    }

    declaration
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(attr: Attribute) -> ContainerOptions {
        parse_container_attrs(&[attr]).unwrap()
    }

    #[test]
    fn rename_rules_follow_serde() {
        let cases = [
            (RenameRule::Lower, "user_key"),
            (RenameRule::Upper, "USER_KEY"),
            (RenameRule::Pascal, "UserKey"),
            (RenameRule::Camel, "userKey"),
            (RenameRule::Snake, "user_key"),
            (RenameRule::ScreamingSnake, "USER_KEY"),
            (RenameRule::Kebab, "user-key"),
            (RenameRule::ScreamingKebab, "USER-KEY"),
        ];

        for (rule, expected) in cases {
            assert_eq!(rule.apply("user_key"), expected, "{rule:?}");
        }
    }

    #[test]
    fn rename_all_reads_both_forms() {
        let plain = container(parse_quote!(#[serde(rename_all = "camelCase")]));
        assert_eq!(plain.rename_all, Some(RenameRule::Camel));

        let split = container(parse_quote!(
            #[serde(deny_unknown_fields, rename_all(deserialize = "snake_case", serialize = "kebab-case"))]
        ));
        assert_eq!(split.rename_all, Some(RenameRule::Kebab));

        let deserialize_only = container(parse_quote!(#[serde(rename_all(deserialize = "camelCase"))]));
        assert_eq!(deserialize_only.rename_all, None);
    }

    #[test]
    fn unknown_rename_rule_is_an_error() {
        let attr: Attribute = parse_quote!(#[serde(rename_all = "Title Case")]);
        assert!(parse_container_attrs(&[attr]).is_err());
    }

    #[test]
    fn field_rename_wins_over_rename_all() {
        let mut options = FieldOptions::default();
        let attrs: Vec<Attribute> = vec![parse_quote!(#[serde(default, rename(serialize = "login"))])];
        parse_field_attrs(&attrs, &mut options).unwrap();

        assert_eq!(
            serialized_name("handle", options.rename.as_deref(), Some(RenameRule::Camel)),
            "login"
        );
        assert_eq!(serialized_name("display_age", None, Some(RenameRule::Camel)), "displayAge");
        assert_eq!(serialized_name("display_age", None, None), "display_age");
    }

    #[test]
    fn skip_serializing_counts_as_ignored() {
        let mut options = FieldOptions::default();
        let attrs: Vec<Attribute> = vec![parse_quote!(#[serde(skip_serializing)])];
        parse_field_attrs(&attrs, &mut options).unwrap();
        assert!(options.ignored);
    }
}
