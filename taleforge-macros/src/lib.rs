//! Proc macros for structured model output.
//!
//! Provides `#[derive(Schema)]`, which turns a documented struct or unit-only
//! enum into an implementation of `taleforge_core::schema::OutputSchema`. The
//! generated JSON schema follows the type's serde attributes, so the schema
//! the model sees and the shape serde accepts stay in step.
//!
//! # Example
//!
//! ```ignore
//! /// A discovered place
//! #[derive(Schema, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct Location {
//!     /// Name of the place
//!     name: String,
//!     /// What the player sees there
//!     short_description: Option<String>,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, DeriveInput, Field, Lit, LitStr, Meta, Type};

/// Derive macro for `OutputSchema`.
///
/// # Attributes
///
/// - `#[schema(name = "...")]` on the container - tool name (defaults to snake_case type name)
/// - `#[schema(optional)]` on fields - never list the field as required
/// - `#[schema(skip)]` on fields - leave the field out of the schema
/// - `#[schema(recursive)]` on fields - self-referential field, expanded to a bounded depth
///
/// `#[serde(rename_all)]`, `#[serde(rename)]`, `#[serde(default)]` and
/// `#[serde(skip)]` are honoured as serde would apply them.
#[proc_macro_derive(Schema, attributes(schema))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_schema(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn expand_schema(input: DeriveInput) -> syn::Result<TokenStream2> {
    let type_name = &input.ident;
    let container = ContainerAttrs::parse(&input.attrs)?;
    let schema_name = container
        .name
        .clone()
        .unwrap_or_else(|| to_snake_case(&type_name.to_string()));
    let description = get_doc_comment(&input.attrs);

    let body = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => expand_struct_body(&named.named, &container, &description)?,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Schema derive only supports structs with named fields",
                ))
            }
        },
        syn::Data::Enum(data) => expand_enum_body(data, &container, &description)?,
        syn::Data::Union(_) => {
            return Err(syn::Error::new_spanned(&input, "Schema derive does not support unions"))
        }
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::taleforge_core::schema::OutputSchema for #type_name #ty_generics #where_clause {
            fn schema_name() -> &'static str {
                #schema_name
            }

            fn schema_description() -> &'static str {
                #description
            }

            fn schema_at_depth(depth: usize) -> ::serde_json::Value {
                let _ = depth;
                #body
            }
        }
    })
}

fn expand_struct_body(
    fields: &syn::punctuated::Punctuated<Field, syn::token::Comma>,
    container: &ContainerAttrs,
    description: &str,
) -> syn::Result<TokenStream2> {
    let mut property_tokens = Vec::new();

    for field in fields {
        let attrs = FieldAttrs::parse(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let wire_name = attrs
            .rename
            .clone()
            .unwrap_or_else(|| container.rename_field(&ident.to_string()));
        let field_desc = get_doc_comment(&field.attrs);

        let depth_expr = if attrs.recursive {
            quote! { depth + 1 }
        } else {
            quote! { depth }
        };
        let type_schema = type_to_schema(&field.ty, &depth_expr);

        let desc_token = if field_desc.is_empty() {
            quote! {}
        } else {
            quote! {
                if let Some(object) = property.as_object_mut() {
                    object.insert("description".to_string(), ::serde_json::json!(#field_desc));
                }
            }
        };

        let is_required = !(attrs.optional
            || attrs.default
            || attrs.recursive
            || container.default
            || is_option_type(&field.ty));
        let required_token = if is_required {
            quote! { required.push(#wire_name); }
        } else {
            quote! {}
        };

        let insert = quote! {
            {
                let mut property = #type_schema;
                #desc_token
                properties.insert(#wire_name.to_string(), property);
                #required_token
            }
        };

        if attrs.recursive {
            property_tokens.push(quote! {
                if depth + 1 < ::taleforge_core::schema::MAX_OBJECTIVE_DEPTH {
                    #insert
                }
            });
        } else {
            property_tokens.push(insert);
        }
    }

    let desc_token = if description.is_empty() {
        quote! {}
    } else {
        quote! {
            if let Some(object) = schema.as_object_mut() {
                object.insert("description".to_string(), ::serde_json::json!(#description));
            }
        }
    };

    Ok(quote! {
        let mut properties = ::serde_json::Map::new();
        #[allow(unused_mut)]
        let mut required: Vec<&str> = Vec::new();
        #(#property_tokens)*

        let mut schema = ::serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required
        });
        #desc_token
        schema
    })
}

fn expand_enum_body(
    data: &syn::DataEnum,
    container: &ContainerAttrs,
    description: &str,
) -> syn::Result<TokenStream2> {
    let mut values = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, syn::Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Schema derive only supports enums with unit variants",
            ));
        }
        let attrs = FieldAttrs::parse(&variant.attrs)?;
        if attrs.skip {
            continue;
        }
        values.push(
            attrs
                .rename
                .unwrap_or_else(|| container.rename_variant(&variant.ident.to_string())),
        );
    }

    let desc_token = if description.is_empty() {
        quote! {}
    } else {
        quote! {
            if let Some(object) = schema.as_object_mut() {
                object.insert("description".to_string(), ::serde_json::json!(#description));
            }
        }
    };

    Ok(quote! {
        let mut schema = ::serde_json::json!({
            "type": "string",
            "enum": [#(#values),*]
        });
        #desc_token
        schema
    })
}

// ============================================================================
// Attribute parsing
// ============================================================================

#[derive(Default)]
struct ContainerAttrs {
    name: Option<String>,
    rename_all: Option<String>,
    default: bool,
}

impl ContainerAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();
        for attr in attrs {
            if attr.path().is_ident("schema") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        let value: LitStr = meta.value()?.parse()?;
                        out.name = Some(value.value());
                        Ok(())
                    } else {
                        Err(meta.error("unsupported schema container attribute"))
                    }
                })?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename_all") {
                        let value: LitStr = meta.value()?.parse()?;
                        out.rename_all = Some(value.value());
                    } else if meta.path.is_ident("default") {
                        out.default = true;
                        skip_meta_value(&meta)?;
                    } else {
                        skip_meta_value(&meta)?;
                    }
                    Ok(())
                })?;
            }
        }
        Ok(out)
    }

    fn rename_field(&self, name: &str) -> String {
        match self.rename_all.as_deref() {
            Some("camelCase") => snake_to_camel(name),
            Some("lowercase") => name.to_lowercase(),
            Some("UPPERCASE") => name.to_uppercase(),
            Some("kebab-case") => name.replace('_', "-"),
            _ => name.to_string(),
        }
    }

    fn rename_variant(&self, name: &str) -> String {
        match self.rename_all.as_deref() {
            Some("lowercase") => name.to_lowercase(),
            Some("UPPERCASE") => name.to_uppercase(),
            Some("snake_case") => to_snake_case(name),
            Some("kebab-case") => to_snake_case(name).replace('_', "-"),
            Some("camelCase") => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => first.to_lowercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
            _ => name.to_string(),
        }
    }
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    optional: bool,
    default: bool,
    skip: bool,
    recursive: bool,
}

impl FieldAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = Self::default();
        for attr in attrs {
            if attr.path().is_ident("schema") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("optional") {
                        out.optional = true;
                    } else if meta.path.is_ident("skip") {
                        out.skip = true;
                    } else if meta.path.is_ident("recursive") {
                        out.recursive = true;
                    } else {
                        return Err(meta.error("unsupported schema field attribute"));
                    }
                    Ok(())
                })?;
            } else if attr.path().is_ident("serde") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        let value: LitStr = meta.value()?.parse()?;
                        out.rename = Some(value.value());
                    } else if meta.path.is_ident("default") {
                        out.default = true;
                        skip_meta_value(&meta)?;
                    } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                        out.skip = true;
                    } else {
                        skip_meta_value(&meta)?;
                    }
                    Ok(())
                })?;
            }
        }
        Ok(out)
    }
}

/// Consume whatever value an attribute we do not interpret carries.
fn skip_meta_value(meta: &syn::meta::ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: TokenStream2 = content.parse()?;
    }
    Ok(())
}

fn get_doc_comment(attrs: &[Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &nv.value {
                    if let Lit::Str(s) = &expr_lit.lit {
                        let line = s.value().trim().to_string();
                        if !line.is_empty() {
                            docs.push(line);
                        }
                    }
                }
            }
        }
    }
    docs.join(" ")
}

// ============================================================================
// Type mapping
// ============================================================================

fn is_option_type(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|segment| segment.ident == "Option")
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(type_path) => type_path.path.segments.last(),
        _ => None,
    }
}

fn first_generic(segment: &syn::PathSegment) -> Option<&Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
        if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
            return Some(inner);
        }
    }
    None
}

fn type_to_schema(ty: &Type, depth: &TokenStream2) -> TokenStream2 {
    let Some(segment) = last_segment(ty) else {
        return quote! { ::serde_json::json!({}) };
    };

    match segment.ident.to_string().as_str() {
        "String" | "str" => quote! { ::serde_json::json!({"type": "string"}) },
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { ::serde_json::json!({"type": "integer"}) }
        }
        "f32" | "f64" => quote! { ::serde_json::json!({"type": "number"}) },
        "bool" => quote! { ::serde_json::json!({"type": "boolean"}) },
        "Value" => quote! { ::serde_json::json!({}) },
        "Option" | "Box" | "Arc" => match first_generic(segment) {
            Some(inner) => type_to_schema(inner, depth),
            None => quote! { ::serde_json::json!({}) },
        },
        "Vec" => match first_generic(segment) {
            Some(inner) => {
                let inner_schema = type_to_schema(inner, depth);
                quote! {
                    ::serde_json::json!({
                        "type": "array",
                        "items": #inner_schema
                    })
                }
            }
            None => quote! { ::serde_json::json!({"type": "array"}) },
        },
        _ => quote! {
            <#ty as ::taleforge_core::schema::OutputSchema>::schema_at_depth(#depth)
        },
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

fn snake_to_camel(s: &str) -> String {
    let mut result = String::new();
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' {
            upper_next = !result.is_empty();
        } else if upper_next {
            result.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            result.push(c);
        }
    }
    result
}
