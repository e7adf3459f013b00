use darling::{
    util::{Flag, Ignored},
    FromDeriveInput, FromField,
};
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, Generics, Ident, Type};

/// Container-level options. Only structs with named fields can carry configuration.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(config), supports(struct_named))]
struct ConfigOpts {
    ident: Ident,
    generics: Generics,
    data: darling::ast::Data<Ignored, FieldOpts>,
}

/// Field-level attributes for `#[config(...)]`
#[derive(Debug, FromField)]
#[darling(attributes(config))]
struct FieldOpts {
    ident: Option<Ident>,
    ty: Type,

    /// Key segment, used verbatim
    #[darling(default)]
    key: Option<String>,

    /// Fallback text applied when no source provides the key
    #[darling(default, rename = "default")]
    default_value: Option<String>,

    /// Missing value without default is an error. Word form only.
    required: Flag,

    /// Splice the embedded struct's fields into this level
    flatten: Flag,

    /// Coerce through `FromStr` instead of `ConfigField`
    from_str: Flag,
}

/// How a single field takes part in the metadata tree.
enum FieldRole<'a> {
    Keyed {
        ident: &'a Ident,
        ty: &'a Type,
        key: &'a str,
        default_value: Option<&'a str>,
        required: bool,
        from_str: bool,
    },
    Flatten {
        ident: &'a Ident,
    },
}

pub fn generate_impl(input: &DeriveInput) -> TokenStream2 {
    match ConfigOpts::from_derive_input(input) {
        Ok(opts) => generate_from_opts(&opts).unwrap_or_else(|e| e.write_errors()),
        Err(e) => e.write_errors(),
    }
}

fn generate_from_opts(opts: &ConfigOpts) -> Result<TokenStream2, darling::Error> {
    let fields = match &opts.data {
        darling::ast::Data::Struct(fields) => &fields.fields,
        darling::ast::Data::Enum(_) => {
            return Err(darling::Error::custom(
                "#[derive(Config)] can only be applied to structs with named fields",
            )
            .with_span(&opts.ident))
        }
    };

    let roles = collect_roles(fields)?;

    let bound_idents: Vec<&Ident> = roles
        .iter()
        .map(|role| match role {
            FieldRole::Keyed { ident, .. } | FieldRole::Flatten { ident } => *ident,
        })
        .collect();

    let pushes: Vec<TokenStream2> = roles.iter().map(generate_item).collect();

    let struct_name = &opts.ident;
    let (impl_generics, ty_generics, where_clause) = opts.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::configfx::Configurable for #struct_name #ty_generics #where_clause {
            fn describe(&mut self) -> ::std::vec::Vec<::configfx::ConfigItemMeta<'_>> {
                let Self { #(#bound_idents,)* .. } = self;
                #[allow(unused_mut)]
                let mut items = ::std::vec::Vec::new();
                #(#pushes)*
                items
            }
        }

        impl #impl_generics ::configfx::ConfigField for #struct_name #ty_generics #where_clause {
            fn bind(&mut self) -> ::configfx::Binding<'_> {
                ::configfx::Binding::Struct(::configfx::Configurable::describe(self))
            }
        }
    })
}

fn collect_roles(fields: &[FieldOpts]) -> Result<Vec<FieldRole<'_>>, darling::Error> {
    let mut errors = Vec::new();
    let mut roles = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };

        let required = field.required.is_present();
        let from_str = field.from_str.is_present();
        match (&field.key, field.flatten.is_present()) {
            (Some(_), true) => errors.push(
                darling::Error::custom("`key` and `flatten` cannot be combined").with_span(ident),
            ),
            (Some(key), false) => roles.push(FieldRole::Keyed {
                ident,
                ty: &field.ty,
                key,
                default_value: field.default_value.as_deref(),
                required,
                from_str,
            }),
            (None, true) => {
                if field.default_value.is_some() || required || from_str {
                    errors.push(
                        darling::Error::custom(
                            "`default`, `required` and `from_str` do not apply to flattened fields",
                        )
                        .with_span(ident),
                    );
                } else {
                    roles.push(FieldRole::Flatten { ident });
                }
            }
            (None, false) => {
                if field.default_value.is_some() || required || from_str {
                    errors.push(
                        darling::Error::custom("this attribute requires `key = \"...\"`")
                            .with_span(ident),
                    );
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(roles)
    } else {
        Err(darling::Error::multiple(errors))
    }
}

fn generate_item(role: &FieldRole<'_>) -> TokenStream2 {
    match role {
        FieldRole::Flatten { ident } => quote! {
            items.extend(::configfx::Configurable::describe(#ident));
        },
        FieldRole::Keyed {
            ident,
            ty,
            key,
            default_value,
            required,
            from_str,
        } => {
            let binding = if *from_str {
                quote! {
                    ::configfx::Binding::Value(::std::boxed::Box::new(
                        ::configfx::FromStrValue::new(#ident),
                    ))
                }
            } else {
                quote! { ::configfx::ConfigField::bind(#ident) }
            };

            let required = required.then(|| quote! { .required() });
            let default_value = default_value.map(|text| quote! { .with_default(#text) });

            quote! {
                items.push(
                    ::configfx::ConfigItemMeta::new(
                        #key,
                        ::core::any::type_name::<#ty>(),
                        #binding,
                    )
                    #required
                    #default_value
                );
            }
        }
    }
}
