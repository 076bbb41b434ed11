use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;

/// How a field was classified for tracking purposes.
enum FieldKind {
    Scalar,
    /// `inner` is the bare nested type, `optional` is whether the field
    /// itself is `Option<T>` (a nullable complex property, §4.1).
    Complex { inner: syn::Type, optional: bool },
    /// `element` is the sequence's element type (`Vec<element>`).
    Collection { element: syn::Type },
}

struct Field {
    ident: syn::Ident,
    ty: syn::Type,
    kind: FieldKind,
}

/// Classifies a field from its attributes and, failing that, its syntactic
/// type shape — there is no runtime reflection to fall back on, so this is
/// the compile-time stand-in for the Schema Introspector (§4.1a).
fn classify(field: &syn::Field) -> syn::Result<FieldKind> {
    for attr in &field.attrs {
        if !attr.path().is_ident("trackable") {
            continue;
        }
        let mut explicit = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("complex") {
                explicit = Some("complex");
            } else if meta.path.is_ident("collection") {
                explicit = Some("collection");
            } else if meta.path.is_ident("scalar") {
                explicit = Some("scalar");
            } else {
                return Err(meta.error("expected `complex`, `collection`, or `scalar`"));
            }
            Ok(())
        })?;

        match explicit {
            Some("scalar") => return Ok(FieldKind::Scalar),
            Some("complex") => {
                let (inner, optional) = option_inner(&field.ty)
                    .map(|inner| (inner, true))
                    .unwrap_or_else(|| (field.ty.clone(), false));
                return Ok(FieldKind::Complex { inner, optional });
            }
            Some("collection") => {
                let element = vec_element(&field.ty).ok_or_else(|| {
                    syn::Error::new(field.ty.span(), "`#[trackable(collection)]` requires a `Vec<_>` field")
                })?;
                return Ok(FieldKind::Collection { element });
            }
            _ => {}
        }
    }

    if let Some(element) = vec_element(&field.ty) {
        return Ok(FieldKind::Collection { element });
    }

    Ok(FieldKind::Scalar)
}

fn path_of(ty: &syn::Type) -> Option<&syn::Path> {
    match ty {
        syn::Type::Path(syn::TypePath { qself: None, path }) => Some(path),
        _ => None,
    }
}

fn single_generic_arg(path: &syn::Path, name: &str) -> Option<syn::Type> {
    let segment = path.segments.last()?;
    if segment.ident != name {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        syn::GenericArgument::Type(ty) => Some(ty.clone()),
        _ => None,
    })
}

fn vec_element(ty: &syn::Type) -> Option<syn::Type> {
    single_generic_arg(path_of(ty)?, "Vec")
}

fn option_inner(ty: &syn::Type) -> Option<syn::Type> {
    single_generic_arg(path_of(ty)?, "Option")
}

pub(crate) fn expand_trackable(input: syn::DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let syn::Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "`Trackable` can only be derived for structs",
        ));
    };
    let syn::Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new(
            input.span(),
            "`Trackable` requires named fields",
        ));
    };

    let mut fields = Vec::with_capacity(named.named.len());
    for field in &named.named {
        let ident = field.ident.clone().expect("named field");
        let kind = classify(field)?;
        fields.push(Field { ident, ty: field.ty.clone(), kind });
    }

    let field_schema_entries = fields.iter().map(|f| {
        let name = f.ident.to_string();
        let kind = match &f.kind {
            FieldKind::Scalar => quote!(::trackable::schema::FieldKind::Scalar),
            FieldKind::Complex { .. } => quote!(::trackable::schema::FieldKind::Complex),
            FieldKind::Collection { .. } => quote!(::trackable::schema::FieldKind::Collection),
        };
        quote! {
            ::trackable::schema::FieldSchema { name: #name, kind: #kind }
        }
    });

    let scalar_get_arms = fields.iter().filter_map(|f| {
        if !matches!(f.kind, FieldKind::Scalar) {
            return None;
        }
        let ident = &f.ident;
        let name = ident.to_string();
        Some(quote! { #name => ::std::boxed::Box::new(self.#ident.clone()), })
    });

    let scalar_set_arms = fields.iter().filter_map(|f| {
        if !matches!(f.kind, FieldKind::Scalar) {
            return None;
        }
        let ident = &f.ident;
        let name = ident.to_string();
        let ty = &f.ty;
        Some(quote! {
            #name => self.#ident = ::trackable::scalar::downcast_scalar::<#ty>(value).clone(),
        })
    });

    let complex_wrap_arms = fields.iter().filter_map(|f| {
        let FieldKind::Complex { inner, optional } = &f.kind else { return None; };
        let ident = &f.ident;
        let name = ident.to_string();
        if *optional {
            Some(quote! {
                #name => self.#ident.as_ref().map(|value| {
                    ::std::boxed::Box::new(::trackable::record::TrackedRecord::<#inner>::wrap_with_config(value.clone(), cfg))
                        as ::std::boxed::Box<dyn ::trackable::any_tracked::AnyTracked>
                }),
            })
        } else {
            Some(quote! {
                #name => Some(::std::boxed::Box::new(
                    ::trackable::record::TrackedRecord::<#inner>::wrap_with_config(self.#ident.clone(), cfg)
                ) as ::std::boxed::Box<dyn ::trackable::any_tracked::AnyTracked>),
            })
        }
    });

    let complex_assign_arms = fields.iter().filter_map(|f| {
        let FieldKind::Complex { inner, optional } = &f.kind else { return None; };
        let ident = &f.ident;
        let name = ident.to_string();
        if *optional {
            Some(quote! {
                #name => self.#ident = wrapped.map(|w| {
                    ::trackable::any_tracked::downcast_ref::<::trackable::record::TrackedRecord<#inner>>(w)
                        .expect("derive(Trackable): complex field type mismatch")
                        .current()
                        .clone()
                }),
            })
        } else {
            Some(quote! {
                #name => if let Some(w) = wrapped {
                    self.#ident = ::trackable::any_tracked::downcast_ref::<::trackable::record::TrackedRecord<#inner>>(w)
                        .expect("derive(Trackable): complex field type mismatch")
                        .current()
                        .clone();
                },
            })
        }
    });

    let collection_wrap_arms = fields.iter().filter_map(|f| {
        let FieldKind::Collection { element } = &f.kind else { return None; };
        let ident = &f.ident;
        let name = ident.to_string();
        Some(quote! {
            #name => ::std::boxed::Box::new(
                ::trackable::collection::TrackedCollection::<#element>::track_with_config(self.#ident.clone(), cfg)
                    .expect("wrapping a Vec field can never fail")
            ) as ::std::boxed::Box<dyn ::trackable::any_tracked::AnyTracked>,
        })
    });

    let collection_assign_arms = fields.iter().filter_map(|f| {
        let FieldKind::Collection { element } = &f.kind else { return None; };
        let ident = &f.ident;
        let name = ident.to_string();
        Some(quote! {
            #name => {
                let tc = ::trackable::any_tracked::downcast_ref::<::trackable::collection::TrackedCollection<#element>>(wrapped)
                    .expect("derive(Trackable): collection field type mismatch");
                self.#ident = tc.iter().map(|tr| tr.current().clone()).collect();
            }
        })
    });

    let schema_static_name = syn::Ident::new(
        &format!("__TRACKABLE_SCHEMA_{}", name.to_string().to_uppercase()),
        name.span(),
    );
    let field_count = fields.len();

    Ok(quote! {
        #[doc(hidden)]
        static #schema_static_name: ::trackable::schema::Schema = ::trackable::schema::Schema {
            fields: &[ #(#field_schema_entries),* ],
        };

        impl #impl_generics ::trackable::schema::Trackable for #name #ty_generics #where_clause {
            fn schema() -> &'static ::trackable::schema::Schema {
                &#schema_static_name
            }

            fn scalar_get(&self, field: &str) -> ::std::boxed::Box<dyn ::trackable::scalar::TrackedScalar> {
                match field {
                    #(#scalar_get_arms)*
                    _ => unreachable!("derive(Trackable): unknown scalar field {}", field),
                }
            }

            fn scalar_set(&mut self, field: &str, value: &dyn ::trackable::scalar::TrackedScalar) {
                match field {
                    #(#scalar_set_arms)*
                    _ => unreachable!("derive(Trackable): unknown scalar field {}", field),
                }
            }

            fn complex_wrap(
                &self,
                field: &str,
                cfg: ::trackable::schema::TrackingConfig,
            ) -> Option<::std::boxed::Box<dyn ::trackable::any_tracked::AnyTracked>> {
                match field {
                    #(#complex_wrap_arms)*
                    _ => unreachable!("derive(Trackable): unknown complex field {}", field),
                }
            }

            fn complex_assign(
                &mut self,
                field: &str,
                wrapped: Option<&dyn ::trackable::any_tracked::AnyTracked>,
            ) {
                match field {
                    #(#complex_assign_arms)*
                    _ => unreachable!("derive(Trackable): unknown complex field {}", field),
                }
            }

            fn collection_wrap(
                &self,
                field: &str,
                cfg: ::trackable::schema::TrackingConfig,
            ) -> ::std::boxed::Box<dyn ::trackable::any_tracked::AnyTracked> {
                match field {
                    #(#collection_wrap_arms)*
                    _ => unreachable!("derive(Trackable): unknown collection field {}", field),
                }
            }

            fn collection_assign(&mut self, field: &str, wrapped: &dyn ::trackable::any_tracked::AnyTracked) {
                match field {
                    #(#collection_assign_arms)*
                    _ => unreachable!("derive(Trackable): unknown collection field {}", field),
                }
            }
        }

        #[doc(hidden)]
        const _: usize = #field_count;
    })
}
