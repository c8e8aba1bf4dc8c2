//! Builder macro for session configuration types.

/// Generate a builder for a configuration type that implements `Default`.
///
/// The builder starts from `$Config::default()`. Setters for `optional`
/// fields overwrite the default in place; `required` fields are held aside
/// and `build()` fails with [`BuilderError::MissingRequiredField`] for any
/// that was never set. All setters accept `impl Into<T>`.
///
/// [`BuilderError::MissingRequiredField`]: crate::error::BuilderError::MissingRequiredField
macro_rules! impl_builder {
    (
        $Config:ident, $Builder:ident {
            required { $( $req_field:ident : $req_ty:ty ),* $(,)? }
            optional { $( $opt_field:ident : $opt_ty:ty ),* $(,)? }
        }
    ) => {
        #[doc = concat!("Builder for [`", stringify!($Config), "`].")]
        #[derive(Debug)]
        pub struct $Builder {
            config: $Config,
            $( $req_field: Option<$req_ty>, )*
        }

        impl $Config {
            pub fn builder() -> $Builder {
                $Builder {
                    config: $Config::default(),
                    $( $req_field: None, )*
                }
            }
        }

        impl $Builder {
            $(
                pub fn $req_field(mut self, value: impl Into<$req_ty>) -> Self {
                    self.$req_field = Some(value.into());
                    self
                }
            )*

            $(
                pub fn $opt_field(mut self, value: impl Into<$opt_ty>) -> Self {
                    self.config.$opt_field = value.into();
                    self
                }
            )*

            pub fn build(self) -> Result<$Config, $crate::error::BuilderError> {
                let mut config = self.config;
                $(
                    config.$req_field = self.$req_field.ok_or(
                        $crate::error::BuilderError::MissingRequiredField {
                            builder: stringify!($Builder),
                            field: stringify!($req_field),
                        },
                    )?;
                )*
                Ok(config)
            }
        }
    };
}

pub(crate) use impl_builder;
