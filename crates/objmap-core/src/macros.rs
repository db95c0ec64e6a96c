//! Declarative macros shared across objmap.

/// Generate a newtype wrapper with `From` conversions and accessors.
///
/// # Example
///
/// ```rust
/// use objmap_core::newtype_wrapper;
///
/// newtype_wrapper!(#[derive(Debug, Clone, Copy, PartialEq)] pub struct Slot(usize));
///
/// let slot: Slot = 3.into();
/// assert_eq!(slot.into_inner(), 3);
/// ```
#[macro_export]
macro_rules! newtype_wrapper {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($inner:ty)) => {
        $(#[$meta])*
        $vis struct $name(pub $inner);

        impl $name {
            /// Create a new instance from the inner value.
            #[inline]
            pub fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Get the inner value.
            #[inline]
            pub fn into_inner(self) -> $inner {
                self.0
            }

            /// Get a reference to the inner value.
            #[inline]
            pub fn as_inner(&self) -> &$inner {
                &self.0
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

/// Generate `Display` and case-insensitive `FromStr` implementations for a
/// fieldless enum.
///
/// # Example
///
/// ```rust
/// use objmap_core::enum_from_str;
///
/// #[derive(Debug, PartialEq)]
/// enum Verb {
///     Read,
///     Write,
/// }
///
/// enum_from_str!(Verb, [Read => "READ", Write => "WRITE"]);
///
/// assert_eq!("read".parse::<Verb>().unwrap(), Verb::Read);
/// assert_eq!(Verb::Write.to_string(), "WRITE");
/// ```
#[macro_export]
macro_rules! enum_from_str {
    ($enum_name:ident, [$($variant:ident => $str:expr),* $(,)?]) => {
        impl $enum_name {
            /// Canonical spelling of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($enum_name::$variant => $str),*
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($str) {
                        return Ok($enum_name::$variant);
                    }
                )*
                Err(format!("Unknown {}: {}", stringify!($enum_name), s))
            }
        }
    };
}

/// Implement [`Mappable`](crate::object::Mappable) for a plain struct by
/// listing the fields that descriptors may read and write.
///
/// Every listed field type must convert into a
/// [`FieldValue`](crate::value::FieldValue) and implement
/// [`FromFieldValue`](crate::value::FromFieldValue). Fields that are not listed
/// are invisible to the mapper.
///
/// ```rust
/// use objmap_core::impl_mappable;
/// use objmap_core::object::Mappable;
/// use objmap_core::value::FieldValue;
///
/// #[derive(Debug, Default)]
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// impl_mappable!(Tag, "Tag", { id, label });
///
/// let mut tag = Tag::default();
/// tag.set_field("label", FieldValue::from("rust")).unwrap();
/// assert_eq!(tag.get_field("label"), Some(FieldValue::from("rust")));
/// ```
#[macro_export]
macro_rules! impl_mappable {
    ($ty:ty, $type_name:expr, { $($field:ident),* $(,)? }) => {
        impl $crate::object::Mappable for $ty {
            fn type_name(&self) -> &str {
                $type_name
            }

            fn get_field(&self, field: &str) -> Option<$crate::value::FieldValue> {
                match field {
                    $(stringify!($field) => Some($crate::value::FieldValue::from(self.$field.clone())),)*
                    _ => None,
                }
            }

            fn set_field(
                &mut self,
                field: &str,
                value: $crate::value::FieldValue,
            ) -> std::result::Result<(), $crate::object::FieldError> {
                match field {
                    $(
                        stringify!($field) => {
                            self.$field = $crate::value::FromFieldValue::from_field_value(value)
                                .map_err(|expected| $crate::object::FieldError::TypeMismatch {
                                    field: field.to_string(),
                                    expected,
                                })?;
                            Ok(())
                        }
                    )*
                    _ => Err($crate::object::FieldError::UnknownField(field.to_string())),
                }
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
    };
}
