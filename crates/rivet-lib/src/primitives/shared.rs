/// Macro to generate FromStr implementations for enums with named variants
///
/// Each variant lists its canonical name followed by accepted aliases.
#[macro_export]
macro_rules! impl_fromstr_for_named_enum {
    ($enum_type:ty, $error_reason:expr, { $($variant:path => [$($name:literal),+ $(,)?]),+ $(,)? }) => {
        impl FromStr for $enum_type {
            type Err = $crate::primitives::ConfigError;

            fn from_str(s: &str) -> Result<Self, $crate::primitives::ConfigError> {
                let needle = s.trim().to_ascii_lowercase();
                $(
                    if [$($name),+].contains(&needle.as_str()) {
                        return Ok($variant);
                    }
                )+

                Err($crate::primitives::ConfigError::ParseError {
                    value: s.to_string(),
                    reason: $error_reason.to_string(),
                })
            }
        }
    };
}

// Re-export for internal use
pub(crate) use impl_fromstr_for_named_enum;
