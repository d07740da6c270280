/// Declares a fixed catalogue of well-known partition type GUIDs as
/// `Type` constants, plus a `FromStr` impl that recognises them by GUID
/// string.
macro_rules! partition_types {
    (
        $(
            $(#[$docs:meta])*
            ($upcase:ident, $guid:expr, $os:expr, $desc:expr)
        ),+ $(,)?
    ) => {
        $(
            $(#[$docs])*
            pub const $upcase: Type = Type {
                guid: uuid::uuid!($guid),
                os: $os,
                description: $desc,
            };
        )+

        /// All well-known partition types, in declaration order.
        pub const ALL: &[Type] = &[$($upcase),+];

        impl std::str::FromStr for Type {
            type Err = crate::error::GptError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.to_ascii_uppercase();
                ALL.iter()
                    .copied()
                    .find(|t| t.guid.hyphenated().to_string().to_ascii_uppercase() == needle)
                    .ok_or(crate::error::GptError::NotFound)
            }
        }
    }
}
