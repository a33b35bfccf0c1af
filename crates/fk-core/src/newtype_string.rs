//! Catalog identifier newtypes.
//!
//! Schema, table, column and constraint names are kept apart at the type
//! level so a column name can never be passed where a table is expected.
//! Names are compared exactly as the catalog reports them; quoting such as
//! `[Sales]` is stripped before a name reaches these types.

/// Define a catalog identifier: a non-blank name with string-like access.
///
/// The generated type serializes as a plain string and refuses blank names
/// when read from a snapshot or config file. It compares against `&str`
/// directly, which keeps lookups like `table.column("ProductID")` cheap.
macro_rules! define_newtype_string {
    (
        $(#[$meta:meta])*
        $vis:vis struct $Name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(into = "String", try_from = "String")]
        $vis struct $Name(String);

        impl $Name {
            /// Wrap a name known to be valid, e.g. a literal in a builder.
            ///
            /// Panics on a blank name; names read from files go through
            /// [`try_new`](Self::try_new) or deserialization instead.
            pub fn new(name: impl Into<String>) -> Self {
                let name = name.into();
                assert!(!name.trim().is_empty(), concat!(stringify!($Name), " must not be blank"));
                Self(name)
            }

            /// `None` for a blank name.
            pub fn try_new(name: impl Into<String>) -> Option<Self> {
                let name = name.into();
                (!name.trim().is_empty()).then_some(Self(name))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $Name {
            type Error = String;
            fn try_from(name: String) -> Result<Self, Self::Error> {
                $Name::try_new(name).ok_or_else(|| concat!(stringify!($Name), " must not be blank").to_string())
            }
        }

        impl TryFrom<&str> for $Name {
            type Error = String;
            fn try_from(name: &str) -> Result<Self, Self::Error> {
                $Name::try_from(name.to_string())
            }
        }

        impl From<$Name> for String {
            fn from(name: $Name) -> Self {
                name.0
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::ops::Deref for $Name {
            type Target = str;
            fn deref(&self) -> &str { &self.0 }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str { &self.0 }
        }

        impl std::borrow::Borrow<str> for $Name {
            fn borrow(&self) -> &str { &self.0 }
        }

        impl PartialEq<str> for $Name {
            fn eq(&self, other: &str) -> bool { self.0 == other }
        }

        impl PartialEq<&str> for $Name {
            fn eq(&self, other: &&str) -> bool { self.0 == *other }
        }
    };
}

pub(crate) use define_newtype_string;
