//! Macro for implementing Display and FromStr for tag-like enums
//!
//! Recording states and event kinds are exchanged as lowercase strings with
//! the extension; this macro keeps both directions of the mapping in one
//! place.
//!
//! # Example
//!
//! ```rust
//! use mindhit_domain::impl_domain_tag_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Connectivity {
//!     Online,
//!     Offline,
//! }
//!
//! impl_domain_tag_conversions!(Connectivity {
//!     Online => "online",
//!     Offline => "offline",
//! });
//!
//! assert_eq!(Connectivity::Online.to_string(), "online");
//! assert_eq!("OFFLINE".parse::<Connectivity>(), Ok(Connectivity::Offline));
//! ```

/// Implements Display and FromStr traits for tag enums
///
/// Parsing is case-insensitive; display always produces the canonical
/// lowercase form.
#[macro_export]
macro_rules! impl_domain_tag_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => ::std::result::Result::Ok(Self::$variant),)+
                    _ => ::std::result::Result::Err(::std::format!(
                        "Invalid {}: {}",
                        ::std::stringify!($enum_name),
                        s
                    )),
                }
            }
        }
    };
}
