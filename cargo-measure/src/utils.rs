//! Error plumbing for file reading and the test-item filter of the walker.
use std::io;
use std::panic::Location;

#[track_caller]
pub fn error_with_location<E>(err: E) -> Box<dyn std::error::Error>
where
    E: std::fmt::Display,
{
    let loc = Location::caller();
    Box::new(io::Error::other(format!(
        "{} at {}:{}",
        err,
        loc.file(),
        loc.line()
    )))
}

#[macro_export]
macro_rules! loc_try {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => {
                return Err($crate::error_with_location(err));
            }
        }
    };
}

/// Whether an item is test-only code: `#[test]`, or a `cfg` naming the
/// `test` flag. `cfg(feature = "testing")` does not count.
pub(crate) fn has_test_attr(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|a| {
        if a.path().is_ident("test") {
            return true;
        }
        if !a.path().is_ident("cfg") {
            return false;
        }
        match &a.meta {
            syn::Meta::List(l) => l
                .tokens
                .to_string()
                .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '"'))
                .any(|word| word == "test"),
            _ => false,
        }
    })
}
