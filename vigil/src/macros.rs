//! Macros for listener error handling.
//!
//! Provides convenience macros for creating and returning [`crate::error::VigilError`]
//! instances with reduced boilerplate at store and protocol call sites.

/// Creates a [`crate::error::VigilError`] from error kind and description.
///
/// Accepts a static description and an optional dynamic detail expression, mirroring the
/// tuple conversions on the error type itself.
#[macro_export]
macro_rules! vigil_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::VigilError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::VigilError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::VigilError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::VigilError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Creates and returns a [`crate::error::VigilError`] from the current function.
///
/// Combines error creation with early return for conditions that terminate execution.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return ::core::result::Result::Err($crate::vigil_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::vigil_error!($kind, $desc, source: $source))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return ::core::result::Result::Err($crate::vigil_error!($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::vigil_error!(
            $kind,
            $desc,
            $detail,
            source: $source
        ))
    };
}
