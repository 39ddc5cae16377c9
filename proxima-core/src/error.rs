//! Error types shared by the vector and label collaborators.
//!
//! Graph-level failures live in [`crate::graph::GraphError`]; this module
//! hosts the errors raised by the sources the graph reads from, together with
//! the macro that derives stable machine-readable codes for every error enum
//! in the crate.

use std::fmt;

use thiserror::Error;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? $( ( $($tuple:tt)* ) )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? $( ( $($tuple)* ) )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

pub(crate) use define_error_codes;

/// An error produced by [`crate::VectorSource`] and [`crate::LabelSource`]
/// implementations.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SourceError {
    /// Requested ordinal was outside the source's bounds.
    #[error("ordinal {index} is out of bounds for a source of {len} vectors")]
    OutOfBounds {
        /// The requested ordinal.
        index: usize,
        /// Number of vectors held by the source.
        len: usize,
    },
    /// A vector did not match the dimension of the source.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension every vector of the source must have.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Vectors must have a positive dimension.
    #[error("vectors must have positive dimension")]
    ZeroDimension,
    /// Shared source storage was poisoned by a panicking writer.
    #[error("vector storage lock poisoned")]
    StoragePoisoned,
}

define_error_codes! {
    /// Stable codes describing [`SourceError`] variants.
    enum SourceErrorCode for SourceError {
        /// Requested ordinal was outside the source's bounds.
        OutOfBounds => OutOfBounds { .. } => "SOURCE_OUT_OF_BOUNDS",
        /// A vector did not match the dimension of the source.
        DimensionMismatch => DimensionMismatch { .. } => "SOURCE_DIMENSION_MISMATCH",
        /// Vectors must have a positive dimension.
        ZeroDimension => ZeroDimension => "SOURCE_ZERO_DIMENSION",
        /// Shared source storage was poisoned.
        StoragePoisoned => StoragePoisoned => "SOURCE_STORAGE_POISONED",
    }
}
