//! Library error type.
//!
//! Follows the same `error-chain` idiom the reference CLI driver uses:
//! configuration problems are reported through [`ErrorKind::Configuration`]
//! and surfaced at construction time, while I/O problems encountered by a
//! [`crate::diagnostics::ZdfWriter`] are wrapped through the foreign link
//! below and left to the caller of `report` to handle.

error_chain! {
    foreign_links {
        Io(::std::io::Error);
        Toml(::toml::de::Error);
        Bincode(::std::boxed::Box<::bincode::ErrorKind>);
    }

    errors {
        /// Raised at construction time: invalid `nx`, `box`, `dt`, `ppc`,
        /// an unknown enum string, a non-positive FWHM, a negative
        /// rise/flat/fall, or a density profile with `start > end`.
        Configuration(msg: String) {
            description("invalid simulation configuration")
            display("invalid simulation configuration: {}", msg)
        }
    }
}
