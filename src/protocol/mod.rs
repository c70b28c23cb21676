//! Protocol-level utilities: constants, header formatting and option encoding.

pub mod constants;
pub mod headers;
pub mod params;

pub use headers::*;
pub use params::*;
