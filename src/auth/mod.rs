pub mod access;
pub mod roles;

pub use access::*;
pub use roles::*;
