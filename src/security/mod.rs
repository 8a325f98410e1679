//! Trust boundary: which origins the guest may load from or talk as, and the
//! content policy its document runs under.

pub mod csp;
pub mod origin;

pub use csp::{build_csp, CspConfig};
pub use origin::{AllowedOrigins, OriginValidator};
