//! Top-level facade crate for sigrelay.
//!
//! Re-exports the protocol types, the hub and the client so users can depend
//! on a single crate.

pub mod core {
    pub use sigrelay_core::*;
}

pub mod hub {
    pub use sigrelay_hub::*;
}

pub mod client {
    pub use sigrelay_client::*;
}
