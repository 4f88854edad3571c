//! Interactive authorization flows

pub mod loopback;

pub use loopback::LoopbackAuthorizationFlow;
