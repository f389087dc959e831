//! Identity, tier, and bearer-token models plus the JWT codec that mints and verifies them.

pub mod codec;
pub mod id;
pub mod peek;
pub mod tier;
pub mod token;

pub use codec::*;
pub use id::*;
pub use peek::*;
pub use tier::*;
pub use token::*;
