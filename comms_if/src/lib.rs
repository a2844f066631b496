//! # Communications Interface Library
//!
//! This library defines the messages exchanged between the software executables
//! of the Ares rover, along with the network primitives used to carry them.
//!
//! Messages are grouped by the equipment they concern (see [`eqpt`]), and all
//! of them serialise to JSON so that clients written in other languages can
//! join the network without a shared binary schema.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod eqpt;
pub mod net;
