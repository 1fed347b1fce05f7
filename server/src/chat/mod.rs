//! Chat relay core: store-and-forward delivery and presence fan-out.

pub mod delivery;
pub mod presence;
