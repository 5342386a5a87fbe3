//! # sharehub-entity
//!
//! Domain models for ShareHub: user/group shares, public link shares,
//! per-recipient received state, references, filters, and OCM
//! (federated) share records.

pub mod filter;
pub mod ocm;
pub mod public;
pub mod reference;
pub mod share;

pub use filter::ShareFilter;
pub use public::{PersistedPublicShare, PublicShare, Signature};
pub use reference::{ShareKey, ShareReference};
pub use share::{ReceivedShare, ReceivedShareState, Share, ShareId, ShareState};
