//! `eventwatch-recon`: snapshot reconciliation engine.
//!
//! Pure engine crate: receives the stored snapshot and a normalized fetch,
//! returns the next snapshot and a change report. No IO, no clock reads.

pub mod engine;
pub mod index;
pub mod lifecycle;
pub mod model;

pub use engine::reconcile;
pub use model::{
    Change, ChangeReport, IdentityCollision, ReactivationPolicy, ReconPolicy, Reconciliation,
};
