//! Classifier lifecycle policies
//!
//! Pure, side-effect-free decisions over a [`RegistrySnapshot`]. The
//! reconciler evaluates them in a fixed order each cycle:
//! selection, then training trigger, then purge.
//!
//! [`RegistrySnapshot`]: crate::registry::RegistrySnapshot

mod purge;
mod selection;
mod training;

pub use purge::purge_candidates;
pub use selection::select_active;
pub use training::{creation_times_unknown, newest_created_at, should_train};
