//! Concurrency-safe reservation registries.
//!
//! Both registries expose an atomic reserve-or-fail / release contract and
//! never hand out their underlying maps. Reads are concurrent, writes
//! serialized; no lookup can observe a partial add or remove.

mod id_index;
mod names;

pub use id_index::IdIndex;
pub use names::NameRegistry;
