//! Naming conventions shared by the topology and force-field models.

pub mod identifiers;
