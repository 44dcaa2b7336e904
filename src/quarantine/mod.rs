//! Quarantine: the holding area for infected files and their provenance records.

pub mod provenance;
pub mod store;
