//! Business rules that do not touch the database.

pub mod access;
pub mod discount;
pub mod geo;
pub mod status;
pub mod verification;
