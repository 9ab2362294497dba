//! Builds one unified EPC (energy performance certificate) dataset from two
//! regional extracts, resolving every record to a canonical LSOA code and
//! normalizing the free-text categorical columns on the way through.

pub mod clean;
pub mod error;
pub mod link;
pub mod lookup;
pub mod regions;
pub mod table;
pub mod unify;
