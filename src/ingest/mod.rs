//! Network ingestion: the sessioned portal client and response
//! classification.

pub mod koenergy;
pub mod validate;
