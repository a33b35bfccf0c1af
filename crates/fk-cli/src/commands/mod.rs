//! CLI command implementations

pub(crate) mod common;
pub(crate) mod cycles;
pub(crate) mod plan;
pub(crate) mod validate;
