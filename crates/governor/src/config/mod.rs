//! Declarative `selector -> policy` tables loaded from `governor.toml`.

mod build;
mod loading;
mod types;
mod validation;

pub use types::{GovernorConfig, PolicySpec};
