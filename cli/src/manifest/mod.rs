//! Manifest model and its TOML front end.
pub mod expand;
pub mod loader;
pub mod model;
pub mod validation;
pub mod variants;

pub use expand::EnginePaths;
pub use model::{
    ConfigureAction, Dependency, InstallStep, Installer, Manifest, OptionGate, Probe, Requirement,
    Target,
};
pub use variants::OsVariants;
