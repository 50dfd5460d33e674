#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod ir;
pub mod layout;
pub mod layout_dump;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, CteMode, LayoutConfig, NodeSizer, load_config};
pub use error::LayoutError;
pub use ir::{CteDefinition, CteMetadata, CteReference, LayoutRequest, PlanNode};
pub use layout::{PlanLayout, compute_plan_layout, compute_plan_layout_with_sizer};
