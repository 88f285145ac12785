pub mod config;
pub mod error;
pub mod graph;
pub mod migration;
pub mod parser;
pub mod yaml;

pub use config::Config;
pub use error::{ConvertError, Result};
pub use graph::DependencyGraph;
pub use migration::{convert_to_cnb, Conversion, ConvertOptions, Converter};
pub use parser::github::GitHubActionsParser;
pub use parser::workflow::SourceWorkflow;
