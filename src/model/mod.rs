pub mod common;
pub mod extractor;
pub mod project;
pub mod registry;
pub mod sample;
pub mod schema;
pub mod spider;

pub use common::*;
pub use extractor::*;
pub use project::*;
pub use registry::*;
pub use sample::*;
pub use schema::*;
pub use spider::*;
