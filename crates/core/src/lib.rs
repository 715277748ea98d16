pub mod controller;
pub mod loader;
pub mod model;
pub mod options;
pub mod parsers;
pub mod svg;
pub mod tool;
pub mod views;

pub use controller::{Event, HeapstatTool, TreeScope};
pub use loader::{PendingLoad, spawn_load};
pub use model::Dataset;
pub use options::Options;
pub use parsers::{LoadError, ParseError};
pub use tool::{HeapstatFactory, ToolFactory};
