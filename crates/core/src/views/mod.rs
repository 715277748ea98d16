pub mod axis;
pub mod frames;
pub mod staleness;
pub mod table;
pub mod timeline;
