pub mod callstack;
pub mod dataset;
pub mod frame;
pub mod snapshot;

pub use callstack::{Accounting, Callstack, StaleSample};
pub use dataset::Dataset;
pub use frame::{FrameInfo, SourceLocation};
pub use snapshot::{AllocationRecord, Snapshot};
