pub mod channels;
pub mod midi;
pub mod registry;

pub use channels::*;
pub use midi::*;
pub use registry::*;
