pub mod dispatch;
pub mod ipc;
pub mod output_gain;

pub use dispatch::*;
pub use ipc::*;
pub use output_gain::*;
