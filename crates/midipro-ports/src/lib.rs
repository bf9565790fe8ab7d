pub mod audio;
pub mod backend;
pub mod storage;
pub mod types;
pub mod volume;

pub use audio::*;
pub use backend::*;
pub use storage::*;
pub use types::*;
pub use volume::*;
