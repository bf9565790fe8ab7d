use crate::types::Volume01;

/// Output volume that can be muted while a backend initializes.
pub trait OutputVolumePort: Send + Sync {
    fn volume(&self) -> Volume01;
    fn set_volume(&self, volume: Volume01);
}
