use midipro_ports::audio::{AudioError, AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use midipro_ports::types::{AudioConfig, SampleTime, Volume01};
use midipro_ports::volume::OutputVolumePort;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Master volume shared by every stream opened through a [`GainedOutputPort`].
#[derive(Debug)]
pub struct OutputGain {
    bits: AtomicU32,
}

impl OutputGain {
    pub fn new(volume: Volume01) -> Self {
        Self {
            bits: AtomicU32::new(volume.get().to_bits()),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl Default for OutputGain {
    fn default() -> Self {
        Self::new(Volume01::new(1.0))
    }
}

impl OutputVolumePort for OutputGain {
    fn volume(&self) -> Volume01 {
        Volume01::new(self.get())
    }

    fn set_volume(&self, volume: Volume01) {
        self.bits.store(volume.get().to_bits(), Ordering::Relaxed);
    }
}

/// Wraps an output port so that everything rendered through it follows
/// the shared [`OutputGain`].
pub struct GainedOutputPort {
    inner: Arc<dyn AudioOutputPort>,
    gain: Arc<OutputGain>,
}

impl GainedOutputPort {
    pub fn new(inner: Arc<dyn AudioOutputPort>, gain: Arc<OutputGain>) -> Self {
        Self { inner, gain }
    }
}

impl AudioOutputPort for GainedOutputPort {
    fn open_output(
        &self,
        config: AudioConfig,
        cb: Arc<dyn AudioRenderCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        let stage = GainStage {
            inner: cb,
            gain: self.gain.clone(),
        };
        self.inner.open_output(config, Arc::new(stage))
    }
}

struct GainStage {
    inner: Arc<dyn AudioRenderCallback>,
    gain: Arc<OutputGain>,
}

impl AudioRenderCallback for GainStage {
    fn render(&self, sample_time_start: SampleTime, out_l: &mut [f32], out_r: &mut [f32]) {
        self.inner.render(sample_time_start, out_l, out_r);
        let gain = self.gain.get();
        if gain == 1.0 {
            return;
        }
        for value in out_l.iter_mut().chain(out_r.iter_mut()) {
            *value *= gain;
        }
    }
}

/// Output port that accepts streams but never plays them.
#[derive(Debug, Default)]
pub struct SilentOutputPort;

struct SilentStream;

impl AudioStreamHandle for SilentStream {
    fn close(self: Box<Self>) {}
}

impl AudioOutputPort for SilentOutputPort {
    fn open_output(
        &self,
        _config: AudioConfig,
        _cb: Arc<dyn AudioRenderCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        Ok(Box::new(SilentStream))
    }
}
