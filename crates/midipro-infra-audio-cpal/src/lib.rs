use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig, SupportedStreamConfigRange};
use midipro_ports::audio::{AudioError, AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use midipro_ports::types::AudioConfig;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error};

/// Output on the default device of the default cpal host.
///
/// Streams are not `Send` on every platform, so each one lives on its own
/// thread until its handle is closed.
#[derive(Default)]
pub struct CpalAudioOutputPort;

struct SelectedStreamConfig {
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl CpalAudioOutputPort {
    pub fn new() -> Self {
        Self
    }

    fn select_stream_config(
        device: &cpal::Device,
        desired: AudioConfig,
    ) -> Result<SelectedStreamConfig, AudioError> {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        let chosen = select_supported_config(&mut supported, desired)?;

        let sample_format = chosen.sample_format();
        let mut config = chosen.config();

        config.buffer_size = match desired.buffer_size_frames {
            Some(frames) => BufferSize::Fixed(frames),
            None => BufferSize::Default,
        };

        Ok(SelectedStreamConfig {
            config,
            sample_format,
        })
    }
}

pub struct CpalAudioStreamHandle {
    stop_tx: mpsc::Sender<()>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl AudioStreamHandle for CpalAudioStreamHandle {
    fn close(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Scratch buffers and sample clock owned by one stream callback.
struct StreamRenderer {
    cb: Arc<dyn AudioRenderCallback>,
    channels: usize,
    left: Vec<f32>,
    right: Vec<f32>,
    sample_time: u64,
}

impl StreamRenderer {
    fn new(cb: Arc<dyn AudioRenderCallback>, channels: usize, initial_frames: usize) -> Self {
        Self {
            cb,
            channels,
            left: vec![0.0; initial_frames],
            right: vec![0.0; initial_frames],
            sample_time: 0,
        }
    }

    fn fill<T>(&mut self, data: &mut [T], convert: impl Fn(f32) -> T, silence: T)
    where
        T: Copy,
    {
        let channels = self.channels;
        if channels == 0 {
            return;
        }
        let frames = data.len() / channels;
        if frames > self.left.len() {
            self.left.resize(frames, 0.0);
            self.right.resize(frames, 0.0);
        }
        self.cb.render(
            self.sample_time,
            &mut self.left[..frames],
            &mut self.right[..frames],
        );

        for frame in 0..frames {
            let base = frame * channels;
            let l = self.left[frame];
            let r = self.right[frame];
            if channels == 1 {
                data[base] = convert((l + r) * 0.5);
                continue;
            }
            data[base] = convert(l);
            data[base + 1] = convert(r);
            for ch in 2..channels {
                data[base + ch] = silence;
            }
        }
        self.sample_time = self.sample_time.saturating_add(frames as u64);
    }
}

impl AudioOutputPort for CpalAudioOutputPort {
    fn open_output(
        &self,
        config: AudioConfig,
        cb: Arc<dyn AudioRenderCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        let desired = config;
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join_handle = thread::spawn(move || {
            let host = cpal::default_host();
            let Some(device) = host.default_output_device() else {
                let _ = ready_tx.send(Err(AudioError::NoDevice));
                return;
            };

            let stream_config = match Self::select_stream_config(&device, desired) {
                Ok(config) => config,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            let channels = stream_config.config.channels as usize;
            let initial_frames = match stream_config.config.buffer_size {
                BufferSize::Fixed(frames) => frames as usize,
                BufferSize::Default => 8192,
            };
            let mut renderer = StreamRenderer::new(cb, channels, initial_frames);

            let error_callback = |err: cpal::StreamError| {
                error!(%err, "cpal stream error");
            };

            let stream = match stream_config.sample_format {
                SampleFormat::F32 => device.build_output_stream(
                    &stream_config.config,
                    move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                        renderer.fill(data, |v| v.clamp(-1.0, 1.0), 0.0);
                    },
                    error_callback,
                    None,
                ),
                SampleFormat::I16 => device.build_output_stream(
                    &stream_config.config,
                    move |data: &mut [i16], _info: &cpal::OutputCallbackInfo| {
                        renderer.fill(data, f32_to_i16, 0);
                    },
                    error_callback,
                    None,
                ),
                SampleFormat::U16 => device.build_output_stream(
                    &stream_config.config,
                    move |data: &mut [u16], _info: &cpal::OutputCallbackInfo| {
                        renderer.fill(data, f32_to_u16, u16::MAX / 2);
                    },
                    error_callback,
                    None,
                ),
                _ => Err(cpal::BuildStreamError::StreamConfigNotSupported),
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                    return;
                }
            };

            if let Err(err) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                return;
            }

            debug!(
                sample_rate_hz = stream_config.config.sample_rate.0,
                channels, "output stream started"
            );
            let _ = ready_tx.send(Ok(()));
            let _ = stop_rx.recv();
            drop(stream);
            debug!("output stream stopped");
        });

        match ready_rx
            .recv()
            .map_err(|e| AudioError::Backend(e.to_string()))?
        {
            Ok(()) => Ok(Box::new(CpalAudioStreamHandle {
                stop_tx,
                join_handle: Some(join_handle),
            })),
            Err(err) => {
                let _ = join_handle.join();
                Err(err)
            }
        }
    }
}

fn select_supported_config(
    supported: &mut dyn Iterator<Item = SupportedStreamConfigRange>,
    desired: AudioConfig,
) -> Result<cpal::SupportedStreamConfig, AudioError> {
    let mut best: Option<cpal::SupportedStreamConfig> = None;
    let mut best_score: i32 = -1;

    for config_range in supported {
        let min = config_range.min_sample_rate().0;
        let max = config_range.max_sample_rate().0;
        if desired.sample_rate_hz < min || desired.sample_rate_hz > max {
            continue;
        }
        let Some(score) = config_score(
            config_range.channels(),
            desired.channels,
            config_range.sample_format(),
        ) else {
            continue;
        };

        if score > best_score {
            best = Some(config_range.with_sample_rate(SampleRate(desired.sample_rate_hz)));
            best_score = score;
        }
    }

    best.ok_or_else(|| {
        AudioError::UnsupportedConfig(format!(
            "no output config at {} Hz",
            desired.sample_rate_hz
        ))
    })
}

/// Ranks a device config; higher is better, `None` is unusable.
///
/// Channel fit outweighs sample format: the requested layout first, then
/// wider layouts (extra channels get silence), then mono (a fold-down).
fn config_score(channels: u16, desired_channels: u16, format: SampleFormat) -> Option<i32> {
    let fit = match channels {
        0 => return None,
        c if c == desired_channels => 2,
        c if c > desired_channels => 1,
        1 => 0,
        _ => return None,
    };
    let format = match format {
        SampleFormat::F32 => 3,
        SampleFormat::I16 => 2,
        SampleFormat::U16 => 1,
        _ => return None,
    };
    Some(fit * 4 + format)
}

fn f32_to_i16(value: f32) -> i16 {
    let v = value.clamp(-1.0, 1.0);
    (v * i16::MAX as f32) as i16
}

fn f32_to_u16(value: f32) -> u16 {
    let v = value.clamp(-1.0, 1.0);
    let scaled = (v * 0.5 + 0.5) * u16::MAX as f32;
    scaled.round().clamp(0.0, u16::MAX as f32) as u16
}
