mod channel;

use clap::{Parser, ValueEnum};
use midipro_core::{Dispatcher, DispatcherConfig, GainedOutputPort, OutputGain, SilentOutputPort};
use midipro_infra_audio_cpal::CpalAudioOutputPort;
use midipro_infra_storage_fs::FsStorage;
use midipro_infra_synth_rustysynth::{NativeSynth, NativeSynthConfig};
use midipro_infra_synth_sampler::{SamplerConfig, SystemSampler};
use midipro_ports::audio::AudioOutputPort;
use midipro_ports::backend::{BackendKind, PlaybackBackend};
use midipro_ports::storage::{SettingsDto, StoragePort};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    version,
    about = "Soundfont MIDI player driven by JSON method calls on stdin."
)]
struct Cli {
    /// The playback backend. Overrides the saved settings.
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,
    /// The directory holding settings.json.
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// Render into a silent output instead of the default audio device.
    #[arg(long)]
    no_audio: bool,
    /// Write the effective settings back to settings.json before starting.
    #[arg(long)]
    save_settings: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    NativeSynth,
    SystemSampler,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::NativeSynth => BackendKind::NativeSynth,
            BackendArg::SystemSampler => BackendKind::SystemSampler,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // stdout carries replies, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let storage = match &cli.config_dir {
        Some(dir) => FsStorage::new(dir.clone()),
        None => FsStorage::default(),
    };
    let mut settings = storage.load_settings()?;
    if let Some(backend) = cli.backend {
        settings.backend = backend.into();
    }
    if cli.save_settings {
        storage.save_settings(&settings)?;
        info!(path = %storage.settings_path().display(), "settings saved");
    }

    let dispatcher = compose(&settings, cli.no_audio);
    info!(
        backend = %dispatcher.backend_kind(),
        audio = !cli.no_audio,
        "waiting for method calls"
    );
    channel::serve(dispatcher).await?;
    Ok(())
}

fn compose(settings: &SettingsDto, no_audio: bool) -> Dispatcher {
    let gain = Arc::new(OutputGain::new(settings.master_volume));
    let device: Arc<dyn AudioOutputPort> = if no_audio {
        Arc::new(SilentOutputPort)
    } else {
        Arc::new(CpalAudioOutputPort::new())
    };
    let output: Arc<dyn AudioOutputPort> = Arc::new(GainedOutputPort::new(device, gain.clone()));

    let backend: Arc<dyn PlaybackBackend> = match settings.backend {
        BackendKind::NativeSynth => Arc::new(NativeSynth::new(
            output,
            NativeSynthConfig {
                audio: settings.audio_config(),
                max_polyphony: settings.max_polyphony,
            },
        )),
        BackendKind::SystemSampler => Arc::new(SystemSampler::new(
            output,
            SamplerConfig {
                audio: settings.audio_config(),
                max_polyphony: settings.max_polyphony,
            },
        )),
    };

    Dispatcher::new(backend, gain, DispatcherConfig::from(settings))
}
