use crate::ipc::{MethodCall, MethodError, Reply, Request};
use midipro_ports::backend::{BackendError, BackendKind, PlaybackBackend};
use midipro_ports::storage::SettingsDto;
use midipro_ports::types::{SettingValue, Volume01};
use midipro_ports::volume::OutputVolumePort;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// How long output stays muted after a soundfont load returns.
    pub load_settle: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            load_settle: Duration::from_millis(500),
        }
    }
}

impl From<&SettingsDto> for DispatcherConfig {
    fn from(settings: &SettingsDto) -> Self {
        Self {
            load_settle: Duration::from_millis(settings.load_settle_ms),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Uninitialized,
    Ready,
    Disposed,
}

/// Entry point for method calls: validates them and runs each one on its
/// own task against the backend.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn PlaybackBackend>,
    volume: Arc<dyn OutputVolumePort>,
    config: DispatcherConfig,
    loading: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

/// Accepted call waiting to run.
struct Job {
    request: Request,
    _load_slot: Option<LoadSlot>,
}

/// Held by the one load allowed in flight.
struct LoadSlot {
    inner: Arc<Inner>,
}

impl LoadSlot {
    fn acquire(inner: &Arc<Inner>) -> Result<Self, MethodError> {
        inner
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MethodError::load_in_progress())?;
        Ok(Self {
            inner: inner.clone(),
        })
    }
}

impl Drop for LoadSlot {
    fn drop(&mut self) {
        self.inner.loading.store(false, Ordering::Release);
    }
}

/// Mutes the output until dropped, then restores the previous volume.
struct MuteGuard {
    volume: Arc<dyn OutputVolumePort>,
    previous: Volume01,
}

impl MuteGuard {
    fn engage(volume: Arc<dyn OutputVolumePort>) -> Self {
        let previous = volume.volume();
        volume.set_volume(Volume01::MUTED);
        Self { volume, previous }
    }
}

impl Drop for MuteGuard {
    fn drop(&mut self) {
        self.volume.set_volume(self.previous);
    }
}

/// Result of a submitted call. Dropping it does not cancel the call.
pub struct PendingReply {
    state: PendingState,
    kind: BackendKind,
}

enum PendingState {
    Done(Option<Result<Reply, MethodError>>),
    Running(JoinHandle<Result<Reply, MethodError>>),
}

impl Future for PendingReply {
    type Output = Result<Reply, MethodError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let kind = self.kind;
        match &mut self.state {
            PendingState::Done(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(MethodError::task_failed(kind, "reply", "already taken"))
            })),
            PendingState::Running(handle) => Pin::new(handle).poll(cx).map(|joined| {
                joined.unwrap_or_else(|err| Err(MethodError::task_failed(kind, "call", err)))
            }),
        }
    }
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn PlaybackBackend>,
        volume: Arc<dyn OutputVolumePort>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                volume,
                config,
                loading: AtomicBool::new(false),
                lifecycle: Mutex::new(Lifecycle::Uninitialized),
            }),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.inner.lifecycle.lock()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.inner.backend.kind()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::Acquire)
    }

    /// Validates `call` and spawns it. Must be called from within a tokio
    /// runtime. Rejections (bad arguments, a load already in flight, a
    /// disposed player) are decided here, before anything is spawned.
    pub fn submit(&self, call: MethodCall) -> PendingReply {
        let kind = self.backend_kind();
        let state = match self.accept(&call) {
            Ok(job) => {
                let inner = self.inner.clone();
                PendingState::Running(tokio::spawn(inner.run(job)))
            }
            Err(err) => {
                warn!(method = %call.method, %err, "call rejected");
                PendingState::Done(Some(Err(err)))
            }
        };
        PendingReply { state, kind }
    }

    pub async fn call(&self, call: MethodCall) -> Result<Reply, MethodError> {
        self.submit(call).await
    }

    fn accept(&self, call: &MethodCall) -> Result<Job, MethodError> {
        let request = Request::parse(call)?;
        if self.lifecycle() == Lifecycle::Disposed {
            return Err(MethodError::disposed());
        }
        let load_slot = if matches!(request, Request::LoadSoundfont { .. }) {
            Some(LoadSlot::acquire(&self.inner)?)
        } else {
            None
        };
        Ok(Job {
            request,
            _load_slot: load_slot,
        })
    }
}

impl Inner {
    async fn run(self: Arc<Self>, job: Job) -> Result<Reply, MethodError> {
        let Job {
            request,
            _load_slot,
        } = job;
        debug!(method = request.method_name(), "dispatching");

        match request {
            Request::LoadSoundfont {
                path,
                bank,
                program,
            } => self.load_soundfont(path, bank, program).await,
            Request::SelectInstrument {
                sf_id,
                channel,
                bank,
                program,
            } => self
                .blocking("Failed to select instrument", move |backend| {
                    backend.select_instrument(sf_id, channel, bank, program)
                })
                .await
                .map(Reply::Int),
            Request::PlayNote {
                channel,
                key,
                velocity,
                sf_id,
            } => self
                .blocking("Failed to play note", move |backend| {
                    backend.play_note(channel, key, velocity, sf_id)
                })
                .await
                .map(Reply::Int),
            Request::StopNote {
                channel,
                key,
                sf_id,
            } => self
                .blocking("Failed to stop note", move |backend| {
                    backend.stop_note(channel, key, sf_id)
                })
                .await
                .map(Reply::Int),
            Request::UnloadSoundfont { sf_id } => self
                .blocking("Failed to unload soundfont", move |backend| {
                    backend.unload_soundfont(sf_id)
                })
                .await
                .map(Reply::Int),
            Request::SetSetting {
                sf_id,
                name,
                value,
            } => {
                let context = match value {
                    SettingValue::Str(_) => "Failed to set string value",
                    SettingValue::Int(_) => "Failed to set int value",
                    SettingValue::Num(_) => "Failed to set num value",
                };
                self.blocking(context, move |backend| {
                    backend.set_setting(sf_id, &name, value)
                })
                .await
                .map(Reply::Int)
            }
            Request::GetInt { sf_id, name } => self
                .blocking("Failed to get int value", move |backend| {
                    backend.get_int(sf_id, &name)
                })
                .await
                .map(Reply::Int),
            Request::GetNum { sf_id, name } => self
                .blocking("Failed to get num value", move |backend| {
                    backend.get_num(sf_id, &name)
                })
                .await
                .map(Reply::Num),
            Request::StopAllNotes => self
                .blocking("Failed to stop all notes", |backend| backend.stop_all_notes())
                .await
                .map(Reply::Int),
            Request::Dispose => {
                let status = self
                    .blocking("Failed to dispose", |backend| backend.dispose())
                    .await?;
                *self.lifecycle.lock() = Lifecycle::Disposed;
                info!("player disposed");
                Ok(Reply::Int(status))
            }
        }
    }

    async fn load_soundfont(
        &self,
        path: PathBuf,
        bank: i32,
        program: i32,
    ) -> Result<Reply, MethodError> {
        let muted = MuteGuard::engage(self.volume.clone());
        let result = self
            .blocking("Failed to load soundfont", move |backend| {
                backend.load_soundfont(&path, bank, program)
            })
            .await;
        tokio::time::sleep(self.config.load_settle).await;
        drop(muted);

        let sf_id = result?;
        {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle == Lifecycle::Uninitialized {
                *lifecycle = Lifecycle::Ready;
            }
        }
        info!(%sf_id, "soundfont ready");
        Ok(Reply::Int(sf_id.get()))
    }

    /// Runs `f` on the blocking pool and converts backend failures.
    async fn blocking<T, F>(&self, context: &'static str, f: F) -> Result<T, MethodError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PlaybackBackend) -> Result<T, BackendError> + Send + 'static,
    {
        let backend = self.backend.clone();
        let kind = backend.kind();
        match tokio::task::spawn_blocking(move || f(backend.as_ref())).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(%err, context, "backend call failed");
                Err(MethodError::from_backend(kind, context, &err))
            }
            Err(err) => Err(MethodError::task_failed(kind, context, err)),
        }
    }
}
