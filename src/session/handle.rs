use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use crate::{
    capture::{ArtifactId, CaptureArtifact},
    error::{LuminaError, Result},
    session::{
        controller::{SessionController, ShutterOutcome},
        state::{CaptureMode, SessionState},
    },
    video::FacingMode,
};

const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

enum Command {
    Shutter(oneshot::Sender<Result<ShutterOutcome>>),
    SetMode(CaptureMode, oneshot::Sender<Result<()>>),
    ActivateFilter(usize, oneshot::Sender<Result<()>>),
    CycleFilter(isize, oneshot::Sender<usize>),
    ToggleMirror(oneshot::Sender<bool>),
    SwitchFacing(oneshot::Sender<Result<FacingMode>>),
    ResizeViewport(u32, u32),
    State(oneshot::Sender<SessionState>),
    Gallery(oneshot::Sender<Vec<CaptureArtifact>>),
    RemoveCapture(ArtifactId, oneshot::Sender<bool>),
    FlashActive(oneshot::Sender<bool>),
    Finish(oneshot::Sender<Result<Vec<CaptureArtifact>>>),
}

/// Async front end to a [`SessionController`] running on its own task
///
/// The task renders one frame per `frame_interval` and applies commands
/// between frames, so a command never observes a half-drawn surface. Frames
/// and commands run on tokio's blocking pool; the task only hands the
/// controller back and forth, so it stays the controller's single owner.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Move the controller onto a tokio task and start the frame loop
    pub fn spawn(controller: SessionController, frame_interval: Duration) -> Self {
        let frame_interval = frame_interval.max(MIN_FRAME_INTERVAL);
        let (commands, receiver) = mpsc::channel(32);
        let task = tokio::spawn(run(controller, frame_interval, receiver));
        Self { commands, task }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| session_closed())?;
        response.await.map_err(|_| session_closed())
    }

    /// Press the shutter
    pub async fn shutter(&self) -> Result<ShutterOutcome> {
        self.request(Command::Shutter).await?
    }

    pub async fn set_mode(&self, mode: CaptureMode) -> Result<()> {
        self.request(|reply| Command::SetMode(mode, reply)).await?
    }

    pub async fn activate_filter(&self, index: usize) -> Result<()> {
        self.request(|reply| Command::ActivateFilter(index, reply)).await?
    }

    pub async fn cycle_filter(&self, step: isize) -> Result<usize> {
        self.request(|reply| Command::CycleFilter(step, reply)).await
    }

    pub async fn toggle_mirror(&self) -> Result<bool> {
        self.request(Command::ToggleMirror).await
    }

    pub async fn switch_facing(&self) -> Result<FacingMode> {
        self.request(Command::SwitchFacing).await?
    }

    pub async fn resize_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.commands
            .send(Command::ResizeViewport(width, height))
            .await
            .map_err(|_| session_closed())
    }

    pub async fn state(&self) -> Result<SessionState> {
        self.request(Command::State).await
    }

    /// Newest-first snapshot of the gallery
    pub async fn gallery(&self) -> Result<Vec<CaptureArtifact>> {
        self.request(Command::Gallery).await
    }

    pub async fn remove_capture(&self, id: ArtifactId) -> Result<bool> {
        self.request(|reply| Command::RemoveCapture(id, reply)).await
    }

    pub async fn flash_active(&self) -> Result<bool> {
        self.request(Command::FlashActive).await
    }

    /// Stop the frame loop and end the session, returning the gallery
    pub async fn finish(self) -> Result<Vec<CaptureArtifact>> {
        let gallery = self.request(Command::Finish).await?;
        if let Err(e) = self.task.await {
            warn!("Session task did not shut down cleanly: {}", e);
        }
        gallery
    }
}

fn session_closed() -> LuminaError {
    LuminaError::generic("session has already ended")
}

async fn run(mut controller: SessionController, frame_interval: Duration, mut commands: mpsc::Receiver<Command>) {
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some((returned, result)) = off_task(controller, |c| c.tick(Instant::now())).await else {
                    return;
                };
                controller = returned;
                if let Err(e) = result {
                    error!("Frame failed: {}", e);
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("All session handles dropped, ending session");
                    let finished = tokio::task::spawn_blocking(move || controller.finish(Instant::now())).await;
                    if !matches!(finished, Ok(Ok(_))) {
                        error!("Could not end session cleanly");
                    }
                    return;
                };
                let Some((returned, finish)) = off_task(controller, move |c| apply(c, command)).await else {
                    return;
                };
                controller = returned;
                if let Some(reply) = finish {
                    let result = tokio::task::spawn_blocking(move || controller.finish(Instant::now()))
                        .await
                        .unwrap_or_else(|e| Err(LuminaError::generic(format!("session worker failed: {}", e))));
                    let _ = reply.send(result);
                    return;
                }
            }
        }
    }
}

/// Run `work` against the controller on the blocking pool and hand it back
///
/// `None` if `work` panicked; the controller is lost with it.
async fn off_task<T, F>(mut controller: SessionController, work: F) -> Option<(SessionController, T)>
where
    F: FnOnce(&mut SessionController) -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(move || {
        let output = work(&mut controller);
        (controller, output)
    });
    match handle.await {
        Ok(pair) => Some(pair),
        Err(e) => {
            error!("Session worker failed: {}", e);
            None
        }
    }
}

/// Apply one command; a `Finish` command hands its reply back to the loop
fn apply(
    controller: &mut SessionController,
    command: Command,
) -> Option<oneshot::Sender<Result<Vec<CaptureArtifact>>>> {
    let now = Instant::now();
    // A dropped receiver just means the caller stopped waiting
    match command {
        Command::Shutter(reply) => {
            let _ = reply.send(controller.on_shutter_pressed(now));
        }
        Command::SetMode(mode, reply) => {
            let _ = reply.send(controller.set_mode(mode));
        }
        Command::ActivateFilter(index, reply) => {
            let _ = reply.send(controller.activate_filter(index));
        }
        Command::CycleFilter(step, reply) => {
            let _ = reply.send(controller.cycle_filter(step));
        }
        Command::ToggleMirror(reply) => {
            let _ = reply.send(controller.toggle_mirror());
        }
        Command::SwitchFacing(reply) => {
            let _ = reply.send(controller.switch_facing());
        }
        Command::ResizeViewport(width, height) => controller.resize_viewport(width, height),
        Command::State(reply) => {
            let _ = reply.send(controller.state());
        }
        Command::Gallery(reply) => {
            let _ = reply.send(controller.list_gallery());
        }
        Command::RemoveCapture(id, reply) => {
            let _ = reply.send(controller.remove_capture(id));
        }
        Command::FlashActive(reply) => {
            let _ = reply.send(controller.flash_active(now));
        }
        Command::Finish(reply) => return Some(reply),
    }
    None
}
