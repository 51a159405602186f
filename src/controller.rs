//! The display-state controller.
//!
//! Owns the active image, the persisted configuration, and the render
//! pipeline. Every button or timer trigger lands here as one atomic
//! operation; the event loop in [`run`] guarantees mutual exclusion by
//! being the only consumer.

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Configuration, DisplayMode};
use crate::display::DisplayDevice;
use crate::error::Error;
use crate::events::ControlEvent;
use crate::imagery::{self, BuiltinImage, ImageAsset};
use crate::scan;
use crate::scheduler::Scheduler;

/// Anchor for the error-message overlay.
const TEXT_ANCHOR: (u32, u32) = (28, 36);

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Nothing displayed yet.
    Idle,
    /// An active image is on the panel.
    Displaying,
    /// The error screen is on the panel; any successful operation recovers.
    ShowingError,
}

pub struct DisplayController {
    config: Configuration,
    config_path: PathBuf,
    display: Box<dyn DisplayDevice>,
    scheduler: Scheduler,
    active_image: Option<ImageAsset>,
    state: ControllerState,
    rng: StdRng,
}

impl DisplayController {
    #[must_use]
    pub fn new(
        config: Configuration,
        config_path: PathBuf,
        display: Box<dyn DisplayDevice>,
        scheduler: Scheduler,
    ) -> Self {
        let rng = match config.startup_shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            config_path,
            display,
            scheduler,
            active_image: None,
            state: ControllerState::Idle,
            rng,
        }
    }

    /// Bring the first image up, replaying the persisted rotation and mode.
    pub fn start(&mut self) -> Result<(), Error> {
        info!("starting controller");
        self.shuffle()
    }

    /// Dispatch one trigger to the matching operation.
    pub fn handle(&mut self, event: ControlEvent) -> Result<(), Error> {
        match event {
            ControlEvent::Shuffle => self.shuffle(),
            ControlEvent::Rotate => self.rotate_active(),
            ControlEvent::ToggleMode => self.toggle_mode(),
            ControlEvent::Reboot => {
                self.reboot();
                Ok(())
            }
        }
    }

    /// Select a new random image from the library and display it.
    ///
    /// A missing or empty image directory falls back to the built-in
    /// missing-images screen and leaves the auto-shuffle deadline un-armed;
    /// there is nothing to rotate through. Undecodable files are skipped
    /// until the candidates run out. Re-running this back to back is always
    /// safe, so a duplicate trigger inside the debounce window is harmless.
    pub fn shuffle(&mut self) -> Result<(), Error> {
        info!("shuffling display image");
        let mut candidates = match scan::list_candidates(&self.config.paths.image_directory) {
            Ok(paths) => paths,
            Err(Error::DirectoryNotFound(dir)) => {
                warn!(directory = %dir.display(), "image directory missing, falling back");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        if candidates.is_empty() {
            info!("no images found, displaying built-in fallback");
            self.scheduler.cancel();
            let asset = match imagery::load_builtin(
                &self.config.paths.builtin_image_directory,
                BuiltinImage::MissingImages,
            ) {
                Ok(asset) => asset,
                Err(err) => {
                    self.show_error(&err);
                    return Err(err);
                }
            };
            return self.show(asset, None);
        }

        let asset = match self.load_random(&mut candidates) {
            Ok(asset) => asset,
            Err(err) => {
                self.show_error(&err);
                return Err(err);
            }
        };
        let rotation = i64::from(self.config.rotation());
        let asset = if rotation == 0 {
            asset
        } else {
            imagery::rotate(asset, rotation)
        };
        self.show(asset, None)?;
        self.scheduler.arm(self.config.display.shuffle_interval);
        Ok(())
    }

    /// Uniformly pick candidates until one decodes, dropping the ones that
    /// do not. The last decode error surfaces only when nothing is left.
    fn load_random(&mut self, candidates: &mut Vec<PathBuf>) -> Result<ImageAsset, Error> {
        loop {
            let idx = self.rng.random_range(0..candidates.len());
            let path = candidates.swap_remove(idx);
            match imagery::load(&path) {
                Ok(asset) => return Ok(asset),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping undecodable file");
                    if candidates.is_empty() {
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Rotate the active image clockwise by 90 degrees, persist the new
    /// angle, and re-render.
    ///
    /// # Errors
    /// [`Error::NoActiveImage`] when nothing is displayed yet.
    pub fn rotate_active(&mut self) -> Result<(), Error> {
        if self.active_image.is_none() {
            return Err(Error::NoActiveImage);
        }
        let previous = self.config.rotation();
        self.config.set_rotation(i64::from(previous) + 90)?;
        if let Err(err) = self.config.save(&self.config_path) {
            // Keep memory in step with disk; the panel still shows the
            // unrotated frame, so the asset must survive for a retry.
            self.config.set_rotation(i64::from(previous))?;
            return Err(err);
        }
        info!(rotation = self.config.rotation(), "rotation persisted");
        let asset = self.active_image.take().ok_or(Error::NoActiveImage)?;
        self.show(imagery::rotate(asset, 90), None)
    }

    /// Flip fit/fill, persist the new mode, and re-render the active image.
    ///
    /// A stored mode that is neither `fit` nor `fill` is fatal; the error
    /// screen is rendered and the error re-raised for the process to decide.
    pub fn toggle_mode(&mut self) -> Result<(), Error> {
        let mode = match self.config.mode() {
            Ok(mode) => mode,
            Err(err) => {
                self.show_error(&err);
                return Err(err);
            }
        };
        self.config.set_mode(mode.toggled());
        if let Err(err) = self.config.save(&self.config_path) {
            self.config.set_mode(mode);
            return Err(err);
        }
        info!(mode = %mode.toggled(), "display mode persisted");
        match self.active_image.take() {
            Some(asset) => self.show(asset, None),
            None => Ok(()),
        }
    }

    /// Central rendering path: optional text overlay, fit/fill transform,
    /// hand the frame to the panel, then adopt the asset as active.
    ///
    /// A transform failure routes to [`Self::show_error`] before the error
    /// is returned.
    pub fn show(&mut self, asset: ImageAsset, text: Option<&str>) -> Result<(), Error> {
        match self.render(asset, text) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.show_error(&err);
                Err(err)
            }
        }
    }

    fn render(&mut self, asset: ImageAsset, text: Option<&str>) -> Result<(), Error> {
        let composed = match text {
            Some(text) => imagery::overlay_text(asset, text, TEXT_ANCHOR),
            None => asset,
        };
        let mode = self
            .config
            .mode()
            .map_err(|err| Error::Render(err.to_string()))?;
        let target = self.display.resolution();
        let frame = match mode {
            DisplayMode::Fit => imagery::fit(&composed, target),
            DisplayMode::Fill => imagery::fill(&composed, target),
        };
        self.display.set_frame(frame.image);
        self.display
            .present()
            .map_err(|err| Error::Render(err.to_string()))?;
        self.active_image = Some(composed);
        self.state = ControllerState::Displaying;
        Ok(())
    }

    /// Render the built-in error screen with the error message embedded.
    ///
    /// This path never fails and never calls back into itself: when even
    /// the error asset cannot be loaded it falls back to a blank frame.
    pub fn show_error(&mut self, err: &Error) {
        error!(error = %err, "displaying error screen");
        let target = self.display.resolution();
        let asset = match imagery::load_builtin(
            &self.config.paths.builtin_image_directory,
            BuiltinImage::ErrorScreen,
        ) {
            Ok(asset) => imagery::overlay_text(asset, &err.to_string(), TEXT_ANCHOR),
            Err(load_err) => {
                warn!(error = %load_err, "error screen asset unavailable, using blank frame");
                imagery::blank(target)
            }
        };
        // Letterbox without consulting the possibly-invalid stored mode.
        let frame = imagery::fit(&asset, target);
        self.display.set_frame(frame.image);
        if let Err(present_err) = self.display.present() {
            error!(error = %present_err, "failed to present error screen");
        }
        self.active_image = None;
        self.state = ControllerState::ShowingError;
    }

    /// Ask the host to reboot. Fire and forget; the process may never see
    /// the other side of this.
    pub fn reboot(&self) {
        info!("reboot requested");
        if let Err(err) = tokio::process::Command::new("sudo").arg("reboot").spawn() {
            error!(error = %err, "failed to invoke reboot");
        }
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    #[must_use]
    pub fn active_image(&self) -> Option<&ImageAsset> {
        self.active_image.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Whether an auto-shuffle deadline is pending.
    #[must_use]
    pub fn timer_armed(&self) -> bool {
        self.scheduler.is_armed()
    }
}

/// Single-consumer event loop: runs one controller operation at a time.
///
/// Triggers arriving while an operation is in flight queue up in the
/// channel rather than interleaving. Recoverable failures are logged and
/// the loop keeps going; fatal configuration errors propagate after the
/// error screen has been rendered.
pub async fn run(
    mut controller: DisplayController,
    mut rx: Receiver<ControlEvent>,
    cancel: CancellationToken,
) -> Result<(), Error> {
    if let Err(err) = controller.start() {
        if err.is_fatal() {
            return Err(err);
        }
        warn!(error = %err, "initial shuffle failed");
    }

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                if let Err(err) = controller.handle(event) {
                    if err.is_fatal() {
                        return Err(err);
                    }
                    warn!(error = %err, ?event, "operation failed");
                }
            }
        }
    }
    Ok(())
}
