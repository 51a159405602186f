//! evdev button reader.
//!
//! The four physical buttons reach userspace as key events (gpio-keys
//! overlay on the Pi). This task maps them to control events and applies
//! the configured bouncetime as a software suppression window, so a noisy
//! edge cannot double-fire an operation.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use evdev::{Device, EventSummary, KeyCode};
use tokio::sync::mpsc::Sender;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::GpioSection;
use crate::events::ControlEvent;

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

struct Keymap {
    bindings: [(KeyCode, ControlEvent); 4],
}

impl Keymap {
    fn from_config(cfg: &GpioSection) -> Result<Self> {
        Ok(Self {
            bindings: [
                (parse_key(&cfg.shuffle_key)?, ControlEvent::Shuffle),
                (parse_key(&cfg.rotate_key)?, ControlEvent::Rotate),
                (parse_key(&cfg.toggle_key)?, ControlEvent::ToggleMode),
                (parse_key(&cfg.reboot_key)?, ControlEvent::Reboot),
            ],
        })
    }

    fn lookup(&self, key: KeyCode) -> Option<(usize, ControlEvent)> {
        self.bindings
            .iter()
            .position(|(k, _)| *k == key)
            .map(|idx| (idx, self.bindings[idx].1))
    }

    fn keys(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.bindings.iter().map(|(k, _)| *k)
    }
}

fn parse_key(name: &str) -> Result<KeyCode> {
    KeyCode::from_str(name).map_err(|_| anyhow!("unknown key code: {name}"))
}

fn open_device(cfg: &GpioSection, keymap: &Keymap) -> Result<Device> {
    if let Some(path) = &cfg.device {
        return Device::open(path)
            .with_context(|| format!("opening input device {}", path.display()));
    }
    // Auto-detect: first device that exposes every mapped key.
    for (path, device) in evdev::enumerate() {
        let supports_all = device
            .supported_keys()
            .is_some_and(|keys| keymap.keys().all(|k| keys.contains(k)));
        if supports_all {
            info!(path = %path.display(), "detected button input device");
            return Ok(device);
        }
    }
    Err(anyhow!("no input device exposes the configured button keys"))
}

/// Read button presses until cancelled, re-opening the device with backoff
/// when it disappears (USB re-enumeration, boot-order races).
pub async fn run(
    cfg: GpioSection,
    tx: Sender<ControlEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let keymap = match Keymap::from_config(&cfg) {
        Ok(keymap) => keymap,
        Err(err) => {
            // A typo'd binding must not silently disable all four buttons.
            error!(error = %err, "buttons disabled: invalid key binding");
            return Err(err);
        }
    };
    let mut retry = INITIAL_RETRY_DELAY;

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let device = match open_device(&cfg, &keymap) {
            Ok(device) => {
                retry = INITIAL_RETRY_DELAY;
                device
            }
            Err(err) => {
                warn!(error = %err, delay = ?retry, "button device unavailable, retrying");
                tokio::select! {
                    () = cancel.cancelled() => return Ok(()),
                    () = sleep(retry) => {}
                }
                retry = (retry * 2).min(MAX_RETRY_DELAY);
                continue;
            }
        };
        read_events(device, &keymap, cfg.bouncetime, &tx, &cancel).await;
        if cancel.is_cancelled() || tx.is_closed() {
            return Ok(());
        }
    }
}

async fn read_events(
    device: Device,
    keymap: &Keymap,
    bouncetime: Duration,
    tx: &Sender<ControlEvent>,
    cancel: &CancellationToken,
) {
    let mut stream = match device.into_event_stream() {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "failed to create input event stream");
            return;
        }
    };
    let mut last_accepted: [Option<Instant>; 4] = [None; 4];

    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            event = stream.next_event() => {
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(error = %err, "input stream error, reopening device");
                        return;
                    }
                };
                if let EventSummary::Key(_, key, 1) = event.destructure() {
                    let Some((idx, control)) = keymap.lookup(key) else {
                        continue;
                    };
                    let now = Instant::now();
                    if last_accepted[idx].is_some_and(|t| now.duration_since(t) < bouncetime) {
                        continue;
                    }
                    last_accepted[idx] = Some(now);
                    info!(?control, "button pressed");
                    if tx.send(control).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
