//! Sectioned key/value configuration persisted to a single canonical file.
//!
//! Every mutating operation rewrites the whole file; there are no partial
//! updates. Durations are humantime strings (`10m`, `150ms`), so the config
//! carries its unit instead of a bare ambiguous integer.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;

/// How the active image is mapped onto the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Scale to wholly fit inside the screen, letterboxed.
    Fit,
    /// Scale and crop to exactly cover the screen.
    Fill,
}

impl DisplayMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fit => "fit",
            Self::Fill => "fill",
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Fit => Self::Fill,
            Self::Fill => Self::Fit,
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fit" => Ok(Self::Fit),
            "fill" => Ok(Self::Fill),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathsSection {
    /// Root directory scanned recursively for photos.
    pub image_directory: PathBuf,
    /// Directory holding the built-in fallback screens.
    pub builtin_image_directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DisplaySection {
    /// `fit` or `fill`. Kept as text so a corrupt value is reported
    /// verbatim instead of being guessed at.
    pub mode: String,
    /// Clockwise rotation applied to the active image, in degrees.
    pub rotation: u32,
    /// Delay before the next automatic shuffle.
    #[serde(with = "humantime_serde")]
    pub shuffle_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GpioSection {
    /// Debounce hint passed through to the button reader, not interpreted here.
    #[serde(with = "humantime_serde")]
    pub bouncetime: Duration,
    /// evdev input device path; auto-detected when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<PathBuf>,
    /// Key code bound to shuffle (top button).
    #[serde(default = "GpioSection::default_shuffle_key")]
    pub shuffle_key: String,
    /// Key code bound to rotate.
    #[serde(default = "GpioSection::default_rotate_key")]
    pub rotate_key: String,
    /// Key code bound to the fit/fill toggle.
    #[serde(default = "GpioSection::default_toggle_key")]
    pub toggle_key: String,
    /// Key code bound to reboot (bottom button).
    #[serde(default = "GpioSection::default_reboot_key")]
    pub reboot_key: String,
}

impl GpioSection {
    fn default_shuffle_key() -> String {
        "KEY_A".to_string()
    }

    fn default_rotate_key() -> String {
        "KEY_B".to_string()
    }

    fn default_toggle_key() -> String {
        "KEY_C".to_string()
    }

    fn default_reboot_key() -> String {
        "KEY_D".to_string()
    }
}

/// The full configuration. Required keys have no serde defaults on purpose:
/// a file missing one fails to load with an error naming the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    pub paths: PathsSection,
    pub display: DisplaySection,
    pub gpio: GpioSection,
    /// Optional deterministic seed for shuffle selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_shuffle_seed: Option<u64>,
}

impl Configuration {
    /// Load and validate the configuration file at `path`.
    ///
    /// # Errors
    /// [`Error::ConfigNotFound`] when the file is absent,
    /// [`Error::ConfigEmpty`] when it parses to zero entries, a serde error
    /// naming the key for each missing required key, and
    /// [`Error::InvalidMode`] / [`Error::InvalidRotation`] for values that
    /// parse but are out of contract.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&raw)?;
        let empty = match &value {
            serde_yaml::Value::Null => true,
            serde_yaml::Value::Mapping(m) => m.is_empty(),
            _ => false,
        };
        if empty {
            return Err(Error::ConfigEmpty(path.to_path_buf()));
        }
        let cfg: Self = serde_yaml::from_value(value)?;
        let cfg = cfg.validated()?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(cfg)
    }

    /// Validate invariants that cannot be expressed via serde alone.
    fn validated(self) -> Result<Self, Error> {
        self.mode()?;
        if self.display.rotation % 90 != 0 || self.display.rotation >= 360 {
            return Err(Error::InvalidRotation(i64::from(self.display.rotation)));
        }
        Ok(self)
    }

    /// Rewrite the whole file. Writes a sibling temp file first and renames
    /// it into place so a crash mid-write cannot truncate the config.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let body = serde_yaml::to_string(self)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        let tmp = path.with_file_name(format!(".{file_name}.tmp"));
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "configuration persisted");
        Ok(())
    }

    /// Parse the stored display mode.
    pub fn mode(&self) -> Result<DisplayMode, Error> {
        self.display.mode.parse()
    }

    pub fn set_mode(&mut self, mode: DisplayMode) {
        self.display.mode = mode.as_str().to_string();
    }

    #[must_use]
    pub fn rotation(&self) -> u32 {
        self.display.rotation
    }

    /// Store a rotation angle, normalized into `0..360`.
    ///
    /// # Errors
    /// [`Error::InvalidRotation`] when the normalized angle is not a
    /// multiple of 90. The controller only ever produces multiples of 90;
    /// this guards against everything else.
    pub fn set_rotation(&mut self, angle: i64) -> Result<(), Error> {
        let normalized = angle.rem_euclid(360);
        if normalized % 90 != 0 {
            return Err(Error::InvalidRotation(angle));
        }
        self.display.rotation = normalized as u32;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Configuration {
        Configuration {
            paths: PathsSection {
                image_directory: PathBuf::from("/photos"),
                builtin_image_directory: PathBuf::from("/builtin"),
            },
            display: DisplaySection {
                mode: "fit".to_string(),
                rotation: 0,
                shuffle_interval: Duration::from_secs(600),
            },
            gpio: GpioSection {
                bouncetime: Duration::from_millis(150),
                device: None,
                shuffle_key: GpioSection::default_shuffle_key(),
                rotate_key: GpioSection::default_rotate_key(),
                toggle_key: GpioSection::default_toggle_key(),
                reboot_key: GpioSection::default_reboot_key(),
            },
            startup_shuffle_seed: None,
        }
    }

    #[test]
    fn rotation_normalizes_modulo_360() {
        let mut cfg = sample();
        cfg.set_rotation(450).unwrap();
        assert_eq!(cfg.rotation(), 90);
        cfg.set_rotation(-90).unwrap();
        assert_eq!(cfg.rotation(), 270);
        cfg.set_rotation(360).unwrap();
        assert_eq!(cfg.rotation(), 0);
    }

    #[test]
    fn rotation_rejects_off_grid_angles() {
        let mut cfg = sample();
        assert!(matches!(
            cfg.set_rotation(45),
            Err(Error::InvalidRotation(45))
        ));
    }

    #[test]
    fn mode_toggle_is_an_involution() {
        assert_eq!(DisplayMode::Fit.toggled().toggled(), DisplayMode::Fit);
        assert_eq!(DisplayMode::Fill.toggled(), DisplayMode::Fit);
    }

    #[test]
    fn bogus_mode_is_reported_verbatim() {
        let mut cfg = sample();
        cfg.display.mode = "bogus".to_string();
        match cfg.mode() {
            Err(Error::InvalidMode(m)) => assert_eq!(m, "bogus"),
            other => panic!("expected InvalidMode, got {other:?}"),
        }
    }
}
