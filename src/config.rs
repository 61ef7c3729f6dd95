//! Provisioning profile configuration.
//!
//! A profile is a YAML document describing the command batches, boot-config
//! patch and startup registration for one device class. Every field is
//! defaulted, so an empty mapping (or no file at all) yields the built-in
//! robot controller profile.
//!
//! Batch commands and the server entry point may use three placeholders,
//! substituted at render time: `{pip}` (the probed package-install prefix),
//! `{home}` (the current user's home directory) and `{project}` (the
//! project directory holding the robot sources).

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use url::Url;

use crate::error::BotstrapError;
use crate::privilege::PrivilegeMethod;

const UV_INSTALLER_URL: &str = "https://astral.sh/uv/install.sh";

/// A provisioning profile.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Project directory holding the robot server sources.
    /// Defaults to the current directory at run time.
    pub project_dir: Option<Utf8PathBuf>,

    /// Privilege escalation method for system file placement, systemctl
    /// and the final reboot. `null` disables escalation entirely.
    pub privilege: Option<PrivilegeMethod>,

    /// Isolated-environment installer settings.
    pub installer: InstallerConfig,

    /// Ordered command batches. Order within a batch is significant.
    pub batches: Vec<BatchSpec>,

    /// Boot configuration patch settings.
    pub boot_config: BootConfig,

    /// Startup script and registration settings.
    pub startup: StartupConfig,
}

/// Settings for the isolated package environment tool.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Installer endpoint for the environment tool.
    pub uv_installer: Url,

    /// Virtual environment directory, relative to the home directory.
    pub venv_dir: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            uv_installer: Url::parse(UV_INSTALLER_URL).expect("default installer URL is valid"),
            venv_dir: ".venv".to_string(),
        }
    }
}

/// An ordered batch of opaque shell commands.
///
/// Commands are safe to re-run; the whole batch is retried on failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchSpec {
    /// Batch name, used in logs and the final report.
    pub name: String,
    /// Shell command lines, run in order via `/bin/sh -c`.
    pub commands: Vec<String>,
}

/// Boot configuration patch settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Pre-firmware-directory config path, preferred when authoritative.
    pub legacy_path: Utf8PathBuf,
    /// Firmware-era config path, used when the legacy file redirects to it
    /// or does not exist.
    pub current_path: Utf8PathBuf,
    /// Prefix of the line to replace.
    pub marker: String,
    /// Replacement block; may span multiple lines.
    pub replacement: String,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            legacy_path: Utf8PathBuf::from("/boot/config.txt"),
            current_path: Utf8PathBuf::from("/boot/firmware/config.txt"),
            marker: "#dtparam=i2c_arm=on".to_string(),
            replacement: "dtparam=i2c_arm=on\nstart_x=1".to_string(),
        }
    }
}

/// Startup script and registration settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Startup script file name, created in the home directory.
    pub script_name: String,
    /// systemd unit name, without the `.service` suffix.
    pub service_name: String,
    /// Server entry point invoked by the startup script. Placeholders are
    /// substituted at render time.
    pub server_entry: String,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            script_name: "startup.sh".to_string(),
            service_name: "robot-web".to_string(),
            server_entry: "{project}/server/webServer.py".to_string(),
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            project_dir: None,
            privilege: Some(PrivilegeMethod::Sudo),
            installer: InstallerConfig::default(),
            batches: builtin_batches(),
            boot_config: BootConfig::default(),
            startup: StartupConfig::default(),
        }
    }
}

/// The built-in robot controller batches: core build/runtime packages
/// first, then the access-point tooling that depends on them.
fn builtin_batches() -> Vec<BatchSpec> {
    vec![
        BatchSpec {
            name: "base packages".to_string(),
            commands: [
                "sudo apt-get update",
                "sudo apt-get purge -y wolfram-engine",
                "sudo apt-get purge -y libreoffice*",
                "sudo apt-get -y clean",
                "sudo apt-get -y autoremove",
                "sudo apt-get install -y python3-dev python3-pip libfreetype6-dev libjpeg-dev build-essential",
                "sudo apt-get install -y i2c-tools",
                "{pip} --upgrade luma.oled",
                "{pip} rpi_ws281x",
                "sudo apt-get install -y python3-smbus",
                "{pip} mpu6050-raspberrypi",
                "{pip} flask",
                "{pip} flask_cors",
                "{pip} websockets",
                "sudo apt-get install -y libjasper-dev",
                "sudo apt-get install -y libatlas-base-dev",
                "sudo apt-get install -y libgstreamer1.0-0",
                "{pip} adafruit-circuitpython-motor",
                "{pip} adafruit-circuitpython-pca9685",
            ]
            .map(str::to_string)
            .to_vec(),
        },
        BatchSpec {
            name: "network tools".to_string(),
            commands: [
                "{pip} RPi.GPIO",
                "sudo apt-get -y install libqtgui4 libhdf5-dev libhdf5-serial-dev libatlas-base-dev libjasper-dev libqt4-test",
                "sudo git clone https://github.com/oblique/create_ap {home}/create_ap",
                "cd {home}/create_ap && sudo make install",
                "sudo apt-get install -y util-linux procps hostapd iproute2 iw haveged dnsmasq",
            ]
            .map(str::to_string)
            .to_vec(),
        },
    ]
}

impl Profile {
    /// Validates the profile's constraints.
    pub fn validate(&self) -> Result<(), BotstrapError> {
        for (index, batch) in self.batches.iter().enumerate() {
            if batch.name.trim().is_empty() {
                return Err(BotstrapError::Validation(format!(
                    "batch {} name must not be empty",
                    index + 1
                )));
            }
            if batch.commands.is_empty() {
                return Err(BotstrapError::Validation(format!(
                    "batch '{}' must contain at least one command",
                    batch.name
                )));
            }
            if batch.commands.iter().any(|c| c.trim().is_empty()) {
                return Err(BotstrapError::Validation(format!(
                    "batch '{}' contains an empty command",
                    batch.name
                )));
            }
        }

        if self.boot_config.marker.trim().is_empty() {
            return Err(BotstrapError::Validation(
                "boot config marker must not be empty".to_string(),
            ));
        }
        if self.boot_config.replacement.trim().is_empty() {
            return Err(BotstrapError::Validation(
                "boot config replacement must not be empty".to_string(),
            ));
        }

        let service = &self.startup.service_name;
        if service.trim().is_empty() {
            return Err(BotstrapError::Validation(
                "service name must not be empty".to_string(),
            ));
        }
        if service.contains('/') || service.contains(char::is_whitespace) {
            return Err(BotstrapError::Validation(format!(
                "service name must not contain '/' or whitespace: {}",
                service
            )));
        }
        let script = &self.startup.script_name;
        if script.trim().is_empty() || script.contains('/') {
            return Err(BotstrapError::Validation(format!(
                "startup script name must be a bare file name: {}",
                script
            )));
        }
        if self.startup.server_entry.trim().is_empty() {
            return Err(BotstrapError::Validation(
                "server entry point must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Loads a profile from a YAML file.
pub fn load_profile(path: &Utf8Path) -> Result<Profile> {
    let file = File::open(path).with_context(|| format!("failed to load file: {}", path))?;
    let reader = BufReader::new(file);
    let profile: Profile = serde_yaml::from_reader(reader)
        .map_err(|e| BotstrapError::Config(format!("failed to parse yaml: {}: {}", path, e)))?;
    Ok(profile)
}
