use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// A scratch working directory with its own config path, so tests never
/// read the user's real configuration.
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.toml")
    }

    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Run the built binary inside the scratch directory.
    pub fn run(&self, args: &[&str], envs: &[(&str, &str)]) -> Result<CommandOutput> {
        let config = self.config_path();
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_shayari-video"));
        cmd.args(args)
            .arg("--config")
            .arg(&config)
            .arg("--no-color")
            .current_dir(self.path())
            .env_remove("PROJECT_ID")
            .env_remove("LOCATION")
            .env_remove("SHAYARI_ACCESS_TOKEN");
        for (key, value) in envs {
            cmd.env(key, value);
        }
        let output = cmd.output()?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
