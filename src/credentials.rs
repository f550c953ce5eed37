use anyhow::Result;
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

const KEYRING_SERVICE: &str = "devmirror";
const ENV_PASSWORD: &str = "DEVMIRROR_PASSWORD";

/// Resolves the remote account password: OS keyring first, then the
/// `DEVMIRROR_PASSWORD` environment variable, then a private file in the
/// config directory.
pub struct CredentialStore {
    username: String,
    password_file: PathBuf,
}

impl CredentialStore {
    pub fn new(username: &str) -> Self {
        let safe_name = username.replace(['@', '.', '/', '\\', ':'], "_");
        let password_file = crate::config::Config::config_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(format!(".password_{}", safe_name));

        Self {
            username: username.to_string(),
            password_file,
        }
    }

    fn env_password() -> Option<String> {
        env::var(ENV_PASSWORD).ok().filter(|s| !s.is_empty())
    }

    fn keyring_get(&self) -> Option<String> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, &self.username).ok()?;
        entry.get_password().ok()
    }

    fn keyring_set(&self, password: &str) -> bool {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &self.username) {
            entry.set_password(password).is_ok()
        } else {
            false
        }
    }

    fn file_get(&self) -> Option<String> {
        fs::read_to_string(&self.password_file)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Write password to file fallback (with restricted permissions)
    fn file_set(&self, password: &str) -> Result<()> {
        if let Some(parent) = self.password_file.parent() {
            fs::create_dir_all(parent)?;
        }

        // Create file with restricted permissions atomically to avoid TOCTOU
        #[cfg(unix)]
        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.password_file)?;
            file.write_all(password.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.password_file, password)?;
        }

        Ok(())
    }

    pub fn get_password(&self) -> Result<String> {
        if let Some(pwd) = self.keyring_get() {
            return Ok(pwd);
        }
        if let Some(pwd) = Self::env_password() {
            return Ok(pwd);
        }
        if let Some(pwd) = self.file_get() {
            return Ok(pwd);
        }

        anyhow::bail!(
            "No password found for '{}'. Run 'devmirror set-password' or set {}.",
            self.username,
            ENV_PASSWORD
        )
    }

    pub fn set_password(&self, password: &str) -> Result<()> {
        if self.keyring_set(password) && self.keyring_get().as_deref() == Some(password) {
            return Ok(());
        }

        eprintln!("Note: Keyring unavailable, using file-based storage.");
        self.file_set(password)
    }
}
