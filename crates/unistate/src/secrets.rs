//! Secret backends for the CLI.
//!
//! Two stores ship here: environment variables and a key=value secrets
//! file. A reference path of the form `env:NAME` always goes to the
//! environment; bare paths try the file first (when configured), then
//! the environment as a fallback.

use std::collections::HashMap;
use std::path::Path;

use secrecy::SecretString;

use unistate_core::{SecretError, SecretStore};

/// Resolves `env:NAME` (or bare names) from the process environment.
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn resolve(&self, path: &str) -> Result<SecretString, SecretError> {
        let var = path.strip_prefix("env:").unwrap_or(path);
        std::env::var(var)
            .map(SecretString::from)
            .map_err(|_| SecretError::NotFound(path.to_owned()))
    }
}

/// Resolves paths from a `key=value` file, one entry per line.
/// Lines starting with `#` and blank lines are ignored.
pub struct FileSecretStore {
    entries: HashMap<String, String>,
}

impl FileSecretStore {
    pub fn load(path: &Path) -> Result<Self, SecretError> {
        let raw = std::fs::read_to_string(path).map_err(|e| SecretError::Backend {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut entries = HashMap::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                entries.insert(key.trim().to_owned(), value.trim().to_owned());
            }
        }
        Ok(Self { entries })
    }
}

impl SecretStore for FileSecretStore {
    fn resolve(&self, path: &str) -> Result<SecretString, SecretError> {
        self.entries
            .get(path)
            .map(|v| SecretString::from(v.clone()))
            .ok_or_else(|| SecretError::NotFound(path.to_owned()))
    }
}

/// Tries each store in order; the first hit wins.
pub struct ChainSecretStore {
    stores: Vec<Box<dyn SecretStore>>,
}

impl ChainSecretStore {
    /// Standard chain: secrets file (when configured) then environment.
    pub fn standard(secrets_file: Option<&Path>) -> Result<Self, SecretError> {
        let mut stores: Vec<Box<dyn SecretStore>> = Vec::new();
        if let Some(path) = secrets_file {
            stores.push(Box::new(FileSecretStore::load(path)?));
        }
        stores.push(Box::new(EnvSecretStore));
        Ok(Self { stores })
    }
}

impl SecretStore for ChainSecretStore {
    fn resolve(&self, path: &str) -> Result<SecretString, SecretError> {
        let mut last = SecretError::NotFound(path.to_owned());
        for store in &self.stores {
            match store.resolve(path) {
                Ok(value) => return Ok(value),
                Err(err) => last = err,
            }
        }
        Err(last)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    #[test]
    fn file_store_parses_key_value_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "wifi/iot = hunter22").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "radius/main=s3cret").unwrap();

        let store = FileSecretStore::load(file.path()).unwrap();
        assert_eq!(store.resolve("wifi/iot").unwrap().expose_secret(), "hunter22");
        assert_eq!(store.resolve("radius/main").unwrap().expose_secret(), "s3cret");
        assert!(store.resolve("nope").is_err());
    }

    #[test]
    fn chain_falls_through_to_env() {
        // PATH is set in any sane test environment.
        let chain = ChainSecretStore::standard(None).unwrap();
        assert!(chain.resolve("env:PATH").is_ok());
        assert!(chain.resolve("env:UNISTATE_TEST_SURELY_UNSET").is_err());
    }
}
