use crate::error::ScriptError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where the interpreter reads scripts from when it executes `LOAD` or restores.
pub trait ScriptSource {
    /// Return the raw text of the script called `name`.
    fn read_script(&self, name: &str) -> Result<String, ScriptError>;
}

/// Scripts stored as files under a root directory.
///
/// Names may contain subfolders (`chapter1/intro`); the extension is appended
/// when the name has none.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
    extension: String,
}

impl DirSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extension: "csv".into(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a script name to its file path.
    pub fn path_for(&self, name: &str) -> PathBuf {
        let path = self.root.join(name);
        if path.extension().is_some() {
            path
        } else {
            path.with_extension(&self.extension)
        }
    }
}

impl ScriptSource for DirSource {
    fn read_script(&self, name: &str) -> Result<String, ScriptError> {
        let path = self.path_for(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ScriptError::ScriptNotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Scripts held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    scripts: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.scripts.insert(name.into(), text.into());
    }
}

impl ScriptSource for MemorySource {
    fn read_script(&self, name: &str) -> Result<String, ScriptError> {
        self.scripts
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::ScriptNotFound(name.to_string()))
    }
}
