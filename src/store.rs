use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::mime::content_type_for;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Arc<[u8]>),
    File(PathBuf),
}

/// A named, servable payload with the content type it is served under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub payload: Payload,
    pub content_type: Arc<str>,
}

/// Two name tables, in-memory bytes and file paths. Writers replace a whole
/// entry under the write lock, so readers see either the old or the new
/// resource, never a mix.
#[derive(Debug, Default)]
pub struct ResourceStore {
    bytes: RwLock<FxHashMap<String, Resource>>,
    files: RwLock<FxHashMap<String, Resource>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_byte_resource(
        &self,
        name: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
        content_type: &str,
    ) {
        let resource = Resource {
            payload: Payload::Bytes(data.into()),
            content_type: Arc::from(content_type),
        };
        self.bytes.write().insert(name.into(), resource);
    }

    pub fn add_file_resource(
        &self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        content_type: &str,
    ) {
        let resource = Resource {
            payload: Payload::File(path.into()),
            content_type: Arc::from(content_type),
        };
        self.files.write().insert(name.into(), resource);
    }

    /// Byte table first, then the file table.
    pub fn lookup(&self, name: &str) -> Option<Resource> {
        if let Some(resource) = self.bytes.read().get(name) {
            return Some(resource.clone());
        }
        self.files.read().get(name).cloned()
    }

    pub fn byte_resource(&self, name: &str) -> Option<Arc<[u8]>> {
        match self.bytes.read().get(name).map(|r| &r.payload) {
            Some(Payload::Bytes(data)) => Some(Arc::clone(data)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.read().len() + self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers every regular file below `dir` as a file resource named by
    /// its `/`-separated path relative to `dir`. Stored paths are absolute, so
    /// they do not depend on the server root. Returns how many were added.
    pub fn add_directory(&self, dir: &Path) -> io::Result<usize> {
        let base = fs::canonicalize(dir)?;
        let mut found = Vec::new();
        discover_files(&base, "", &mut found)?;

        let count = found.len();
        let mut files = self.files.write();
        for (name, path) in found {
            let content_type = content_type_for(&path);
            debug!(%name, content_type, "registering file resource");
            files.insert(
                name,
                Resource {
                    payload: Payload::File(path),
                    content_type: Arc::from(content_type),
                },
            );
        }
        Ok(count)
    }
}

fn discover_files(
    base_dir: &Path,
    relative: &str,
    found: &mut Vec<(String, PathBuf)>,
) -> io::Result<()> {
    let dir = if relative.is_empty() {
        base_dir.to_path_buf()
    } else {
        base_dir.join(relative)
    };

    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let file_name = entry.file_name().to_string_lossy().to_string();

        let name = if relative.is_empty() {
            file_name
        } else {
            format!("{}/{}", relative, file_name)
        };

        if file_type.is_file() {
            found.push((name, entry.path()));
        } else if file_type.is_dir() {
            discover_files(base_dir, &name, found)?;
        }
    }

    Ok(())
}
