//! Named template content.
//!
//! Analysis only ever sees templates through [`TemplateStore`], so the same
//! code runs against a directory tree or an in-memory map.

use std::collections::BTreeMap;
use std::fs;
use std::io;

use camino::Utf8Component;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use rustc_hash::FxHashSet;
use walkdir::WalkDir;

/// Read access to templates by name.
///
/// `read` reports a missing template with [`io::ErrorKind::NotFound`]; content
/// is returned as raw bytes so that decoding failures stay distinguishable.
pub trait TemplateStore: Send + Sync {
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;

    fn exists(&self, name: &str) -> bool;
}

impl<T: TemplateStore + ?Sized> TemplateStore for &T {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        (**self).read(name)
    }

    fn exists(&self, name: &str) -> bool {
        (**self).exists(name)
    }
}

fn not_found(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("template {name} does not exist"))
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    templates: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.templates.insert(name.into(), content.into());
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.templates.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

impl TemplateStore for MemoryStore {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }

    fn exists(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}

/// Templates on disk, searched across directories in order like Django's
/// filesystem loader.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    dirs: Vec<Utf8PathBuf>,
}

impl DirectoryStore {
    #[must_use]
    pub fn new(dirs: Vec<Utf8PathBuf>) -> Self {
        Self { dirs }
    }

    #[must_use]
    pub fn dirs(&self) -> &[Utf8PathBuf] {
        &self.dirs
    }

    /// The file backing `name`, if any directory has one.
    ///
    /// Names must be relative and may not climb out of a directory.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Utf8PathBuf> {
        let relative = Utf8Path::new(name);
        if name.is_empty()
            || !relative
                .components()
                .all(|component| matches!(component, Utf8Component::Normal(_)))
        {
            return None;
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(relative))
            .find(|path| path.is_file())
    }

    /// The template name of a file under one of the directories.
    #[must_use]
    pub fn name_of(&self, path: &Utf8Path) -> Option<String> {
        self.dirs.iter().find_map(|dir| {
            let relative = path.strip_prefix(dir).ok()?;
            let parts: Vec<&str> = relative.components().map(|c| c.as_str()).collect();
            (!parts.is_empty()).then(|| parts.join("/"))
        })
    }

    /// Every template name with one of `extensions`, first directory winning
    /// on duplicates, sorted.
    #[must_use]
    pub fn templates(&self, extensions: &[String]) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut names = Vec::new();

        for dir in &self.dirs {
            for entry in WalkDir::new(dir).follow_links(true) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        tracing::warn!(dir = %dir, error = %err, "skipping unreadable entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some(path) = Utf8Path::from_path(entry.path()) else {
                    tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 path");
                    continue;
                };
                if !has_extension(path, extensions) {
                    continue;
                }
                if let Some(name) = self.name_of(path) {
                    if seen.insert(name.clone()) {
                        names.push(name);
                    }
                }
            }
        }

        names.sort();
        names
    }
}

#[must_use]
pub fn has_extension(path: &Utf8Path, extensions: &[String]) -> bool {
    path.extension()
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed == ext))
}

impl TemplateStore for DirectoryStore {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        match self.resolve(name) {
            Some(path) => fs::read(path),
            None => Err(not_found(name)),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}
