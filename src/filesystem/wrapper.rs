use std::hash::Hasher;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use hashlink::LinkedHashMap;
use metrohash::MetroHash64;
use snafu::Snafu;

/// Hierarchical, on-disk shaped container for project content.
///
/// Directory entries keep their insertion order, which is the order the
/// owning outline displays them in. Entries are shared through `Rc`, so
/// replacing a child produces a new directory that reuses every untouched
/// sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileWrapper {
    Regular {
        contents: Vec<u8>,
    },
    Directory {
        entries: LinkedHashMap<String, Rc<FileWrapper>>,
    },
}

impl FileWrapper {
    pub fn regular(contents: impl Into<Vec<u8>>) -> Self {
        FileWrapper::Regular {
            contents: contents.into(),
        }
    }

    pub fn empty_directory() -> Self {
        FileWrapper::Directory {
            entries: LinkedHashMap::new(),
        }
    }

    pub fn directory(entries: impl IntoIterator<Item = (String, Rc<FileWrapper>)>) -> Self {
        FileWrapper::Directory {
            entries: entries.into_iter().collect(),
        }
    }

    /// Builds a directory tree out of relative file paths and their contents.
    pub fn try_from_files<P: AsRef<Path>>(
        files: impl IntoIterator<Item = (P, Vec<u8>)>,
    ) -> Result<Self, FileWrapperError> {
        files
            .into_iter()
            .try_fold(Self::empty_directory(), |mut root, (path, contents)| {
                root.try_insert_path(path.as_ref(), contents)?;
                Ok(root)
            })
    }

    /// Inserts a regular file at `path`, creating intermediate directories.
    pub fn try_insert_path(&mut self, path: &Path, contents: Vec<u8>) -> Result<(), FileWrapperError> {
        let names = normal_components(path);
        let Some((file_name, directories)) = names.split_last() else {
            return EmptyPathSnafu.fail();
        };

        let mut current = self;
        for name in directories {
            current = match current {
                FileWrapper::Directory { entries } => Rc::make_mut(
                    entries
                        .entry(name.clone())
                        .or_insert_with(|| Rc::new(FileWrapper::empty_directory())),
                ),
                FileWrapper::Regular { .. } => {
                    return InsertIntoFileSnafu { path }.fail();
                }
            };
        }

        match current {
            FileWrapper::Directory { entries } => {
                entries.replace(file_name.clone(), Rc::new(FileWrapper::regular(contents)));
                Ok(())
            }
            FileWrapper::Regular { .. } => InsertIntoFileSnafu { path }.fail(),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FileWrapper::Directory { .. })
    }

    pub fn contents(&self) -> Option<&[u8]> {
        match self {
            FileWrapper::Regular { contents } => Some(contents),
            FileWrapper::Directory { .. } => None,
        }
    }

    pub fn entries(&self) -> Option<&LinkedHashMap<String, Rc<FileWrapper>>> {
        match self {
            FileWrapper::Regular { .. } => None,
            FileWrapper::Directory { entries } => Some(entries),
        }
    }

    pub fn entry(&self, name: &str) -> Option<&Rc<FileWrapper>> {
        self.entries()?.get(name)
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries()
            .into_iter()
            .flat_map(|entries| entries.keys().map(String::as_str))
    }

    /// Looks up a nested entry; `.` components are ignored.
    pub fn entry_at_path(&self, path: &Path) -> Option<&Rc<FileWrapper>> {
        let names = normal_components(path);
        let (first, rest) = names.split_first()?;
        rest.iter()
            .try_fold(self.entry(first)?, |current, name| current.entry(name))
    }

    /// Returns a copy of this directory with `name` replaced (or appended).
    /// The entry keeps its position when it already exists.
    pub fn with_entry_replaced(
        &self,
        name: impl Into<String>,
        wrapper: Rc<FileWrapper>,
    ) -> Result<Self, FileWrapperError> {
        let name = name.into();
        match self {
            FileWrapper::Directory { entries } => {
                let mut entries = entries.clone();
                entries.replace(name, wrapper);
                Ok(FileWrapper::Directory { entries })
            }
            FileWrapper::Regular { .. } => NotADirectorySnafu { name }.fail(),
        }
    }

    /// Number of regular files in this tree.
    pub fn file_count(&self) -> usize {
        match self {
            FileWrapper::Regular { .. } => 1,
            FileWrapper::Directory { entries } => {
                entries.values().map(|entry| entry.file_count()).sum()
            }
        }
    }

    /// Content hash covering names, order and file contents.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = MetroHash64::default();
        self.feed(&mut hasher);
        hasher.finish()
    }

    fn feed(&self, hasher: &mut MetroHash64) {
        match self {
            FileWrapper::Regular { contents } => {
                hasher.write_u8(0);
                hasher.write_usize(contents.len());
                hasher.write(contents);
            }
            FileWrapper::Directory { entries } => {
                hasher.write_u8(1);
                hasher.write_usize(entries.len());
                for (name, entry) in entries {
                    hasher.write_usize(name.len());
                    hasher.write(name.as_bytes());
                    entry.feed(hasher);
                }
            }
        }
    }
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().to_string()),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Snafu)]
pub enum FileWrapperError {
    #[snafu(display("Cannot insert '{}' below a regular file", path.display()))]
    InsertIntoFile { path: PathBuf },
    #[snafu(display("Cannot insert a file at an empty path"))]
    EmptyPath,
    #[snafu(display("Cannot replace entry '{}' of a regular file", name))]
    NotADirectory { name: String },
}
