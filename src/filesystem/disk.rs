use std::path::{Path, PathBuf};
use std::rc::Rc;

use compio::fs;
use derive_more::{Add, AddAssign};
use futures::future::{FutureExt, LocalBoxFuture};
use hashlink::LinkedHashMap;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use super::FileWrapper;

/// Outcome of flushing a wrapper to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Add, AddAssign)]
pub struct WriteSummary {
    pub written: usize,
    pub unchanged: usize,
}

/// Version control metadata never belongs to a project.
const IGNORED_ENTRIES: [&str; 4] = [".git", ".hg", ".svn", "_darcs"];

fn is_ignored(name: &str) -> bool {
    IGNORED_ENTRIES.contains(&name)
}

/// Reads the directory tree rooted at `path`. Version control directories are
/// skipped and directory entries are ordered by name.
pub fn read_from_disk(path: &Path) -> LocalBoxFuture<'_, Result<FileWrapper, DiskError>> {
    async move {
        let metadata = path.metadata().context(MetadataSnafu { path })?;
        if !metadata.is_dir() {
            let contents = fs::read(path).await.context(ReadSnafu { path })?;
            return Ok(FileWrapper::regular(contents));
        }

        let mut names = std::fs::read_dir(path)
            .context(ReadDirectorySnafu { path })?
            .map(|entry| {
                entry
                    .map(|entry| entry.file_name().to_string_lossy().to_string())
                    .context(ReadDirectorySnafu { path })
            })
            .collect::<Result<Vec<_>, _>>()?;
        names.retain(|name| {
            let ignored = is_ignored(name);
            if ignored {
                debug!("Skipping '{}' in {}", name, path.display());
            }
            !ignored
        });
        names.sort();

        let mut entries = LinkedHashMap::new();
        for name in names {
            let child = read_from_disk(&path.join(&name)).await?;
            entries.insert(name, Rc::new(child));
        }
        Ok(FileWrapper::Directory { entries })
    }
    .boxed_local()
}

/// Writes `wrapper` to `path`. Regular files whose contents match the
/// corresponding entry of `previous` are left alone. Nothing is ever deleted.
pub fn write_to_disk<'a>(
    wrapper: &'a FileWrapper,
    path: &'a Path,
    previous: Option<&'a FileWrapper>,
) -> LocalBoxFuture<'a, Result<WriteSummary, DiskError>> {
    async move {
        match wrapper {
            FileWrapper::Regular { contents } => {
                let up_to_date = previous
                    .and_then(FileWrapper::contents)
                    .is_some_and(|previous| previous == contents.as_slice());
                if up_to_date {
                    return Ok(WriteSummary {
                        written: 0,
                        unchanged: 1,
                    });
                }
                fs::write(path, contents.clone())
                    .await
                    .0
                    .context(WriteSnafu { path })?;
                info!("Wrote {}", path.display());
                Ok(WriteSummary {
                    written: 1,
                    unchanged: 0,
                })
            }
            FileWrapper::Directory { entries } => {
                if previous.is_some_and(|previous| previous.fingerprint() == wrapper.fingerprint()) {
                    debug!("Directory {} is unchanged", path.display());
                    return Ok(WriteSummary {
                        written: 0,
                        unchanged: wrapper.file_count(),
                    });
                }
                fs::create_dir_all(path)
                    .await
                    .context(CreateDirectorySnafu { path })?;

                let mut summary = WriteSummary::default();
                for (name, entry) in entries {
                    let previous_entry = previous
                        .and_then(|previous| previous.entry(name))
                        .map(|entry| entry.as_ref());
                    summary += write_to_disk(entry, &path.join(name), previous_entry).await?;
                }
                Ok(summary)
            }
        }
    }
    .boxed_local()
}

#[derive(Debug, Snafu)]
pub enum DiskError {
    #[snafu(display("Failed to stat {}", path.display()))]
    MetadataError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to list directory {}", path.display()))]
    ReadDirectoryError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to read {}", path.display()))]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to create directory {}", path.display()))]
    CreateDirectoryError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to write {}", path.display()))]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}
