use std::path::{Path, PathBuf};
use std::rc::Rc;

use colored::Colorize;
use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::application::RuntimeConfig;
use crate::application::render::render_outline;
use crate::cli::Command;
use crate::description::{DescriptionError, ProjectDescription};
use crate::filesystem::{DiskError, SnapshotError, WriteSummary, read_from_disk, write_to_disk};
use crate::outline::{OutlineError, ProjectOutline};

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        let mut outline = Self::load(&app_config.root).await?;

        match &app_config.command {
            Command::Show => print!("{}", render_outline(&outline)),
            Command::Update { item, source } => {
                let summary = Self::update(&mut outline, &app_config.root, item, source).await?;
                println!(
                    "{} {} ({} written, {} unchanged)",
                    "✓".green(),
                    item,
                    summary.written,
                    summary.unchanged
                );
            }
            Command::Snapshot { output } => {
                let size = Self::snapshot(&mut outline, output).await?;
                println!("{} {} ({} bytes)", "✓".green(), output.display(), size);
            }
        }

        Ok(())
    }

    /// Reads the project description and the project's files and builds the
    /// outline on top of them.
    pub async fn load(root: &Path) -> Result<ProjectOutline, ApplicationError> {
        let description = ProjectDescription::read(root)
            .await
            .context(DescriptionSnafu)?;
        debug!("Loaded project description: {:?}", description);

        let document = read_from_disk(root)
            .await
            .context(ReadProjectSnafu)?;
        info!(
            "Read {} files from {}",
            document.file_count(),
            root.display()
        );

        Ok(description.build_outline(Some(Rc::new(document))))
    }

    /// Replaces the contents of the file at `item` with those of `source` and
    /// saves the project.
    pub async fn update(
        outline: &mut ProjectOutline,
        root: &Path,
        item: &str,
        source: &Path,
    ) -> Result<WriteSummary, ApplicationError> {
        let target = outline
            .find_by_relative_path(item)
            .context(UnknownItemSnafu { path: item })?;
        let contents = compio::fs::read(source).await.context(ReadSourceSnafu {
            path: source.to_path_buf(),
        })?;
        outline
            .update_item_with_data(target, contents)
            .context(OutlineSnafu)?;

        Self::save(outline, root).await
    }

    /// Persists the dirty parts of the outline below `root` and commits the
    /// result as the new document.
    pub async fn save(
        outline: &mut ProjectOutline,
        root: &Path,
    ) -> Result<WriteSummary, ApplicationError> {
        let root_item = outline.root();
        let Some(updated) = outline
            .updated_container_if_dirty(root_item)
            .context(OutlineSnafu)?
        else {
            info!("Project is up to date, nothing to save");
            return Ok(WriteSummary::default());
        };

        let previous = outline.document().cloned();
        let summary = match write_to_disk(&updated, root, previous.as_deref()).await {
            Ok(summary) => summary,
            Err(source) => {
                warn!("Saving failed, keeping unsaved changes: {}", source);
                outline.mark_dirty(root_item);
                return Err(ApplicationError::WriteProjectError { source });
            }
        };
        info!(
            "Saved project: {} files written, {} unchanged",
            summary.written, summary.unchanged
        );
        outline.commit_document(updated);
        Ok(summary)
    }

    /// Writes the serialized representation of the whole project to `output`
    /// and returns its size.
    pub async fn snapshot(
        outline: &mut ProjectOutline,
        output: &Path,
    ) -> Result<usize, ApplicationError> {
        let root_item = outline.root();
        let wrapper = outline
            .container_handle(root_item)
            .context(OutlineSnafu)?;
        let bytes = wrapper
            .serialized_representation()
            .context(SnapshotSnafu)?;
        let size = bytes.len();
        compio::fs::write(output, bytes)
            .await
            .0
            .context(WriteSnapshotSnafu {
                path: output.to_path_buf(),
            })?;
        info!("Wrote {} byte snapshot to {}", size, output.display());
        Ok(size)
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while reading the project description"))]
    DescriptionError { source: DescriptionError },
    #[snafu(display("Failed to read the project from disk"))]
    ReadProjectError { source: DiskError },
    #[snafu(display("Failed to write the project to disk"))]
    WriteProjectError { source: DiskError },
    #[snafu(display("No item at '{}' in the outline", path))]
    UnknownItemError { path: String },
    #[snafu(display("Failed to read {}", path.display()))]
    ReadSourceError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to update the outline"))]
    OutlineError { source: OutlineError },
    #[snafu(display("Failed to serialize the project"))]
    SnapshotError { source: SnapshotError },
    #[snafu(display("Failed to write the snapshot to {}", path.display()))]
    WriteSnapshotError {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::FileWrapper;
    use crate::outline::ItemTag;
    use rstest::*;
    use std::fs;
    use tempfile::TempDir;

    const DESCRIPTION: &str = r#"
package: Hello
groups:
  Package:
    - file: Hello.cabal
  Executables:
    - executable: hello
      items:
        - file: Main.hs
        - folder: Lib
          items:
            - file: Util.hs
"#;

    #[fixture]
    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("outline.yaml"), DESCRIPTION).unwrap();
        fs::write(dir.path().join("Hello.cabal"), "name: Hello").unwrap();
        fs::write(dir.path().join("Main.hs"), "main = pure ()").unwrap();
        fs::create_dir(dir.path().join("Lib")).unwrap();
        fs::write(dir.path().join("Lib/Util.hs"), "module Lib.Util").unwrap();
        dir
    }

    #[rstest]
    #[compio::test]
    async fn loaded_outline_mirrors_the_description(project: TempDir) {
        let outline = Application::load(project.path()).await.unwrap();

        assert_eq!(outline.identifier(outline.root()), "Hello");
        assert!(!outline.is_dirty(outline.root()));
        let util = outline
            .find_by_relative_path("Executables/hello/Lib/Util.hs")
            .unwrap();
        assert_eq!(outline.tag(util), ItemTag::File);
    }

    #[rstest]
    #[compio::test]
    async fn update_writes_only_the_changed_file(project: TempDir) {
        let source = project.path().join("Main.hs.new");
        fs::write(&source, "main = putStrLn \"hi\"").unwrap();
        let mut outline = Application::load(project.path()).await.unwrap();

        let summary = Application::update(
            &mut outline,
            project.path(),
            "Executables/hello/Main.hs",
            &source,
        )
        .await
        .unwrap();

        assert_eq!(summary.written, 1);
        assert_eq!(summary.unchanged, 2);
        assert_eq!(
            fs::read_to_string(project.path().join("Main.hs")).unwrap(),
            "main = putStrLn \"hi\""
        );
        assert!(!outline.is_dirty(outline.root()));
        let document = outline.document().unwrap();
        assert_eq!(
            document.entry("Main.hs").and_then(|entry| entry.contents()),
            Some(&b"main = putStrLn \"hi\""[..])
        );
    }

    #[rstest]
    #[compio::test]
    async fn failed_save_keeps_the_edit_for_a_retry(project: TempDir) {
        let source = project.path().join("Util.hs.new");
        fs::write(&source, "module Lib.Util where").unwrap();
        let mut outline = Application::load(project.path()).await.unwrap();
        let lib = project.path().join("Lib");
        fs::remove_dir_all(&lib).unwrap();
        fs::write(&lib, "not a directory").unwrap();

        let result = Application::update(
            &mut outline,
            project.path(),
            "Executables/hello/Lib/Util.hs",
            &source,
        )
        .await;

        assert!(matches!(result, Err(ApplicationError::WriteProjectError { .. })));
        assert!(outline.is_dirty(outline.root()));

        fs::remove_file(&lib).unwrap();
        fs::create_dir(&lib).unwrap();
        let summary = Application::save(&mut outline, project.path())
            .await
            .unwrap();

        assert_eq!(summary.written, 1);
        assert_eq!(
            fs::read_to_string(lib.join("Util.hs")).unwrap(),
            "module Lib.Util where"
        );
        assert!(!outline.is_dirty(outline.root()));
    }

    #[rstest]
    #[compio::test]
    async fn saving_a_clean_outline_writes_nothing(project: TempDir) {
        let mut outline = Application::load(project.path()).await.unwrap();

        let summary = Application::save(&mut outline, project.path())
            .await
            .unwrap();

        assert_eq!(summary, WriteSummary::default());
    }

    #[rstest]
    #[compio::test]
    async fn update_of_an_unknown_item_fails(project: TempDir) {
        let mut outline = Application::load(project.path()).await.unwrap();

        let result = Application::update(
            &mut outline,
            project.path(),
            "Executables/hello/Missing.hs",
            &project.path().join("Main.hs"),
        )
        .await;

        assert!(matches!(result, Err(ApplicationError::UnknownItemError { .. })));
    }

    #[rstest]
    #[compio::test]
    async fn update_of_a_folder_is_rejected(project: TempDir) {
        let mut outline = Application::load(project.path()).await.unwrap();

        let result = Application::update(
            &mut outline,
            project.path(),
            "Executables/hello/Lib",
            &project.path().join("Main.hs"),
        )
        .await;

        assert!(matches!(
            result,
            Err(ApplicationError::OutlineError {
                source: OutlineError::NotAFile { .. }
            })
        ));
    }

    #[rstest]
    #[compio::test]
    async fn snapshot_contains_every_outline_file(project: TempDir) {
        let output = project.path().join("hello.snapshot");
        let mut outline = Application::load(project.path()).await.unwrap();

        Application::snapshot(&mut outline, &output).await.unwrap();

        let bytes = fs::read(&output).unwrap();
        let restored = FileWrapper::from_serialized_representation(&bytes).unwrap();
        assert_eq!(
            restored.entry_names().collect::<Vec<_>>(),
            vec!["Hello.cabal", "Main.hs", "Lib"]
        );
        assert_eq!(restored.file_count(), 3);
    }

    #[compio::test]
    async fn loading_without_a_description_fails() {
        let dir = TempDir::new().unwrap();
        let result = Application::load(dir.path()).await;
        assert!(matches!(result, Err(ApplicationError::DescriptionError { .. })));
    }
}
