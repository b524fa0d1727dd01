use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use compio::fs;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::filesystem::FileWrapper;
use crate::outline::{
    ItemId, ItemTag, ProjectOutline, is_toplevel_group_id, is_valid_identifier,
};

const DESCRIPTION_FILE_NAME: &str = "outline.yaml";

pub fn get_description_file_path(root: &Path) -> PathBuf {
    root.join(DESCRIPTION_FILE_NAME)
}

/// One item of the description and the items nested below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub tag: ItemTag,
    pub identifier: String,
    pub items: Vec<ItemSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub identifier: String,
    pub items: Vec<ItemSpec>,
}

/// Which items the outline of a project consists of, as declared in the
/// project's `outline.yaml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescription {
    package: String,
    groups: Vec<GroupSpec>,
}

impl ProjectDescription {
    pub async fn read(root: &Path) -> Result<Self, DescriptionError> {
        Self::from_path(get_description_file_path(root)).await
    }

    pub async fn from_path(path: PathBuf) -> Result<Self, DescriptionError> {
        debug!("Reading project description: {}", path.display());
        let bytes = fs::read(&path).await.context(ReadSnafu {
            file_path: path.display().to_string(),
        })?;
        debug!("Successfully read project description: {} bytes", bytes.len());
        let contents = String::from_utf8(bytes).context(EncodingSnafu)?;
        contents.as_str().try_into()
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn groups(&self) -> &[GroupSpec] {
        &self.groups
    }

    /// Builds an outline mirroring this description. The outline starts out
    /// clean: it is assumed to match `document`.
    pub fn build_outline(&self, document: Option<Rc<FileWrapper>>) -> ProjectOutline {
        let mut outline = match document {
            Some(document) => ProjectOutline::with_document(&self.package, document),
            None => ProjectOutline::new(&self.package),
        };
        let root = outline.root();
        for (index, group) in self.groups.iter().enumerate() {
            let item = outline.new_item(root, ItemTag::Group, &group.identifier);
            outline.attach_item(root, index, item);
            Self::attach_items(&mut outline, item, &group.items);
        }
        info!(
            "Built outline of package '{}' with {} items",
            self.package,
            outline.item_count()
        );
        outline
    }

    fn attach_items(outline: &mut ProjectOutline, parent: ItemId, items: &[ItemSpec]) {
        for (index, spec) in items.iter().enumerate() {
            let item = outline.new_item(parent, spec.tag, &spec.identifier);
            outline.attach_item(parent, index, item);
            Self::attach_items(outline, item, &spec.items);
        }
    }

    fn parse_groups(value: &Yaml) -> Result<Vec<GroupSpec>, DescriptionError> {
        let mapping = value.as_mapping().context(GroupsNotMapSnafu)?;
        let mut groups = Vec::with_capacity(mapping.len());
        for (key, items) in mapping {
            let identifier = key.as_str().context(GroupsNotMapSnafu)?;
            ensure!(
                is_toplevel_group_id(identifier),
                UnknownGroupSnafu { name: identifier }
            );
            ensure!(
                groups
                    .iter()
                    .all(|group: &GroupSpec| group.identifier != identifier),
                DuplicateItemSnafu {
                    identifier,
                    parent: "groups",
                }
            );
            groups.push(GroupSpec {
                identifier: identifier.to_string(),
                items: Self::parse_items(items, ItemTag::Group, identifier)?,
            });
        }
        Ok(groups)
    }

    fn parse_items(
        value: &Yaml,
        parent_tag: ItemTag,
        parent: &str,
    ) -> Result<Vec<ItemSpec>, DescriptionError> {
        let Some(sequence) = value.as_sequence() else {
            if matches!(value, Yaml::Value(Scalar::Null)) {
                return Ok(Vec::new());
            }
            return ItemsNotSequenceSnafu { name: parent }.fail();
        };

        let mut items = Vec::with_capacity(sequence.len());
        let mut seen = HashSet::new();
        for entry in sequence {
            let Some(item) = Self::parse_item(entry)? else {
                continue;
            };
            ensure!(
                parent_tag.may_contain(item.tag),
                MisplacedItemSnafu {
                    tag: item.tag,
                    identifier: item.identifier.clone(),
                    parent,
                }
            );
            ensure!(
                seen.insert(item.identifier.clone()),
                DuplicateItemSnafu {
                    identifier: item.identifier.clone(),
                    parent,
                }
            );
            items.push(item);
        }
        Ok(items)
    }

    /// Parses a single item entry such as `{ folder: src, items: [...] }`.
    /// Entries that are not items are skipped.
    fn parse_item(entry: &Yaml) -> Result<Option<ItemSpec>, DescriptionError> {
        let Some(mapping) = entry.as_mapping() else {
            debug!("Skipping invalid item entry: {:?}", entry);
            return Ok(None);
        };

        let mut declaration = None;
        let mut nested = None;
        for (key, value) in mapping {
            match key.as_str() {
                Some("items") => nested = Some(value),
                Some(name) => match (tag_for_key(name), value.as_str()) {
                    (Some(tag), Some(identifier)) if declaration.is_none() => {
                        declaration = Some((tag, identifier));
                    }
                    _ => {
                        warn!("Skipping item entry with unexpected key '{}'", name);
                        return Ok(None);
                    }
                },
                None => {
                    debug!("Skipping item entry with non-string key: {:?}", key);
                    return Ok(None);
                }
            }
        }

        let Some((tag, identifier)) = declaration else {
            debug!("Skipping item entry without a kind: {:?}", entry);
            return Ok(None);
        };
        ensure!(
            is_valid_identifier(identifier),
            InvalidIdentifierSnafu { identifier }
        );

        let items = match nested {
            Some(value) => Self::parse_items(value, tag, identifier)?,
            None => Vec::new(),
        };
        Ok(Some(ItemSpec {
            tag,
            identifier: identifier.to_string(),
            items,
        }))
    }
}

fn tag_for_key(key: &str) -> Option<ItemTag> {
    match key {
        "executable" => Some(ItemTag::Executable),
        "filegroup" => Some(ItemTag::FileGroup),
        "folder" => Some(ItemTag::Folder),
        "file" => Some(ItemTag::File),
        _ => None,
    }
}

impl TryFrom<&str> for ProjectDescription {
    type Error = DescriptionError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let document = documents.first().context(MalformedDescriptionSnafu)?;
        let top_level = document.as_mapping().context(TopLevelNotMapSnafu)?;

        let mut package = None;
        let mut groups = Vec::new();
        for (key, value) in top_level {
            match key.as_str() {
                Some("package") => {
                    package = value.as_str().map(str::to_string);
                }
                Some("groups") => groups = Self::parse_groups(value)?,
                _ => debug!("Ignoring unknown description key: {:?}", key),
            }
        }

        let package = package
            .filter(|package| !package.trim().is_empty())
            .context(MissingPackageSnafu)?;
        Ok(ProjectDescription { package, groups })
    }
}

#[derive(Debug, Snafu)]
pub enum DescriptionError {
    #[snafu(display("Failed to read the project description: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("The project description is not valid UTF-8"))]
    EncodingError { source: std::string::FromUtf8Error },
    #[snafu(display("Failed to parse the project description"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted project description"))]
    MalformedDescription,
    #[snafu(display("Top level of the project description should be a map"))]
    TopLevelNotMap,
    #[snafu(display("The project description must name its package"))]
    MissingPackage,
    #[snafu(display("Groups section should be a map"))]
    GroupsNotMap,
    #[snafu(display("'{}' is not a toplevel group", name))]
    UnknownGroup { name: String },
    #[snafu(display("Items of '{}' should be a list", name))]
    ItemsNotSequence { name: String },
    #[snafu(display("'{}' is not a valid item identifier", identifier))]
    InvalidIdentifier { identifier: String },
    #[snafu(display("'{}' cannot contain the {} '{}'", parent, tag, identifier))]
    MisplacedItem {
        tag: ItemTag,
        identifier: String,
        parent: String,
    },
    #[snafu(display("'{}' is declared multiple times in '{}'", identifier, parent))]
    DuplicateItem { identifier: String, parent: String },
}
