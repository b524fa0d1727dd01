use derive_more::Display;

/// Identifier of the toplevel group holding the package itself.
pub const PACKAGE_GROUP_ID: &str = "Package";
/// Identifier of the toplevel group holding data files.
pub const DATA_GROUP_ID: &str = "Data";
/// Identifier of the toplevel group holding the executable sections.
pub const EXECUTABLE_GROUP_ID: &str = "Executables";
/// Identifier of the toplevel group holding extra source files.
pub const EXTRA_SOURCE_GROUP_ID: &str = "Extra sources";

pub const TOPLEVEL_GROUP_IDS: [&str; 4] = [
    PACKAGE_GROUP_ID,
    DATA_GROUP_ID,
    EXECUTABLE_GROUP_ID,
    EXTRA_SOURCE_GROUP_ID,
];

pub fn is_toplevel_group_id(identifier: &str) -> bool {
    TOPLEVEL_GROUP_IDS.contains(&identifier)
}

/// Whether `identifier` can name an item below the root. Identifiers become
/// single path components, both on disk and in relative paths.
pub fn is_valid_identifier(identifier: &str) -> bool {
    !matches!(identifier, "" | "." | "..") && !identifier.contains('/')
}

/// Which flavour of outline item a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ItemTag {
    /// Toplevel group of the outline
    #[display("group")]
    Group,
    /// The package itself; always the root
    #[display("package")]
    Package,
    /// Executable section of the package
    #[display("executable")]
    Executable,
    /// Logical collection of files, e.g. a source or data directory
    #[display("file group")]
    FileGroup,
    /// File system directory
    #[display("folder")]
    Folder,
    /// Concrete file that is part of the package
    #[display("file")]
    File,
}

impl ItemTag {
    /// Whether an item of this flavour may directly contain `child`.
    ///
    /// Groups are further restricted to the first level below the root.
    pub fn may_contain(self, child: ItemTag) -> bool {
        use ItemTag::*;

        match self {
            Package => matches!(child, Group | Executable | FileGroup | Folder | File),
            Group => matches!(child, Executable | FileGroup | Folder | File),
            Executable => matches!(child, FileGroup | Folder | File),
            FileGroup | Folder => matches!(child, Folder | File),
            File => false,
        }
    }

    /// Transparent items have no on-disk counterpart of their own: their
    /// entries belong to the directory of the closest non-transparent
    /// ancestor.
    pub fn is_transparent(self) -> bool {
        matches!(self, ItemTag::Group | ItemTag::Executable | ItemTag::FileGroup)
    }

    /// Whether the identifier of this item is a component of on-disk paths.
    pub fn occupies_path(self) -> bool {
        matches!(self, ItemTag::Folder | ItemTag::File)
    }

    pub fn carries_data(self) -> bool {
        self == ItemTag::File
    }
}
