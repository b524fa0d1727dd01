//! Reading the project description (`outline.yaml`) and building the
//! outline it declares.

mod project_description;

pub use project_description::{
    DescriptionError, GroupSpec, ItemSpec, ProjectDescription, get_description_file_path,
};
