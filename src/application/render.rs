use colored::{ColoredString, Colorize};

use crate::outline::{ItemId, ItemTag, ProjectOutline};

/// Renders the outline as an indented tree, one item per line. Items with
/// unsaved changes are marked with `*`.
pub fn render_outline(outline: &ProjectOutline) -> String {
    outline
        .walk(outline.root())
        .map(|(item, depth)| {
            let marker = if outline.is_dirty(item) {
                " *".yellow().to_string()
            } else {
                String::new()
            };
            format!(
                "{:indent$}{}{}\n",
                "",
                styled_identifier(outline, item),
                marker,
                indent = depth * 2
            )
        })
        .collect()
}

fn styled_identifier(outline: &ProjectOutline, item: ItemId) -> ColoredString {
    let identifier = outline.identifier(item);
    match outline.tag(item) {
        ItemTag::Package => identifier.bright_blue().bold(),
        ItemTag::Group => identifier.bold(),
        ItemTag::Executable => identifier.green(),
        ItemTag::FileGroup => identifier.cyan(),
        ItemTag::Folder => format!("{identifier}/").blue(),
        ItemTag::File => identifier.normal(),
    }
}
