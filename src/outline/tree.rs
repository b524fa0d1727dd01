use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;

use snafu::{Snafu, ensure};
use tracing::{debug, trace};

use super::{ItemId, ItemTag, OutlineItem, is_toplevel_group_id, is_valid_identifier};
use crate::filesystem::FileWrapper;

#[derive(Debug)]
struct Slot {
    generation: u32,
    item: Option<OutlineItem>,
}

/// The project outline: an arena of [`OutlineItem`]s rooted at the package.
///
/// Items refer to each other through [`ItemId`] handles only; the arena is
/// the sole owner of every item. The outline also carries the document
/// wrapper, the authoritative on-disk state that file items without an
/// in-memory payload read their contents from.
///
/// Structural contract violations (misplaced tags, duplicate sibling
/// identifiers, stale handles) panic. They indicate a bug in the model layer
/// driving the outline.
#[derive(Debug)]
pub struct ProjectOutline {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: ItemId,
    document: Option<Rc<FileWrapper>>,
}

impl ProjectOutline {
    pub fn new(package_name: impl Into<String>) -> Self {
        let mut outline = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: ItemId {
                index: 0,
                generation: 0,
            },
            document: None,
        };
        outline.root = outline.allocate(OutlineItem::new(
            ItemTag::Package,
            package_name.into(),
            None,
        ));
        outline
    }

    pub fn with_document(package_name: impl Into<String>, document: Rc<FileWrapper>) -> Self {
        let mut outline = Self::new(package_name);
        outline.document = Some(document);
        outline
    }

    pub fn root(&self) -> ItemId {
        self.root
    }

    pub fn document(&self) -> Option<&Rc<FileWrapper>> {
        self.document.as_ref()
    }

    /// Makes `document` the authoritative on-disk state, typically the root
    /// wrapper that was just persisted.
    pub fn commit_document(&mut self, document: Rc<FileWrapper>) {
        debug!(
            "Committing document with {} files ({:016x})",
            document.file_count(),
            document.fingerprint()
        );
        self.document = Some(document);
    }

    pub fn item_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.get(item).is_some()
    }

    pub fn get(&self, item: ItemId) -> Option<&OutlineItem> {
        self.slots
            .get(item.index as usize)
            .filter(|slot| slot.generation == item.generation)
            .and_then(|slot| slot.item.as_ref())
    }

    pub fn item(&self, item: ItemId) -> &OutlineItem {
        self.get(item)
            .unwrap_or_else(|| panic!("Outline item {item} does not exist"))
    }

    pub(super) fn item_mut(&mut self, item: ItemId) -> &mut OutlineItem {
        self.slots
            .get_mut(item.index as usize)
            .filter(|slot| slot.generation == item.generation)
            .and_then(|slot| slot.item.as_mut())
            .unwrap_or_else(|| panic!("Outline item {item} does not exist"))
    }

    fn allocate(&mut self, item: OutlineItem) -> ItemId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.item = Some(item);
            return ItemId {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len())
            .unwrap_or_else(|_| panic!("Outline cannot hold more than {} items", u32::MAX));
        self.slots.push(Slot {
            generation: 0,
            item: Some(item),
        });
        ItemId {
            index,
            generation: 0,
        }
    }

    fn release(&mut self, item: ItemId) -> OutlineItem {
        let slot = &mut self.slots[item.index as usize];
        let released = slot
            .item
            .take()
            .unwrap_or_else(|| panic!("Outline item {item} was already released"));
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(item.index);
        released
    }

    // Construction

    /// Creates an item below `parent` without inserting it into the parent's
    /// children. The caller must follow up with [`Self::attach_item`] or
    /// [`Self::insert_item`].
    pub fn new_item(
        &mut self,
        parent: ItemId,
        tag: ItemTag,
        identifier: impl Into<String>,
    ) -> ItemId {
        let identifier = identifier.into();
        self.check_placement(parent, tag, &identifier);
        trace!("Creating {} item '{}' below {}", tag, identifier, parent);
        self.allocate(OutlineItem::new(tag, identifier, Some(parent)))
    }

    /// Creates an item and appends it to the children of `parent`.
    pub fn add_item(
        &mut self,
        parent: ItemId,
        tag: ItemTag,
        identifier: impl Into<String>,
    ) -> ItemId {
        let item = self.new_item(parent, tag, identifier);
        let index = self.item(parent).children.len();
        self.insert_item(parent, index, item);
        item
    }

    /// Inserts an item created by [`Self::new_item`] without marking anything
    /// dirty. Used while building an outline that mirrors the document.
    pub fn attach_item(&mut self, parent: ItemId, index: usize, item: ItemId) {
        let (item_parent, identifier) = {
            let entry = self.item(item);
            (entry.parent, entry.identifier.clone())
        };
        assert_eq!(
            item_parent,
            Some(parent),
            "Item '{identifier}' was created for a different parent"
        );
        assert!(
            !self.item(parent).children.contains(&item),
            "Item '{identifier}' is already attached"
        );
        self.check_unique_sibling(parent, &identifier, None);

        let children = &mut self.item_mut(parent).children;
        assert!(
            index <= children.len(),
            "Insertion index {index} is out of bounds for {} children",
            children.len()
        );
        children.insert(index, item);
    }

    /// Inserts an item created by [`Self::new_item`] as an edit: the item
    /// and all of its ancestors become dirty.
    pub fn insert_item(&mut self, parent: ItemId, index: usize, item: ItemId) {
        self.attach_item(parent, index, item);
        self.mark_dirty(item);
    }

    fn check_placement(&self, parent: ItemId, tag: ItemTag, identifier: &str) {
        check_identifier(identifier);
        if tag == ItemTag::Group {
            assert!(
                parent == self.root,
                "Group '{identifier}' must be a toplevel item"
            );
            assert!(
                is_toplevel_group_id(identifier),
                "'{identifier}' is not a toplevel group identifier"
            );
        }
        let parent_tag = self.item(parent).tag;
        assert!(
            parent_tag.may_contain(tag),
            "A {parent_tag} item cannot contain the {tag} item '{identifier}'"
        );
    }

    fn check_unique_sibling(&self, parent: ItemId, identifier: &str, except: Option<ItemId>) {
        let clash = self
            .item(parent)
            .children
            .iter()
            .any(|&child| Some(child) != except && self.item(child).identifier == identifier);
        assert!(
            !clash,
            "Duplicate identifier '{identifier}' below '{}'",
            self.relative_path(parent)
        );
    }

    // Mutation

    /// Replaces the payload of a file item and marks it and its ancestors
    /// dirty.
    pub fn update_item_with_data(
        &mut self,
        item: ItemId,
        data: impl Into<Vec<u8>>,
    ) -> Result<(), OutlineError> {
        let target = self.item(item);
        ensure!(
            target.tag.carries_data(),
            NotAFileSnafu {
                tag: target.tag,
                identifier: target.identifier.clone(),
            }
        );

        let data = data.into();
        debug!(
            "Updating '{}' with {} bytes",
            self.relative_path(item),
            data.len()
        );
        self.item_mut(item).contents = Some(data);
        self.mark_dirty(item);
        Ok(())
    }

    /// Marks `item` and every ancestor up to the root dirty.
    pub fn mark_dirty(&mut self, item: ItemId) {
        let mut current = Some(item);
        while let Some(id) = current {
            let entry = self.item_mut(id);
            entry.mark_dirty();
            current = entry.parent;
        }
    }

    pub fn rename_item(&mut self, item: ItemId, identifier: impl Into<String>) {
        let identifier = identifier.into();
        let (tag, parent) = {
            let entry = self.item(item);
            (entry.tag, entry.parent)
        };
        if let Some(parent) = parent {
            check_identifier(&identifier);
            self.check_unique_sibling(parent, &identifier, Some(item));
        }
        assert!(
            tag != ItemTag::Group || is_toplevel_group_id(&identifier),
            "'{identifier}' is not a toplevel group identifier"
        );

        if tag.occupies_path() {
            // Files below move on disk, so their document contents must come along
            self.pin_document_contents(item);
        }
        debug!(
            "Renaming '{}' to '{}'",
            self.relative_path(item),
            identifier
        );
        self.item_mut(item).identifier = identifier;
        self.mark_dirty(item);
    }

    /// Loads the document contents of every file at or below `item` that has
    /// no in-memory payload yet.
    fn pin_document_contents(&mut self, item: ItemId) {
        let Some(document) = self.document.clone() else {
            return;
        };
        let unpinned = self
            .walk(item)
            .map(|(id, _)| id)
            .filter(|&id| {
                let entry = self.item(id);
                entry.tag.carries_data() && entry.contents.is_none()
            })
            .collect::<Vec<_>>();

        for id in unpinned {
            let path = self.file_name(id);
            if let Some(contents) = document.entry_at_path(&path).and_then(|entry| entry.contents())
            {
                trace!("Pinning document contents of {}", path.display());
                self.item_mut(id).contents = Some(contents.to_vec());
            }
        }
    }

    /// Removes `item` and its whole subtree from the outline.
    pub fn remove_item(&mut self, item: ItemId) {
        let parent = self
            .item(item)
            .parent
            .unwrap_or_else(|| panic!("The root item cannot be removed"));
        let path = self.relative_path(item);

        let children = &mut self.item_mut(parent).children;
        let position = children
            .iter()
            .position(|&child| child == item)
            .unwrap_or_else(|| panic!("Item '{path}' is not attached to its parent"));
        children.remove(position);

        let mut released = 0;
        let mut pending = vec![item];
        while let Some(id) = pending.pop() {
            pending.extend(self.release(id).children);
            released += 1;
        }
        debug!("Removed '{}' ({} items)", path, released);
        self.mark_dirty(parent);
    }

    /// Moves the child at position `from` of `parent` to position `to`.
    pub fn move_item(&mut self, parent: ItemId, from: usize, to: usize) {
        let children = &mut self.item_mut(parent).children;
        let len = children.len();
        assert!(
            from < len && to < len,
            "Cannot move child {from} to {to} among {len} children"
        );
        let child = children.remove(from);
        children.insert(to, child);
        self.mark_dirty(parent);
    }

    /// Replaces the display order of the children of `parent`. `order` must
    /// be a permutation of the current children.
    pub fn reorder_children(&mut self, parent: ItemId, order: Vec<ItemId>) {
        let current = self.item(parent).children.iter().collect::<HashSet<_>>();
        let requested = order.iter().collect::<HashSet<_>>();
        assert!(
            order.len() == current.len() && requested == current,
            "New order of '{}' is not a permutation of its children",
            self.relative_path(parent)
        );
        self.item_mut(parent).children = order;
        self.mark_dirty(parent);
    }

    // Queries

    pub fn children(&self, item: ItemId) -> &[ItemId] {
        &self.item(item).children
    }

    pub fn identifier(&self, item: ItemId) -> &str {
        &self.item(item).identifier
    }

    pub fn tag(&self, item: ItemId) -> ItemTag {
        self.item(item).tag
    }

    pub fn parent(&self, item: ItemId) -> Option<ItemId> {
        self.item(item).parent
    }

    pub fn is_dirty(&self, item: ItemId) -> bool {
        self.item(item).dirty
    }

    /// Items from the root down to `item`, both included.
    fn lineage(&self, item: ItemId) -> Vec<ItemId> {
        let mut lineage = vec![item];
        let mut current = item;
        while let Some(parent) = self.item(current).parent {
            assert!(
                lineage.len() <= self.item_count(),
                "Parent chain of {item} does not reach the root"
            );
            lineage.push(parent);
            current = parent;
        }
        assert_eq!(
            current, self.root,
            "Parent chain of {item} ends in a detached item"
        );
        lineage.reverse();
        lineage
    }

    /// Identifiers from the first level below the root down to `item`,
    /// separated by `/`. The root itself has an empty relative path.
    pub fn relative_path(&self, item: ItemId) -> String {
        self.lineage(item)
            .into_iter()
            .skip(1)
            .map(|id| self.identifier(id))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// The item's file name relative to the document root. Only folders and
    /// files contribute path components.
    pub fn file_name(&self, item: ItemId) -> PathBuf {
        self.lineage(item)
            .into_iter()
            .map(|id| self.item(id))
            .filter(|entry| entry.tag.occupies_path())
            .map(|entry| entry.identifier.as_str())
            .collect()
    }

    pub fn child_by_identifier(&self, parent: ItemId, identifier: &str) -> Option<ItemId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&child| self.identifier(child) == identifier)
    }

    /// Resolves a path as produced by [`Self::relative_path`].
    pub fn find_by_relative_path(&self, path: &str) -> Option<ItemId> {
        path.split('/')
            .filter(|component| !component.is_empty())
            .try_fold(self.root, |current, component| {
                self.child_by_identifier(current, component)
            })
    }

    /// Pre-order traversal of the subtree at `item` in display order,
    /// yielding each item with its depth relative to `item`.
    pub fn walk(&self, item: ItemId) -> Walk<'_> {
        Walk {
            outline: self,
            pending: vec![(item, 0)],
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_well_formed(&self) {
        for (id, _) in self.walk(self.root) {
            let entry = self.item(id);
            if let Some(parent) = entry.parent {
                let occurrences = self
                    .children(parent)
                    .iter()
                    .filter(|&&child| child == id)
                    .count();
                assert_eq!(occurrences, 1, "{id} must appear once below its parent");
                if entry.dirty {
                    assert!(self.is_dirty(parent), "Dirty {id} has a clean parent");
                }
            }
            for &child in &entry.children {
                assert_eq!(self.parent(child), Some(id));
            }
        }
    }
}

pub struct Walk<'a> {
    outline: &'a ProjectOutline,
    pending: Vec<(ItemId, usize)>,
}

impl Iterator for Walk<'_> {
    type Item = (ItemId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (item, depth) = self.pending.pop()?;
        self.pending.extend(
            self.outline
                .children(item)
                .iter()
                .rev()
                .map(|&child| (child, depth + 1)),
        );
        Some((item, depth))
    }
}

fn check_identifier(identifier: &str) {
    assert!(
        is_valid_identifier(identifier),
        "'{identifier}' is not a valid item identifier"
    );
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum OutlineError {
    #[snafu(display("Cannot replace the data of {} '{}': only files carry data", tag, identifier))]
    NotAFile { tag: ItemTag, identifier: String },
    #[snafu(display("No backing data for file {}", path.display()))]
    MissingBackingData { path: PathBuf },
    #[snafu(display("{} is contributed by more than one item", path.display()))]
    ConflictingEntry { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::{DATA_GROUP_ID, EXECUTABLE_GROUP_ID, PACKAGE_GROUP_ID};
    use rstest::*;

    struct Fixture {
        outline: ProjectOutline,
        package_group: ItemId,
        cabal: ItemId,
        executable: ItemId,
        main: ItemId,
        lib: ItemId,
        util: ItemId,
    }

    #[fixture]
    fn fixture() -> Fixture {
        let mut outline = ProjectOutline::new("Hello");
        let root = outline.root();
        let package_group = outline.add_item(root, ItemTag::Group, PACKAGE_GROUP_ID);
        let cabal = outline.add_item(package_group, ItemTag::File, "Hello.cabal");
        let executables = outline.add_item(root, ItemTag::Group, EXECUTABLE_GROUP_ID);
        let executable = outline.add_item(executables, ItemTag::Executable, "hello");
        let main = outline.add_item(executable, ItemTag::File, "Main.hs");
        let lib = outline.add_item(executable, ItemTag::Folder, "Lib");
        let util = outline.add_item(lib, ItemTag::File, "Util.hs");
        Fixture {
            outline,
            package_group,
            cabal,
            executable,
            main,
            lib,
            util,
        }
    }

    #[rstest]
    fn factory_links_children_and_parents(fixture: Fixture) {
        let outline = &fixture.outline;
        outline.assert_well_formed();
        assert_eq!(outline.item_count(), 8);
        assert_eq!(outline.parent(fixture.main), Some(fixture.executable));
        assert_eq!(
            outline.children(fixture.executable),
            &[fixture.main, fixture.lib]
        );
        assert_eq!(outline.parent(outline.root()), None);
    }

    #[rstest]
    fn raw_construction_requires_explicit_attachment(mut fixture: Fixture) {
        let outline = &mut fixture.outline;
        let item = outline.new_item(fixture.lib, ItemTag::File, "Extra.hs");

        assert_eq!(outline.parent(item), Some(fixture.lib));
        assert!(!outline.children(fixture.lib).contains(&item));

        outline.attach_item(fixture.lib, 0, item);
        assert_eq!(outline.children(fixture.lib), &[item, fixture.util]);
        outline.assert_well_formed();
    }

    #[rstest]
    #[case("Package/Hello.cabal")]
    #[case("Executables/hello/Main.hs")]
    #[case("Executables/hello/Lib/Util.hs")]
    fn relative_paths_round_trip(fixture: Fixture, #[case] path: &str) {
        let item = fixture
            .outline
            .find_by_relative_path(path)
            .expect("path should resolve");
        assert_eq!(fixture.outline.relative_path(item), path);
    }

    #[rstest]
    fn relative_path_ignores_sibling_order(mut fixture: Fixture) {
        let before = fixture.outline.relative_path(fixture.util);
        fixture
            .outline
            .reorder_children(fixture.executable, vec![fixture.lib, fixture.main]);
        let root = fixture.outline.root();
        fixture.outline.move_item(root, 1, 0);

        assert_eq!(fixture.outline.relative_path(fixture.util), before);
        assert_eq!(before, "Executables/hello/Lib/Util.hs");
    }

    #[rstest]
    fn root_has_an_empty_relative_path(fixture: Fixture) {
        let root = fixture.outline.root();
        assert_eq!(fixture.outline.relative_path(root), "");
        assert_eq!(fixture.outline.find_by_relative_path(""), Some(root));
    }

    #[rstest]
    #[case("Package/Hello.cabal", "Hello.cabal")]
    #[case("Executables/hello/Main.hs", "Main.hs")]
    #[case("Executables/hello/Lib/Util.hs", "Lib/Util.hs")]
    fn file_names_skip_transparent_items(
        fixture: Fixture,
        #[case] relative_path: &str,
        #[case] file_name: &str,
    ) {
        let item = fixture.outline.find_by_relative_path(relative_path).unwrap();
        assert_eq!(fixture.outline.file_name(item), PathBuf::from(file_name));
    }

    #[rstest]
    fn identifiers_only_need_to_be_unique_among_siblings(mut fixture: Fixture) {
        let outline = &mut fixture.outline;
        let nested = outline.add_item(fixture.lib, ItemTag::File, "Main.hs");

        assert_eq!(outline.child_by_identifier(fixture.lib, "Main.hs"), Some(nested));
        assert_eq!(
            outline.child_by_identifier(fixture.executable, "Main.hs"),
            Some(fixture.main)
        );
        assert_eq!(outline.child_by_identifier(fixture.lib, "Other.hs"), None);
    }

    #[rstest]
    #[should_panic(expected = "Duplicate identifier 'Main.hs'")]
    fn duplicate_sibling_identifiers_panic(mut fixture: Fixture) {
        fixture
            .outline
            .add_item(fixture.executable, ItemTag::File, "Main.hs");
    }

    #[rstest]
    #[should_panic(expected = "Duplicate identifier 'Lib'")]
    fn renaming_onto_a_sibling_panics(mut fixture: Fixture) {
        fixture.outline.rename_item(fixture.main, "Lib");
    }

    #[rstest]
    #[should_panic(expected = "cannot contain")]
    fn misplaced_tags_panic(mut fixture: Fixture) {
        fixture
            .outline
            .add_item(fixture.cabal, ItemTag::File, "Nested.hs");
    }

    #[rstest]
    #[should_panic(expected = "must be a toplevel item")]
    fn nested_groups_panic(mut fixture: Fixture) {
        fixture
            .outline
            .add_item(fixture.package_group, ItemTag::Group, DATA_GROUP_ID);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("Lib/Extra.hs")]
    #[should_panic(expected = "is not a valid item identifier")]
    fn path_breaking_identifiers_panic(mut fixture: Fixture, #[case] identifier: &str) {
        fixture
            .outline
            .add_item(fixture.lib, ItemTag::File, identifier);
    }

    #[rstest]
    #[case(".")]
    #[case("..")]
    #[case("Util/Extra.hs")]
    #[should_panic(expected = "is not a valid item identifier")]
    fn renaming_to_path_breaking_identifiers_panics(
        mut fixture: Fixture,
        #[case] identifier: &str,
    ) {
        fixture.outline.rename_item(fixture.util, identifier);
    }

    #[test]
    #[should_panic(expected = "is not a toplevel group identifier")]
    fn unreserved_group_identifiers_panic() {
        let mut outline = ProjectOutline::new("Hello");
        let root = outline.root();
        outline.add_item(root, ItemTag::Group, "Sources");
    }

    #[rstest]
    #[should_panic(expected = "was created for a different parent")]
    fn attaching_below_another_parent_panics(mut fixture: Fixture) {
        let item = fixture.outline.new_item(fixture.lib, ItemTag::File, "X.hs");
        fixture.outline.attach_item(fixture.executable, 0, item);
    }

    #[rstest]
    fn removal_releases_the_subtree(mut fixture: Fixture) {
        let outline = &mut fixture.outline;
        outline.remove_item(fixture.lib);

        outline.assert_well_formed();
        assert!(!outline.contains(fixture.lib));
        assert!(!outline.contains(fixture.util));
        assert_eq!(outline.children(fixture.executable), &[fixture.main]);
        assert_eq!(outline.item_count(), 6);
    }

    #[rstest]
    fn stale_handles_do_not_alias_reused_slots(mut fixture: Fixture) {
        let outline = &mut fixture.outline;
        outline.remove_item(fixture.util);
        let replacement = outline.add_item(fixture.lib, ItemTag::File, "Fresh.hs");

        assert_eq!(replacement.index, fixture.util.index);
        assert!(!outline.contains(fixture.util));
        assert_eq!(outline.identifier(replacement), "Fresh.hs");
    }

    #[rstest]
    #[should_panic(expected = "does not exist")]
    fn stale_handles_panic(mut fixture: Fixture) {
        fixture.outline.remove_item(fixture.lib);
        fixture.outline.relative_path(fixture.util);
    }

    #[rstest]
    #[should_panic(expected = "The root item cannot be removed")]
    fn removing_the_root_panics(mut fixture: Fixture) {
        let root = fixture.outline.root();
        fixture.outline.remove_item(root);
    }

    #[rstest]
    #[should_panic(expected = "not a permutation")]
    fn reordering_requires_a_permutation(mut fixture: Fixture) {
        fixture
            .outline
            .reorder_children(fixture.executable, vec![fixture.main, fixture.main]);
    }

    #[rstest]
    fn walk_visits_items_in_display_order(fixture: Fixture) {
        let visited = fixture
            .outline
            .walk(fixture.outline.root())
            .map(|(id, depth)| (fixture.outline.identifier(id).to_string(), depth))
            .collect::<Vec<_>>();

        assert_eq!(
            visited,
            vec![
                ("Hello".to_string(), 0),
                ("Package".to_string(), 1),
                ("Hello.cabal".to_string(), 2),
                ("Executables".to_string(), 1),
                ("hello".to_string(), 2),
                ("Main.hs".to_string(), 3),
                ("Lib".to_string(), 3),
                ("Util.hs".to_string(), 4),
            ]
        );
    }
}
