use std::rc::Rc;

use hashlink::LinkedHashMap;
use snafu::{OptionExt, ensure};
use tracing::{debug, trace};

use super::tree::{ConflictingEntrySnafu, MissingBackingDataSnafu};
use super::{ItemId, ItemTag, OutlineError, ProjectOutline};
use crate::filesystem::FileWrapper;

impl ProjectOutline {
    /// Returns the wrapper representing `item`, computing it if there is no
    /// live cached wrapper or the item is dirty.
    ///
    /// Only a weak reference is cached: the returned wrapper is owned by the
    /// caller, usually the composite of the parent or the document.
    /// Transparent items yield a directory of the entries they contribute to
    /// their parent.
    pub fn container_handle(&mut self, item: ItemId) -> Result<Rc<FileWrapper>, OutlineError> {
        if let Some(cached) = self.item(item).cached_wrapper() {
            trace!("Reusing cached wrapper of {}", item);
            return Ok(cached);
        }

        let wrapper = match self.tag(item) {
            ItemTag::File => self.file_wrapper(item)?,
            _ => {
                let children = self.children(item).to_vec();
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    parts.push((child, self.container_handle(child)?));
                }
                self.assemble(item, parts)?
            }
        };
        self.item_mut(item).materialized = Rc::downgrade(&wrapper);
        Ok(wrapper)
    }

    /// Returns a freshly built wrapper if `item` is dirty and `None`
    /// otherwise. Afterwards `item` and every descendant are clean, so
    /// discarding the returned wrapper discards the changes made since the
    /// last update.
    ///
    /// Only dirty branches are rebuilt; clean children contribute their
    /// cached wrappers.
    pub fn updated_container_if_dirty(
        &mut self,
        item: ItemId,
    ) -> Result<Option<Rc<FileWrapper>>, OutlineError> {
        if !self.is_dirty(item) {
            return Ok(None);
        }

        let wrapper = match self.tag(item) {
            ItemTag::File => self.file_wrapper(item)?,
            _ => {
                let children = self.children(item).to_vec();
                let mut parts = Vec::with_capacity(children.len());
                let mut updated = 0;
                for child in children {
                    let wrapper = match self.updated_container_if_dirty(child)? {
                        Some(wrapper) => {
                            updated += 1;
                            wrapper
                        }
                        None => self.container_handle(child)?,
                    };
                    parts.push((child, wrapper));
                }
                debug!(
                    "Rebuilding '{}' with {} of {} children updated",
                    self.relative_path(item),
                    updated,
                    parts.len()
                );
                self.assemble(item, parts)?
            }
        };
        self.item_mut(item).mark_clean(&wrapper);
        Ok(Some(wrapper))
    }

    fn file_wrapper(&self, item: ItemId) -> Result<Rc<FileWrapper>, OutlineError> {
        if let Some(contents) = self.item(item).contents() {
            return Ok(Rc::new(FileWrapper::regular(contents)));
        }

        let path = self.file_name(item);
        let backing = self
            .document()
            .and_then(|document| document.entry_at_path(&path))
            .filter(|entry| !entry.is_directory())
            .cloned();
        backing.context(MissingBackingDataSnafu { path })
    }

    /// Builds the directory for `item` out of its children's wrappers, in
    /// display order.
    fn assemble(
        &self,
        item: ItemId,
        parts: Vec<(ItemId, Rc<FileWrapper>)>,
    ) -> Result<Rc<FileWrapper>, OutlineError> {
        let mut entries = LinkedHashMap::new();
        for (child, wrapper) in parts {
            let child_item = self.item(child);
            if child_item.tag().is_transparent() {
                for (name, entry) in wrapper.entries().into_iter().flatten() {
                    self.add_entry(&mut entries, item, name.clone(), entry.clone())?;
                }
            } else {
                self.add_entry(&mut entries, item, child_item.identifier().to_string(), wrapper)?;
            }
        }
        Ok(Rc::new(FileWrapper::Directory { entries }))
    }

    fn add_entry(
        &self,
        entries: &mut LinkedHashMap<String, Rc<FileWrapper>>,
        owner: ItemId,
        name: String,
        wrapper: Rc<FileWrapper>,
    ) -> Result<(), OutlineError> {
        ensure!(
            !entries.contains_key(&name),
            ConflictingEntrySnafu {
                path: self.file_name(owner).join(&name),
            }
        );
        entries.insert(name, wrapper);
        Ok(())
    }
}
