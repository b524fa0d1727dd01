use std::rc::{Rc, Weak};

use derive_more::Display;

use super::ItemTag;
use crate::filesystem::FileWrapper;

/// Non-owning handle to an item of a [`ProjectOutline`](super::ProjectOutline).
///
/// Handles of removed items are detected through the generation and never
/// alias a newer item occupying the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("#{index}.{generation}")]
pub struct ItemId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// One node of the project outline.
#[derive(Debug)]
pub struct OutlineItem {
    pub(crate) tag: ItemTag,
    pub(crate) identifier: String,
    pub(crate) parent: Option<ItemId>,
    pub(crate) children: Vec<ItemId>,
    /// In-memory payload of a file; `None` until supplied by the model.
    pub(crate) contents: Option<Vec<u8>>,
    pub(crate) materialized: Weak<FileWrapper>,
    pub(crate) dirty: bool,
}

impl OutlineItem {
    pub(crate) fn new(tag: ItemTag, identifier: String, parent: Option<ItemId>) -> Self {
        Self {
            tag,
            identifier,
            parent,
            children: Vec::new(),
            contents: None,
            materialized: Weak::new(),
            dirty: false,
        }
    }

    pub fn tag(&self) -> ItemTag {
        self.tag
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    pub fn contents(&self) -> Option<&[u8]> {
        self.contents.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The last materialized wrapper, if it is still alive and current.
    pub fn cached_wrapper(&self) -> Option<Rc<FileWrapper>> {
        if self.dirty {
            None
        } else {
            self.materialized.upgrade()
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
        self.materialized = Weak::new();
    }

    pub(crate) fn mark_clean(&mut self, wrapper: &Rc<FileWrapper>) {
        self.dirty = false;
        self.materialized = Rc::downgrade(wrapper);
    }
}
