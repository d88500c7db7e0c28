//! Resolved internal fixups, keyed by the object whose bytes carry the
//! relocation site.
//!
//! The loader is the only producer of this map: it walks the fixup page and
//! record tables (`exe386::fpagetab`, `exe386::frectab`), keeps only fixups
//! whose target is [`FixupTarget::Internal`](crate::exe386::frectab::FixupTarget::Internal),
//! and turns each into an absolute `(object_index, source_offset) -> target_address`
//! entry here. Imported fixups (ordinal/name/entry-table targets) never reach
//! this structure — the driver has no use for them.
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct FixupMap {
    by_object: BTreeMap<u16, BTreeMap<u32, u32>>,
    all_targets: BTreeSet<u32>,
}

impl FixupMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object_index: u16, source_offset: u32, target_address: u32) {
        self.by_object
            .entry(object_index)
            .or_default()
            .insert(source_offset, target_address);
        self.all_targets.insert(target_address);
    }

    pub fn target_at(&self, object_index: u16, source_offset: u32) -> Option<u32> {
        self.by_object
            .get(&object_index)
            .and_then(|m| m.get(&source_offset))
            .copied()
    }

    pub fn offsets_in(&self, object_index: u16) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.by_object
            .get(&object_index)
            .into_iter()
            .flat_map(|m| m.iter().map(|(&off, &target)| (off, target)))
    }

    pub fn is_target(&self, address: u32) -> bool {
        self.all_targets.contains(&address)
    }

    pub fn targets(&self) -> impl Iterator<Item = u32> + '_ {
        self.all_targets.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.by_object.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_lookup_roundtrips() {
        let mut map = FixupMap::new();
        map.insert(1, 0x100, 0x20000);
        map.insert(1, 0x200, 0x20004);
        map.insert(2, 0x10, 0x30000);

        assert_eq!(map.target_at(1, 0x100), Some(0x20000));
        assert_eq!(map.target_at(1, 0x200), Some(0x20004));
        assert_eq!(map.target_at(2, 0x10), Some(0x30000));
        assert_eq!(map.target_at(1, 0x999), None);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn is_target_reflects_the_global_target_set() {
        let mut map = FixupMap::new();
        map.insert(1, 0x100, 0x20000);
        assert!(map.is_target(0x20000));
        assert!(!map.is_target(0x100));
    }

    #[test]
    fn offsets_in_filters_by_object() {
        let mut map = FixupMap::new();
        map.insert(1, 0x100, 0x20000);
        map.insert(2, 0x10, 0x30000);
        let offsets: Vec<_> = map.offsets_in(1).collect();
        assert_eq!(offsets, vec![(0x100, 0x20000)]);
    }
}
