//! Named or auto-named addresses, one per interesting location, with a
//! stickiness rule that protects function labels and explicit names from
//! being overwritten by a weaker guess.
//!
//! Grounded in `label.cpp`'s `Label`/`LabelMap`.
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LabelType {
    Unknown,
    Jump,
    Data,
    Vtable,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub address: u32,
    pub label_type: LabelType,
    pub name: Option<String>,
}

impl Label {
    pub fn new(address: u32, label_type: LabelType) -> Self {
        Self {
            address,
            label_type,
            name: None,
        }
    }

    pub fn named(address: u32, label_type: LabelType, name: impl Into<String>) -> Self {
        Self {
            address,
            label_type,
            name: Some(name.into()),
        }
    }

    fn default_prefix(&self) -> &'static str {
        match self.label_type {
            LabelType::Function => "func_",
            LabelType::Jump => "jump_",
            LabelType::Data => "data_",
            LabelType::Vtable => "vtable_",
            LabelType::Unknown => "unknown_",
        }
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}{:x}", self.default_prefix(), self.address),
        }
    }

    /// A label is "sticky" once it is a named function: neither its type
    /// nor its name may be downgraded by a later, weaker guess.
    fn is_sticky(&self) -> bool {
        self.label_type == LabelType::Function || self.name.is_some()
    }
}

#[derive(Debug, Default)]
pub struct LabelMap {
    labels: BTreeMap<u32, Label>,
}

impl LabelMap {
    pub fn new() -> Self {
        Self {
            labels: BTreeMap::new(),
        }
    }

    pub fn get(&self, addr: u32) -> Option<&Label> {
        self.labels.get(&addr)
    }

    /// Inserts or upgrades the label at `label.address`. Suppressed silently
    /// if an existing label there is sticky ([`Label::is_sticky`]) — the
    /// incoming label's own type or name never factors in.
    pub fn set(&mut self, label: Label) {
        match self.labels.get(&label.address) {
            Some(existing) if existing.is_sticky() => {}
            _ => {
                self.labels.insert(label.address, label);
            }
        }
    }

    pub fn remove(&mut self, addr: u32) -> Option<Label> {
        self.labels.remove(&addr)
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.labels.contains_key(&addr)
    }

    pub fn next_after(&self, addr: u32) -> Option<&Label> {
        self.labels
            .range((Bound::Excluded(addr), Bound::Unbounded))
            .next()
            .map(|(_, l)| l)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.values()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_uses_type_prefix_and_hex_address() {
        let label = Label::new(0x1000, LabelType::Jump);
        assert_eq!(label.display_name(), "jump_1000");
    }

    #[test]
    fn explicit_name_wins_over_default() {
        let label = Label::named(0x1000, LabelType::Function, "main");
        assert_eq!(label.display_name(), "main");
    }

    #[test]
    fn function_label_is_not_overwritten_by_jump_guess() {
        let mut map = LabelMap::new();
        map.set(Label::new(0x2000, LabelType::Function));
        map.set(Label::new(0x2000, LabelType::Jump));
        assert_eq!(map.get(0x2000).unwrap().label_type, LabelType::Function);
    }

    #[test]
    fn named_label_keeps_its_name_against_weaker_unnamed_guess() {
        let mut map = LabelMap::new();
        map.set(Label::named(0x2000, LabelType::Data, "g_counter"));
        map.set(Label::new(0x2000, LabelType::Data));
        assert_eq!(map.get(0x2000).unwrap().name.as_deref(), Some("g_counter"));
    }

    #[test]
    fn named_data_label_is_not_overwritten_by_function_guess() {
        let mut map = LabelMap::new();
        map.set(Label::named(0x2000, LabelType::Data, "g_table"));
        map.set(Label::new(0x2000, LabelType::Function));
        let label = map.get(0x2000).unwrap();
        assert_eq!(label.label_type, LabelType::Data);
        assert_eq!(label.name.as_deref(), Some("g_table"));
    }

    #[test]
    fn unknown_label_can_be_upgraded_to_function() {
        let mut map = LabelMap::new();
        map.set(Label::new(0x3000, LabelType::Unknown));
        map.set(Label::new(0x3000, LabelType::Function));
        assert_eq!(map.get(0x3000).unwrap().label_type, LabelType::Function);
    }

    #[test]
    fn next_after_finds_closest_following_label() {
        let mut map = LabelMap::new();
        map.set(Label::new(0x1000, LabelType::Data));
        map.set(Label::new(0x1100, LabelType::Data));
        assert_eq!(map.next_after(0x1000).unwrap().address, 0x1100);
        assert!(map.next_after(0x1100).is_none());
    }
}
