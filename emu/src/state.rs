//! # Save states
//!
//! Devices register their stateful fields by walking them with a
//! [`StateVisitor`]. The same walk serves saving, restoring and tooling that
//! only wants to list names and sizes, so a field can't be saved but
//! forgotten on restore.
//!
//! ```text
//!   device.visit_state(v) ──▶ v.item("pc", &mut self.pc)
//!                          ──▶ v.item("regs", &mut self.regs)
//!                          ...
//! ```
//!
//! Entry names are prefixed with the tag the owner picked for the device
//! (`maincpu/pc`). [`SaveState`] is serde-serializable, so the owning system
//! decides the on-disk format.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A field that can be flattened into little-endian bytes.
pub trait StateItem {
    fn size(&self) -> usize;

    fn save(&self, out: &mut Vec<u8>);

    /// `bytes` is exactly [`size`](Self::size) long.
    fn load(&mut self, bytes: &[u8]);
}

macro_rules! impl_state_item {
    ($($ty:ty),*) => {
        $(
            impl StateItem for $ty {
                fn size(&self) -> usize {
                    size_of::<$ty>()
                }

                fn save(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn load(&mut self, bytes: &[u8]) {
                    let mut raw = [0_u8; size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    *self = <$ty>::from_le_bytes(raw);
                }
            }
        )*
    };
}

impl_state_item!(u8, u16, u32, u64, i8, i16, i32, i64);

impl StateItem for bool {
    fn size(&self) -> usize {
        1
    }

    fn save(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn load(&mut self, bytes: &[u8]) {
        *self = bytes[0] != 0;
    }
}

impl<T: StateItem + Default> StateItem for Option<T> {
    fn size(&self) -> usize {
        1 + T::default().size()
    }

    fn save(&self, out: &mut Vec<u8>) {
        out.push(u8::from(self.is_some()));
        match self {
            Some(value) => value.save(out),
            None => T::default().save(out),
        }
    }

    fn load(&mut self, bytes: &[u8]) {
        let mut value = T::default();
        value.load(&bytes[1..]);
        *self = (bytes[0] != 0).then_some(value);
    }
}

fn save_elements<T: StateItem>(items: &[T], out: &mut Vec<u8>) {
    for item in items {
        item.save(out);
    }
}

fn load_elements<T: StateItem>(items: &mut [T], bytes: &[u8]) {
    let mut offset = 0;
    for item in items {
        let size = item.size();
        item.load(&bytes[offset..offset + size]);
        offset += size;
    }
}

impl<T: StateItem, const N: usize> StateItem for [T; N] {
    fn size(&self) -> usize {
        self.iter().map(StateItem::size).sum()
    }

    fn save(&self, out: &mut Vec<u8>) {
        save_elements(self, out);
    }

    fn load(&mut self, bytes: &[u8]) {
        load_elements(self, bytes);
    }
}

/// Vectors keep the length they were allocated with at start; only the
/// contents are saved.
impl<T: StateItem> StateItem for Vec<T> {
    fn size(&self) -> usize {
        self.iter().map(StateItem::size).sum()
    }

    fn save(&self, out: &mut Vec<u8>) {
        save_elements(self, out);
    }

    fn load(&mut self, bytes: &[u8]) {
        load_elements(self, bytes);
    }
}

pub trait StateVisitor {
    fn item(&mut self, name: &str, item: &mut dyn StateItem);
}

pub trait Stateful {
    fn visit_state(&mut self, visitor: &mut dyn StateVisitor);
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("state entry '{0}' is missing")]
    MissingEntry(String),

    #[error("state entry '{name}' holds {actual} bytes, expected {expected}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    entries: Vec<StateEntry>,
}

fn qualified(tag: &str, name: &str) -> String {
    format!("{tag}/{name}")
}

struct Capture<'a> {
    tag: &'a str,
    state: &'a mut SaveState,
}

impl StateVisitor for Capture<'_> {
    fn item(&mut self, name: &str, item: &mut dyn StateItem) {
        let mut bytes = Vec::with_capacity(item.size());
        item.save(&mut bytes);
        self.state.insert(qualified(self.tag, name), bytes);
    }
}

struct Validate<'a> {
    tag: &'a str,
    state: &'a SaveState,
    error: Option<StateError>,
}

impl StateVisitor for Validate<'_> {
    fn item(&mut self, name: &str, item: &mut dyn StateItem) {
        if self.error.is_some() {
            return;
        }

        let name = qualified(self.tag, name);
        self.error = match self.state.get(&name) {
            None => Some(StateError::MissingEntry(name)),
            Some(bytes) if bytes.len() != item.size() => Some(StateError::SizeMismatch {
                name,
                expected: item.size(),
                actual: bytes.len(),
            }),
            Some(_) => None,
        };
    }
}

struct Restore<'a> {
    tag: &'a str,
    state: &'a SaveState,
}

impl StateVisitor for Restore<'_> {
    fn item(&mut self, name: &str, item: &mut dyn StateItem) {
        // Already validated.
        if let Some(bytes) = self.state.get(&qualified(self.tag, name)) {
            item.load(bytes);
        }
    }
}

impl SaveState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves every registered field of `device` under `tag`, replacing
    /// entries with the same name.
    pub fn capture(&mut self, tag: &str, device: &mut dyn Stateful) {
        device.visit_state(&mut Capture { tag, state: self });
    }

    /// Restores `device` from the entries saved under `tag`. Nothing is
    /// written unless every field is present with the right size.
    pub fn restore(&self, tag: &str, device: &mut dyn Stateful) -> Result<(), StateError> {
        let mut validate = Validate {
            tag,
            state: self,
            error: None,
        };
        device.visit_state(&mut validate);
        if let Some(error) = validate.error {
            return Err(error);
        }

        device.visit_state(&mut Restore { tag, state: self });
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.bytes.as_slice())
    }

    /// Name and size of every entry, in registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries
            .iter()
            .map(|entry| (entry.name.as_str(), entry.bytes.len()))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, name: String, bytes: Vec<u8>) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.bytes = bytes,
            None => self.entries.push(StateEntry { name, bytes }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default, Debug, PartialEq)]
    struct Toy {
        pc: u32,
        flag: bool,
        regs: [u16; 4],
        ram: Vec<u8>,
        next: Option<u32>,
    }

    impl Stateful for Toy {
        fn visit_state(&mut self, visitor: &mut dyn StateVisitor) {
            visitor.item("pc", &mut self.pc);
            visitor.item("flag", &mut self.flag);
            visitor.item("regs", &mut self.regs);
            visitor.item("ram", &mut self.ram);
            visitor.item("next", &mut self.next);
        }
    }

    fn toy() -> Toy {
        Toy {
            pc: 0x1234,
            flag: true,
            regs: [1, 2, 3, 0xFFFF],
            ram: vec![9; 8],
            next: Some(0x40),
        }
    }

    #[test]
    fn check_capture_then_restore() {
        let mut original = toy();
        let mut state = SaveState::new();
        state.capture("cpu", &mut original);

        let mut other = Toy {
            ram: vec![0; 8],
            ..Toy::default()
        };
        state.restore("cpu", &mut other).unwrap();

        assert_eq!(other, original);
    }

    #[test]
    fn check_entries_are_introspectable() {
        let mut state = SaveState::new();
        state.capture("cpu", &mut toy());

        let entries: Vec<_> = state.entries().collect();
        assert_eq!(
            entries,
            vec![
                ("cpu/pc", 4),
                ("cpu/flag", 1),
                ("cpu/regs", 8),
                ("cpu/ram", 8),
                ("cpu/next", 5),
            ]
        );
        assert_eq!(state.get("cpu/pc"), Some([0x34, 0x12, 0, 0].as_slice()));
    }

    #[test]
    fn check_capture_replaces_entries() {
        let mut device = toy();
        let mut state = SaveState::new();
        state.capture("cpu", &mut device);
        device.pc = 7;
        state.capture("cpu", &mut device);

        assert_eq!(state.len(), 5);
        assert_eq!(state.get("cpu/pc"), Some([7, 0, 0, 0].as_slice()));
    }

    #[test]
    fn check_restore_missing_entry() {
        let mut state = SaveState::new();
        state.capture("cpu", &mut toy());

        let mut other = toy();
        assert_eq!(
            state.restore("dsp", &mut other),
            Err(StateError::MissingEntry("dsp/pc".to_string()))
        );
    }

    #[test]
    fn check_restore_is_all_or_nothing() {
        let mut state = SaveState::new();
        state.capture("cpu", &mut toy());

        let mut other = Toy {
            ram: vec![0; 16],
            ..Toy::default()
        };
        assert_eq!(
            state.restore("cpu", &mut other),
            Err(StateError::SizeMismatch {
                name: "cpu/ram".to_string(),
                expected: 16,
                actual: 8,
            })
        );
        // Fields before the bad one were not touched either.
        assert_eq!(other.pc, 0);
    }
}
