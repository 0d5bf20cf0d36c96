//! Instrument map types.

use indexmap::IndexMap;
use serde::Serialize;

use crate::parser::AttributeSet;

/// Number of MIDI notes, and of slots in every group.
pub const NOTE_COUNT: usize = 128;

/// The attribute sets playable on each MIDI note of one group.
///
/// Always holds exactly [`NOTE_COUNT`] slots; unmapped notes are empty.
/// Serializes as a plain array of arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NoteSlots(Vec<Vec<AttributeSet>>);

impl NoteSlots {
    pub fn new() -> Self {
        Self(vec![Vec::new(); NOTE_COUNT])
    }

    /// Attribute sets mapped to `note`, in the order their regions appeared.
    pub fn note(&self, note: u8) -> &[AttributeSet] {
        self.0.get(note as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn push(&mut self, note: u8, attributes: AttributeSet) {
        if let Some(slot) = self.0.get_mut(note as usize) {
            slot.push(attributes);
        }
    }

    /// Notes with at least one attribute set, ascending.
    pub fn occupied_notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_empty())
            .map(|(note, _)| note as u8)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Vec::is_empty)
    }

    pub fn as_slice(&self) -> &[Vec<AttributeSet>] {
        &self.0
    }
}

impl Default for NoteSlots {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiled instrument: group label to note slots.
///
/// Groups appear in the order they were closed in the source. A label used by
/// more than one group keeps its first position and the slots of the last one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InstrumentMap {
    groups: IndexMap<String, NoteSlots>,
}

impl InstrumentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<&NoteSlots> {
        self.groups.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NoteSlots)> {
        self.groups.iter().map(|(label, slots)| (label.as_str(), slots))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub(crate) fn insert(&mut self, label: String, slots: NoteSlots) {
        if self.groups.insert(label.clone(), slots).is_some() {
            log::warn!("Group label \"{}\" used more than once; keeping the last group", label);
        }
    }
}
