//! Instrument map builder.
//!
//! Walks parsed records in order and assigns every region to the MIDI notes it
//! covers, grouped by the `group_label` of the enclosing `<group>`.
//!
//! A region with `lokey`, `hikey` and `pitch_keycenter` is expanded to one
//! attribute set per note in `lokey..=hikey`, with `tune` offset by 100 cents
//! per semitone away from the key center. A region with only
//! `pitch_keycenter` is mapped to that single note unchanged. Any other region
//! is ignored.

use crate::parser::path_utils::join_sample_path;
use crate::parser::{AttributeSet, Header, HeaderKind, Record, Value};
use crate::types::{InstrumentMap, NoteSlots, NOTE_COUNT};

const DEFAULT_GROUP_LABEL: &str = "default";
const UNLABELED_GROUP: &str = "group";
const CENTS_PER_SEMITONE: i64 = 100;

const LOKEY: &str = "lokey";
const HIKEY: &str = "hikey";
const PITCH_KEYCENTER: &str = "pitch_keycenter";

/// Build an instrument map from parsed records.
///
/// Groups that end up without any mapped note are left out.
pub fn build(records: &[Record]) -> InstrumentMap {
    let mut builder = MapBuilder::new();
    for record in records {
        if let Record::Header(header) = record {
            builder.header(header);
        }
    }
    let map = builder.finish();
    log::debug!("Built instrument map with {} groups", map.len());
    map
}

struct MapBuilder {
    map: InstrumentMap,
    group: Header,
    group_used: bool,
    slots: NoteSlots,
    default_path: String,
}

impl MapBuilder {
    fn new() -> Self {
        let mut group = Header::new(Some(HeaderKind::Group));
        group.add_attribute("group_label", Value::String(DEFAULT_GROUP_LABEL.to_string()));
        Self {
            map: InstrumentMap::new(),
            group,
            group_used: false,
            slots: NoteSlots::new(),
            default_path: String::new(),
        }
    }

    fn header(&mut self, header: &Header) {
        match header.kind {
            Some(HeaderKind::Control) => {
                if let Some(path) = header.get("default_path") {
                    self.default_path = path.to_string();
                }
            }
            Some(HeaderKind::Group) => {
                self.commit_group();
                self.group = header.clone();
            }
            Some(HeaderKind::Region) => self.region(header),
            _ => {}
        }
    }

    fn commit_group(&mut self) {
        let slots = std::mem::take(&mut self.slots);
        if self.group_used {
            let label = self
                .group
                .get("group_label")
                .map_or_else(|| UNLABELED_GROUP.to_string(), Value::to_string);
            log::trace!("Group \"{}\" maps {} notes", label, slots.occupied_notes().count());
            self.map.insert(label, slots);
        }
        self.group_used = false;
    }

    fn region(&mut self, region: &Header) {
        let Some(center) = region.get(PITCH_KEYCENTER) else {
            log::trace!("Skipping region without {}", PITCH_KEYCENTER);
            return;
        };
        let Some(center) = note_number(center) else {
            log::warn!("Skipping region with invalid {} \"{}\"", PITCH_KEYCENTER, center);
            return;
        };

        match (region.get(LOKEY), region.get(HIKEY)) {
            (Some(lo), Some(hi)) => match (note_number(lo), note_number(hi)) {
                (Some(lo), Some(hi)) => self.key_range(region, lo, hi, center),
                _ => log::warn!("Skipping region with invalid key range {}..{}", lo, hi),
            },
            _ => {
                let mut attributes = region.attributes.clone();
                self.rewrite_sample(&mut attributes);
                self.push(center, attributes);
            }
        }
    }

    fn key_range(&mut self, region: &Header, lo: i64, hi: i64, center: i64) {
        let first = lo.max(0);
        let last = hi.min(NOTE_COUNT as i64 - 1);
        if first > last {
            log::warn!("Skipping region with key range {}..{} outside the MIDI range", lo, hi);
            return;
        }
        if (first, last) != (lo, hi) {
            log::warn!("Clamping key range {}..{} to {}..{}", lo, hi, first, last);
        }

        for note in first..=last {
            let mut attributes: AttributeSet = region
                .attributes
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), LOKEY | HIKEY | PITCH_KEYCENTER))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            let Some(tune) = tuned(attributes.get("tune"), note, center) else {
                log::warn!("Skipping note {}: tune offset from key center {} overflows", note, center);
                continue;
            };
            attributes.insert("tune".to_string(), tune);

            self.rewrite_sample(&mut attributes);
            self.push(note, attributes);
        }
    }

    fn rewrite_sample(&self, attributes: &mut AttributeSet) {
        if let Some(sample) = attributes.get_mut("sample") {
            *sample = Value::String(join_sample_path(&self.default_path, &sample.to_string()));
        }
    }

    fn push(&mut self, note: i64, attributes: AttributeSet) {
        match u8::try_from(note) {
            Ok(n) if (n as usize) < NOTE_COUNT => {
                self.slots.push(n, attributes);
                self.group_used = true;
            }
            _ => log::warn!("Skipping note {} outside the MIDI range", note),
        }
    }

    fn finish(mut self) -> InstrumentMap {
        self.commit_group();
        self.map
    }
}

/// `tune` shifted by 100 cents per semitone from `center` to `note`.
///
/// `None` if an integer result does not fit in `i64`.
fn tuned(tune: Option<&Value>, note: i64, center: i64) -> Option<Value> {
    let offset = note
        .checked_sub(center)?
        .checked_mul(CENTS_PER_SEMITONE)?;
    let tune = match tune {
        None => Value::Int(offset),
        Some(Value::Int(tune)) => Value::Int(tune.checked_add(offset)?),
        Some(Value::Float(tune)) => Value::Float(tune + offset as f64),
        Some(Value::String(tune)) => {
            log::warn!("Ignoring non-numeric tune \"{}\"", tune);
            Value::Int(offset)
        }
    };
    Some(tune)
}

/// MIDI note number of a key opcode value.
///
/// Accepts integers, integral floats and note names such as `c4`, `F#3` or
/// `eb-1`, with middle C (`c4`) at 60.
pub fn note_number(value: &Value) -> Option<i64> {
    match value {
        Value::String(name) => parse_note_name(name),
        other => other.as_i64(),
    }
}

fn parse_note_name(name: &str) -> Option<i64> {
    let mut chars = name.trim().chars().peekable();

    let base = match chars.next()?.to_ascii_lowercase() {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };

    let mut accidental = 0;
    while let Some(&c) = chars.peek() {
        match c {
            '#' => accidental += 1,
            'b' => accidental -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave: i64 = chars.collect::<String>().parse().ok()?;
    octave
        .checked_add(1)?
        .checked_mul(12)?
        .checked_add(base + accidental)
}
