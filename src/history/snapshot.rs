use crate::models::chat::{ ConversationIndex, ConversationSummary, Role, Turn };
use chrono::{ Local, NaiveDateTime };
use serde::de::{ MapAccess, Visitor };
use serde::{ Deserialize, Deserializer, Serialize, Serializer };
use serde_json::ser::{ Formatter, PrettyFormatter };
use std::fmt;
use std::io;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Every conversation the store knows about, keyed by id.
///
/// Keys keep the order in which conversations were first seen so that a
/// rewrite of an existing file never shuffles it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<(String, Vec<Turn>)>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, conversation_id: &str) -> Option<&[Turn]> {
        self.entries
            .iter()
            .find(|(id, _)| id == conversation_id)
            .map(|(_, turns)| turns.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Turn])> {
        self.entries.iter().map(|(id, turns)| (id.as_str(), turns.as_slice()))
    }

    /// Appends a turn stamped with the current local time, creating the
    /// conversation when the id is new.
    pub fn push(&mut self, conversation_id: &str, role: Role, content: &str) -> &Turn {
        let now = Local::now().naive_local();
        self.push_at(conversation_id, role, content, now)
    }

    pub(crate) fn push_at(
        &mut self,
        conversation_id: &str,
        role: Role,
        content: &str,
        now: NaiveDateTime
    ) -> &Turn {
        let index = match self.entries.iter().position(|(id, _)| id == conversation_id) {
            Some(index) => index,
            None => {
                self.entries.push((conversation_id.to_string(), Vec::new()));
                self.entries.len() - 1
            }
        };

        let turns = &mut self.entries[index].1;
        let timestamp = next_timestamp(turns.last().map(|t| t.timestamp.as_str()), now);
        turns.push(Turn {
            role,
            content: content.to_string(),
            timestamp,
        });
        &turns[turns.len() - 1]
    }

    /// Pretty JSON with 2-space indent and every non-ASCII character written
    /// as a `\uXXXX` escape, the layout existing history files already use.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut body = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut body,
            AsciiFormatter::new()
        );
        self.serialize(&mut serializer)?;
        Ok(body)
    }

    pub fn summaries(&self) -> ConversationIndex {
        ConversationIndex(
            self.iter()
                .map(|(id, turns)| ConversationSummary::from_turns(id, turns))
                .collect()
        )
    }
}

// The clock may step backwards; a conversation's timestamps must not.
fn next_timestamp(last: Option<&str>, now: NaiveDateTime) -> String {
    if let Some(last) = last {
        if let Ok(previous) = NaiveDateTime::parse_from_str(last, TIMESTAMP_FORMAT) {
            if previous > now {
                return last.to_string();
            }
        }
    }
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// `PrettyFormatter` that escapes everything outside printable ASCII.
struct AsciiFormatter<'a> {
    pretty: PrettyFormatter<'a>,
}

impl<'a> AsciiFormatter<'a> {
    fn new() -> Self {
        Self { pretty: PrettyFormatter::with_indent(b"  ") }
    }
}

impl<'a> Formatter for AsciiFormatter<'a> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool
    ) -> io::Result<()> {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool
    ) -> io::Result<()> {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str
    ) -> io::Result<()> {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if (ch as u32) < 0x7f {
                continue;
            }
            writer.write_all(fragment[start..index].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = index + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(id, turns)| (id, turns)))
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> Visitor<'de> for SnapshotVisitor {
            type Value = Snapshot;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping conversation ids to lists of messages")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Snapshot, A::Error> {
                let mut entries: Vec<(String, Vec<Turn>)> = Vec::new();
                while let Some((id, turns)) = map.next_entry::<String, Vec<Turn>>()? {
                    match entries.iter_mut().find(|(existing, _)| *existing == id) {
                        Some(slot) => {
                            slot.1 = turns;
                        }
                        None => entries.push((id, turns)),
                    }
                }
                Ok(Snapshot { entries })
            }
        }

        deserializer.deserialize_map(SnapshotVisitor)
    }
}
