//! Serialized event stream and its JSON-lines byte form.
//!
//! The contract between export and import is the event sequence; the
//! byte form is one JSON object per line:
//!
//! ```text
//! {"event":"NodeStart","name":"a","type_name":"nt:unstructured","mixins":[],"identity":null}
//! {"event":"Property","name":"title","kind":"String","values":[{"type":"String","value":"Home"}],"multivalued":false}
//! {"event":"NodeEnd"}
//! ```

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::model::{Mixins, NodeId, Property, PropertyType, PropertyValues, Value};
use crate::{Error, Result};

/// One step of a serialized tree walk. Carries no link back to the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SerializedEvent {
    NodeStart {
        name: String,
        type_name: String,
        mixins: Mixins,
        /// Present only for referenceable nodes.
        identity: Option<NodeId>,
    },
    Property {
        name: String,
        kind: PropertyType,
        values: Vec<Value>,
        multivalued: bool,
    },
    NodeEnd,
}

impl SerializedEvent {
    pub fn property(property: &Property) -> Self {
        SerializedEvent::Property {
            name: property.name.clone(),
            kind: property.kind,
            values: property.values().to_vec(),
            multivalued: property.is_multi(),
        }
    }

    pub fn is_node_start(&self) -> bool {
        matches!(self, SerializedEvent::NodeStart { .. })
    }

    /// Name of the node or property this event describes.
    pub fn name(&self) -> Option<&str> {
        match self {
            SerializedEvent::NodeStart { name, .. } | SerializedEvent::Property { name, .. } => Some(name),
            SerializedEvent::NodeEnd => None,
        }
    }
}

/// Rebuild a property from a `Property` event.
///
/// Returns None for a single-valued event without a value (binary content
/// skipped at export time).
pub fn to_property(name: &str, kind: PropertyType, values: Vec<Value>, multivalued: bool) -> Option<Property> {
    let values = if multivalued {
        PropertyValues::Multi(values)
    } else {
        PropertyValues::Single(values.into_iter().next()?)
    };
    Some(Property {
        name: name.to_string(),
        kind,
        values,
    })
}

// ============================================================================
// JSON lines
// ============================================================================

/// Writes events as JSON lines.
pub struct EventWriter<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> EventWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn write(&mut self, event: &SerializedEvent) -> Result<()> {
        serde_json::to_writer(&mut self.inner, event)?;
        self.inner.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Drain an event iterator into the writer, stopping at the first error.
    pub fn write_all<I>(&mut self, events: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<SerializedEvent>>,
    {
        let before = self.written;
        for event in events {
            self.write(&event?)?;
        }
        Ok(self.written - before)
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads JSON-lines events. Blank lines are ignored.
pub struct EventReader<R: BufRead> {
    inner: R,
    line: usize,
    buf: String,
    done: bool,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, line: 0, buf: String::new(), done: false }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<SerializedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line += 1;
                    let text = self.buf.trim();
                    if text.is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(text).map_err(|e| {
                        self.done = true;
                        Error::StreamError(format!("line {}: {e}", self.line))
                    }));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
        None
    }
}
