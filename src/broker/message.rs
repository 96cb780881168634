//! Message definitions for the broker
//!
//! `Message` is the unit the broadcast core moves around. The core treats it
//! as an immutable, opaque byte payload: it never parses or validates the
//! contents. Any metadata (sender, event kind, timestamp) is encoded into the
//! payload by the publishing caller before it enters the core.
//!
//! The payload lives behind an `Arc`, so handing one message to many
//! subscribers clones a pointer rather than the bytes.

use std::borrow::Cow;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    payload: Arc<[u8]>,
}

impl Message {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        let payload: Vec<u8> = payload.into();
        Self {
            payload: payload.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as text. Invalid UTF-8 sequences are replaced.
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<Vec<u8>> for Message {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl From<String> for Message {
    fn from(payload: String) -> Self {
        Self::new(payload)
    }
}

impl From<&str> for Message {
    fn from(payload: &str) -> Self {
        Self::new(payload)
    }
}
