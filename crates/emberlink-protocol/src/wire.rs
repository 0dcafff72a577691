//! Little-endian wire primitives.
//!
//! [`WireReader`] is the only way decoders touch inbound bytes. It never
//! panics: a read past the end yields a zero value, consumes whatever was
//! left, and marks the reader truncated. Decoders therefore read their
//! layout straight through and ask the reader at the end whether the record
//! was complete.
//!
//! [`WireWriter`] builds outbound payloads over a `BytesMut`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{Guid, ProtocolError};

// ---------------------------------------------------------------------------
// Decode quality
// ---------------------------------------------------------------------------

/// Whether a decoder saw the whole layout it expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeQuality {
    /// Every field was present.
    Complete,
    /// The buffer ran out; missing fields hold defaults and partially
    /// decoded list elements were dropped.
    Truncated,
}

/// A decoded record together with its [`DecodeQuality`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub quality: DecodeQuality,
}

impl<T> Decoded<T> {
    pub fn complete(value: T) -> Self {
        Self {
            value,
            quality: DecodeQuality::Complete,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.quality == DecodeQuality::Complete
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    /// Maps the value, keeping the quality.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        Decoded {
            value: f(self.value),
            quality: self.quality,
        }
    }
}

// ---------------------------------------------------------------------------
// WireReader
// ---------------------------------------------------------------------------

/// A panic-free cursor over an inbound payload.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    truncated: bool,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            truncated: false,
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Whether any read so far ran past the end of the buffer.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Marks the record truncated without reading.
    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    pub fn quality(&self) -> DecodeQuality {
        if self.truncated {
            DecodeQuality::Truncated
        } else {
            DecodeQuality::Complete
        }
    }

    /// Wraps `value` with this reader's quality.
    pub fn finish<T>(&self, value: T) -> Decoded<T> {
        Decoded {
            value,
            quality: self.quality(),
        }
    }

    /// Returns `true` (and drains the buffer) when fewer than `need` bytes
    /// are left.
    fn short(&mut self, need: usize) -> bool {
        if self.buf.remaining() < need {
            self.truncated = true;
            self.buf = &[];
            true
        } else {
            false
        }
    }

    pub fn u8(&mut self) -> u8 {
        if self.short(1) { 0 } else { self.buf.get_u8() }
    }

    pub fn bool(&mut self) -> bool {
        self.u8() != 0
    }

    pub fn u16(&mut self) -> u16 {
        if self.short(2) { 0 } else { self.buf.get_u16_le() }
    }

    pub fn u32(&mut self) -> u32 {
        if self.short(4) { 0 } else { self.buf.get_u32_le() }
    }

    pub fn i32(&mut self) -> i32 {
        if self.short(4) { 0 } else { self.buf.get_i32_le() }
    }

    pub fn u64(&mut self) -> u64 {
        if self.short(8) { 0 } else { self.buf.get_u64_le() }
    }

    pub fn f32(&mut self) -> f32 {
        if self.short(4) { 0.0 } else { self.buf.get_f32_le() }
    }

    /// A full 8-byte GUID.
    pub fn guid(&mut self) -> Guid {
        Guid(self.u64())
    }

    /// A packed GUID: a mask byte, then one byte for each set bit, lowest
    /// bit first. Bytes whose bit is clear are zero. Running out of input
    /// keeps the bytes read so far.
    pub fn packed_guid(&mut self) -> Guid {
        if self.short(1) {
            return Guid::EMPTY;
        }
        let mask = self.buf.get_u8();
        let mut raw = 0u64;
        for i in 0..8 {
            if mask & (1 << i) == 0 {
                continue;
            }
            if self.short(1) {
                break;
            }
            raw |= u64::from(self.buf.get_u8()) << (i * 8);
        }
        Guid(raw)
    }

    /// A NUL-terminated string. A missing terminator takes the rest of the
    /// buffer; invalid UTF-8 is replaced.
    pub fn cstring(&mut self) -> String {
        if self.buf.is_empty() {
            self.truncated = true;
            return String::new();
        }
        let (raw, consumed) = match self.buf.iter().position(|&b| b == 0) {
            Some(end) => (self.buf.split_at(end).0, end + 1),
            None => (self.buf, self.buf.len()),
        };
        let text = String::from_utf8_lossy(raw).into_owned();
        self.buf.advance(consumed);
        text
    }

    /// Skips `n` bytes.
    pub fn skip(&mut self, n: usize) {
        if !self.short(n) {
            self.buf.advance(n);
        }
    }

    /// Splits off a reader over the next `n` bytes. If fewer remain, the
    /// sub-reader gets what is left and this reader is marked truncated.
    pub fn sub(&mut self, n: usize) -> WireReader<'a> {
        let take = n.min(self.buf.len());
        let (head, tail) = self.buf.split_at(take);
        self.buf = tail;
        if take < n {
            self.truncated = true;
        }
        WireReader::new(head)
    }

    /// Reads up to `count` elements, each at least `min_len` bytes.
    ///
    /// Stops early when the buffer can't hold another element. An element
    /// whose read truncated is dropped. Capacity is bounded by what the
    /// remaining bytes could hold, never by `count` alone.
    pub fn list<T>(
        &mut self,
        count: usize,
        min_len: usize,
        mut item: impl FnMut(&mut Self) -> T,
    ) -> Vec<T> {
        let min_len = min_len.max(1);
        let mut out = Vec::with_capacity(count.min(self.remaining() / min_len));
        for _ in 0..count {
            if self.remaining() < min_len {
                self.truncated = true;
                break;
            }
            let value = item(self);
            if self.truncated {
                break;
            }
            out.push(value);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// WireWriter
// ---------------------------------------------------------------------------

/// Builds a little-endian payload.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.put_u8(v);
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(u8::from(v))
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.put_u16_le(v);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.put_u32_le(v);
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.put_i32_le(v);
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.put_u64_le(v);
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.buf.put_f32_le(v);
        self
    }

    pub fn guid(&mut self, guid: Guid) -> &mut Self {
        self.u64(guid.0)
    }

    pub fn packed_guid(&mut self, guid: Guid) -> &mut Self {
        let bytes = guid.0.to_le_bytes();
        let mut mask = 0u8;
        for (i, b) in bytes.iter().enumerate() {
            if *b != 0 {
                mask |= 1 << i;
            }
        }
        self.buf.put_u8(mask);
        for b in bytes.iter().filter(|b| **b != 0) {
            self.buf.put_u8(*b);
        }
        self
    }

    /// Writes `s` followed by a NUL. Callers validate with
    /// [`check_cstring`] first when the text comes from outside.
    pub fn cstring(&mut self, s: &str) -> &mut Self {
        self.buf.put_slice(s.as_bytes());
        self.buf.put_u8(0);
        self
    }

    pub fn bytes(&mut self, raw: &[u8]) -> &mut Self {
        self.buf.put_slice(raw);
        self
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Validates a string argument destined for a NUL-terminated field.
pub fn check_cstring(field: &'static str, s: &str, max: usize) -> Result<(), ProtocolError> {
    if s.len() > max {
        return Err(ProtocolError::StringTooLong {
            field,
            len: s.len(),
            max,
        });
    }
    if s.as_bytes().contains(&0) {
        return Err(ProtocolError::EmbeddedNul(field));
    }
    Ok(())
}
