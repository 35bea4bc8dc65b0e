//! Tag-Length-Value triples.
//!
//! TLVs are OSCAR's extensibility primitive: `{tag u16, length u16, value}`.
//! Depending on the containing SNAC, a block of TLVs is either read to the
//! end of the buffer or preceded by an explicit count.

use crate::codec::{Reader, Writer};
use crate::Result;

/// One Tag-Length-Value triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    /// Tag identifying the value's meaning within the containing SNAC.
    pub tag: u16,
    /// Raw value bytes.
    pub value: Vec<u8>,
}

impl Tlv {
    /// A TLV with raw bytes.
    pub fn new(tag: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// A TLV holding a single byte.
    pub fn u8(tag: u16, v: u8) -> Self {
        Self::new(tag, vec![v])
    }

    /// A TLV holding a big-endian u16.
    pub fn u16(tag: u16, v: u16) -> Self {
        Self::new(tag, v.to_be_bytes().to_vec())
    }

    /// A TLV holding a big-endian u32.
    pub fn u32(tag: u16, v: u32) -> Self {
        Self::new(tag, v.to_be_bytes().to_vec())
    }

    /// A TLV holding a UTF-8 string, no length prefix inside the value.
    pub fn string(tag: u16, v: &str) -> Self {
        Self::new(tag, v.as_bytes().to_vec())
    }

    /// Append this TLV to a writer.
    pub fn encode(&self, w: &mut Writer) {
        w.u16(self.tag);
        w.u16(self.value.len() as u16);
        w.bytes(&self.value);
    }

    /// Read one TLV.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let tag = r.u16()?;
        let len = r.u16()? as usize;
        let value = r.take(len)?.to_vec();
        Ok(Self { tag, value })
    }
}

/// An ordered collection of TLVs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvBlock {
    /// The TLVs, in wire order.
    pub tlvs: Vec<Tlv>,
}

impl TlvBlock {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of TLVs in the block.
    pub fn len(&self) -> usize {
        self.tlvs.len()
    }

    /// True when the block has no TLVs.
    pub fn is_empty(&self) -> bool {
        self.tlvs.is_empty()
    }

    /// Append a TLV.
    pub fn push(&mut self, tlv: Tlv) {
        self.tlvs.push(tlv);
    }

    /// True when a TLV with `tag` is present.
    pub fn has(&self, tag: u16) -> bool {
        self.tlvs.iter().any(|t| t.tag == tag)
    }

    /// The first value with `tag`, as raw bytes.
    pub fn bytes(&self, tag: u16) -> Option<&[u8]> {
        self.tlvs
            .iter()
            .find(|t| t.tag == tag)
            .map(|t| t.value.as_slice())
    }

    /// The first value with `tag`, as a big-endian u16.
    pub fn u16(&self, tag: u16) -> Option<u16> {
        let v = self.bytes(tag)?;
        (v.len() == 2).then(|| u16::from_be_bytes([v[0], v[1]]))
    }

    /// The first value with `tag`, as a big-endian u32.
    pub fn u32(&self, tag: u16) -> Option<u32> {
        let v = self.bytes(tag)?;
        (v.len() == 4).then(|| u32::from_be_bytes([v[0], v[1], v[2], v[3]]))
    }

    /// The first value with `tag`, as a UTF-8 string.
    pub fn string(&self, tag: u16) -> Option<String> {
        self.bytes(tag)
            .and_then(|v| String::from_utf8(v.to_vec()).ok())
    }

    /// Drop every TLV with `tag`.
    pub fn remove(&mut self, tag: u16) {
        self.tlvs.retain(|t| t.tag != tag);
    }

    /// Encode as a plain concatenation (no count prefix).
    pub fn encode(&self, w: &mut Writer) {
        for tlv in &self.tlvs {
            tlv.encode(w);
        }
    }

    /// Encode to a standalone byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode(&mut w);
        w.into_vec()
    }

    /// Decode TLVs until the reader is exhausted.
    pub fn decode_all(r: &mut Reader<'_>) -> Result<Self> {
        let mut block = Self::new();
        while !r.is_empty() {
            block.push(Tlv::decode(r)?);
        }
        Ok(block)
    }

    /// Decode exactly `count` TLVs.
    pub fn decode_counted(r: &mut Reader<'_>, count: usize) -> Result<Self> {
        let mut block = Self::new();
        for _ in 0..count {
            block.push(Tlv::decode(r)?);
        }
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tlv_roundtrip() {
        let mut w = Writer::new();
        Tlv::u16(0x0001, 0x0040).encode(&mut w);
        Tlv::string(0x0002, "alice").encode(&mut w);
        let buf = w.into_vec();

        let mut r = Reader::new(&buf);
        let block = TlvBlock::decode_all(&mut r).expect("decode");
        assert_eq!(block.len(), 2);
        assert_eq!(block.u16(0x0001), Some(0x0040));
        assert_eq!(block.string(0x0002).as_deref(), Some("alice"));
    }

    #[test]
    fn test_counted_decode_leaves_trailing_bytes() {
        let mut w = Writer::new();
        Tlv::u8(0x0001, 7).encode(&mut w);
        w.u32(0xDEAD_BEEF);
        let buf = w.into_vec();

        let mut r = Reader::new(&buf);
        let block = TlvBlock::decode_counted(&mut r, 1).expect("decode");
        assert_eq!(block.len(), 1);
        assert_eq!(r.u32().expect("trailing"), 0xDEAD_BEEF);
    }

    #[test]
    fn test_remove_and_has() {
        let mut block = TlvBlock::new();
        block.push(Tlv::u8(0x0003, 1));
        block.push(Tlv::u8(0x000B, 2));
        assert!(block.has(0x0003));
        block.remove(0x0003);
        assert!(!block.has(0x0003));
        assert!(block.has(0x000B));
    }

    #[test]
    fn test_truncated_tlv_errors() {
        let buf = [0x00, 0x01, 0x00, 0x05, 0xAA];
        let mut r = Reader::new(&buf);
        assert!(Tlv::decode(&mut r).is_err());
    }
}
