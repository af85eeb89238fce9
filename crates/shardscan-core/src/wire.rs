//! Wire form of a [`Split`] for shipment to a worker.
//!
//! Layout: one tag byte followed by the JSON body. The tag lets a decoder
//! reject payloads produced by anything other than this codec.

use crate::error::CatalogError;
use crate::split::Split;

/// Wire tag for [`Split`].
pub const WIRE_TAG_SPLIT: u8 = 0x01;

/// Serialize a split into its opaque byte form.
pub fn encode_split(split: &Split) -> Result<Vec<u8>, CatalogError> {
    let mut buf = vec![WIRE_TAG_SPLIT];
    serde_json::to_writer(&mut buf, split)?;
    Ok(buf)
}

/// Rebuild a split on the worker side. Candidate locations are derived
/// again from the decoded chunk.
pub fn decode_split(buf: &[u8]) -> Result<Split, CatalogError> {
    match buf.split_first() {
        Some((&WIRE_TAG_SPLIT, body)) => Ok(serde_json::from_slice(body)?),
        Some((tag, _)) => Err(CatalogError::Codec(format!("unknown split wire tag 0x{tag:02x}"))),
        None => Err(CatalogError::Codec("empty split payload".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkHost};

    fn replicated_split() -> Split {
        let mut chunk = Chunk::new("7");
        chunk.add_host(ChunkHost::new("10.0.0.1", "jdbc:postgresql://10.0.0.1/db7", "u", "p1", "postgres"));
        chunk.add_host(ChunkHost::new("10.0.0.2", "jdbc:postgresql://10.0.0.2/db7", "u", "p2", "postgres"));
        Split::new("uservisits", chunk)
    }

    #[test]
    fn decoded_split_matches_original() {
        let split = replicated_split();
        let restored = decode_split(&encode_split(&split).unwrap()).unwrap();

        assert_eq!(restored.relation(), "uservisits");
        assert_eq!(restored.chunk().id(), "7");
        assert_eq!(restored.locations(), split.locations());
        for ((_, a), (_, b)) in split.chunk().hosts().zip(restored.chunk().hosts()) {
            assert_eq!(a.address(), b.address());
            assert_eq!(a.url(), b.url());
            assert_eq!(a.user(), b.user());
            assert_eq!(a.password(), b.password());
            assert_eq!(a.driver(), b.driver());
        }
    }

    #[test]
    fn host_handles_survive_the_trip() {
        let split = replicated_split();
        let restored = decode_split(&encode_split(&split).unwrap()).unwrap();
        assert_eq!(
            split.chunk().host_for("10.0.0.2"),
            restored.chunk().host_for("10.0.0.2")
        );
    }

    #[test]
    fn wrong_tag_is_rejected() {
        let mut bytes = encode_split(&replicated_split()).unwrap();
        bytes[0] = 0x7f;
        let err = decode_split(&bytes).unwrap_err();
        assert!(err.to_string().contains("0x7f"));
    }

    #[test]
    fn empty_and_truncated_payloads_are_rejected() {
        assert!(decode_split(&[]).is_err());
        let bytes = encode_split(&replicated_split()).unwrap();
        assert!(decode_split(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn repeated_host_address_is_rejected() {
        let body = r#"{"relation":"uservisits","chunk":{"id":"7","hosts":[
            {"address":"10.0.0.1","url":"jdbc:postgresql://10.0.0.1/db7","user":"u","password":"p","driver":"postgres"},
            {"address":"10.0.0.1","url":"jdbc:postgresql://10.0.0.1/other","user":"u","password":"p","driver":"postgres"}]}}"#;
        let mut bytes = vec![WIRE_TAG_SPLIT];
        bytes.extend_from_slice(body.as_bytes());

        match decode_split(&bytes) {
            Err(CatalogError::Codec(msg)) => assert!(msg.contains("duplicate host address '10.0.0.1'")),
            other => panic!("expected codec error, got {:?}", other.map(|s| s.locations().to_vec())),
        }
    }
}
