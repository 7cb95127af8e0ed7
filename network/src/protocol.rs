//! Wire protocol for the lottery aggregation server.
//!
//! Every message is a tag byte followed by length-prefixed elements; all
//! lengths and counts are single unsigned bytes.

use bytes::{BufMut, BytesMut};

pub const SUBMIT_TAG: u8 = b'b';
pub const WINNERS_QUERY_TAG: u8 = b'w';
pub const ACK_TAG: u8 = b'a';
pub const WINNERS_READY: u8 = 0x77;

/// Acknowledgements are always a tag byte plus a status byte.
pub const ACK_LEN: usize = 2;

/// Upper bound for every length-prefixed element and record count.
pub const MAX_PREFIXED_LEN: usize = u8::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("field `{0}` exceeds {MAX_PREFIXED_LEN} bytes")]
    FieldTooLong(&'static str),
    #[error("agency id exceeds {MAX_PREFIXED_LEN} bytes")]
    IdentityTooLong,
    #[error("batch of {0} records exceeds the {MAX_PREFIXED_LEN} record limit")]
    BatchTooLarge(usize),
    #[error("invalid response tag {0:#04x}")]
    InvalidResponseTag(u8),
    #[error("truncated message")]
    TruncatedMessage,
}

/// A single betting record, one line of an agency's data set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bet {
    pub first_name: String,
    pub surname: String,
    pub document: String,
    pub birthdate: String,
    pub number: String,
}

impl Bet {
    /// Encode the five fields in wire order, each with a one-byte length
    /// prefix.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut writer = MessageWriter::new();
        self.encode_into(&mut writer)?;
        Ok(writer.into_bytes())
    }

    fn encode_into(&self, writer: &mut MessageWriter) -> Result<(), ProtocolError> {
        let fields = [
            ("first_name", &self.first_name),
            ("surname", &self.surname),
            ("document", &self.document),
            ("birthdate", &self.birthdate),
            ("number", &self.number),
        ];
        for (name, value) in fields {
            writer
                .put_str(value)
                .map_err(|_| ProtocolError::FieldTooLong(name))?;
        }
        Ok(())
    }
}

/// Server verdict on a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Ok,
    BadRequest,
    Unknown(u8),
}

/// Outcome of a winners query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WinnersStatus {
    NotReady,
    Ready(Vec<String>),
}

/// Builds outgoing messages, enforcing the one-byte length prefix as an
/// explicit precondition instead of truncating.
struct MessageWriter {
    buf: BytesMut,
}

/// Marker for an element that does not fit its one-byte length prefix;
/// callers map it to the specific protocol error.
struct OverLimit;

impl MessageWriter {
    fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    fn put_tag(&mut self, tag: u8) {
        self.buf.put_u8(tag);
    }

    fn put_str(&mut self, value: &str) -> Result<(), OverLimit> {
        if value.len() > MAX_PREFIXED_LEN {
            return Err(OverLimit);
        }
        self.buf.put_u8(value.len() as u8);
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }

    fn put_count(&mut self, count: usize) -> Result<(), OverLimit> {
        if count > MAX_PREFIXED_LEN {
            return Err(OverLimit);
        }
        self.buf.put_u8(count as u8);
        Ok(())
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf.freeze().to_vec()
    }
}

/// Frame a batch submission: tag, agency id, record count, then each
/// record's encoding concatenated in order.
pub fn frame_submission(agency_id: &str, batch: &[Bet]) -> Result<Vec<u8>, ProtocolError> {
    let mut writer = MessageWriter::new();
    writer.put_tag(SUBMIT_TAG);
    writer
        .put_str(agency_id)
        .map_err(|_| ProtocolError::IdentityTooLong)?;
    writer
        .put_count(batch.len())
        .map_err(|_| ProtocolError::BatchTooLarge(batch.len()))?;
    for bet in batch {
        bet.encode_into(&mut writer)?;
    }
    Ok(writer.into_bytes())
}

/// Frame a winners query: tag plus the agency id.
pub fn frame_winners_query(agency_id: &str) -> Result<Vec<u8>, ProtocolError> {
    let mut writer = MessageWriter::new();
    writer.put_tag(WINNERS_QUERY_TAG);
    writer
        .put_str(agency_id)
        .map_err(|_| ProtocolError::IdentityTooLong)?;
    Ok(writer.into_bytes())
}

/// Decode the two-byte batch acknowledgement.
pub fn decode_ack(bytes: &[u8]) -> Result<Ack, ProtocolError> {
    let &[tag, status] = bytes else {
        return Err(ProtocolError::TruncatedMessage);
    };
    if tag != ACK_TAG {
        return Err(ProtocolError::InvalidResponseTag(tag));
    }
    Ok(match status {
        0 => Ack::Ok,
        1 => Ack::BadRequest,
        code => Ack::Unknown(code),
    })
}

/// Decode a winners response. Any discriminator other than
/// [`WINNERS_READY`] means the draw has not finished yet.
pub fn decode_winners(bytes: &[u8]) -> Result<WinnersStatus, ProtocolError> {
    let (&discriminator, rest) = bytes
        .split_first()
        .ok_or(ProtocolError::TruncatedMessage)?;
    if discriminator != WINNERS_READY {
        return Ok(WinnersStatus::NotReady);
    }

    let (&count, mut rest) = rest.split_first().ok_or(ProtocolError::TruncatedMessage)?;
    let mut winners = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (&len, tail) = rest.split_first().ok_or(ProtocolError::TruncatedMessage)?;
        if tail.len() < len as usize {
            return Err(ProtocolError::TruncatedMessage);
        }
        let (id, tail) = tail.split_at(len as usize);
        winners.push(String::from_utf8_lossy(id).into_owned());
        rest = tail;
    }
    Ok(WinnersStatus::Ready(winners))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bet() -> Bet {
        Bet {
            first_name: "Juan".to_string(),
            surname: "Perez".to_string(),
            document: "123456789".to_string(),
            birthdate: "1990-05-15".to_string(),
            number: "42".to_string(),
        }
    }

    fn read_prefixed(bytes: &mut &[u8]) -> String {
        let (&len, rest) = bytes.split_first().unwrap();
        let (field, rest) = rest.split_at(len as usize);
        *bytes = rest;
        String::from_utf8(field.to_vec()).unwrap()
    }

    #[test]
    fn encoded_record_reparses_to_the_same_fields() {
        let bet = sample_bet();
        let encoded = bet.encode().unwrap();

        let mut cursor = encoded.as_slice();
        assert_eq!(read_prefixed(&mut cursor), bet.first_name);
        assert_eq!(read_prefixed(&mut cursor), bet.surname);
        assert_eq!(read_prefixed(&mut cursor), bet.document);
        assert_eq!(read_prefixed(&mut cursor), bet.birthdate);
        assert_eq!(read_prefixed(&mut cursor), bet.number);
        assert!(cursor.is_empty());
    }

    #[test]
    fn field_at_the_length_limit_encodes() {
        let bet = Bet {
            surname: "a".repeat(255),
            ..sample_bet()
        };
        assert!(bet.encode().is_ok());
    }

    #[test]
    fn oversized_field_is_rejected() {
        let bet = Bet {
            surname: "a".repeat(256),
            ..sample_bet()
        };
        assert!(matches!(
            bet.encode(),
            Err(ProtocolError::FieldTooLong("surname"))
        ));
    }

    #[test]
    fn submission_frame_layout() {
        let frame = frame_submission("7", &[sample_bet()]).unwrap();
        assert_eq!(frame[0], b'b');
        assert_eq!(frame[1], 1);
        assert_eq!(frame[2], b'7');
        assert_eq!(frame[3], 1);
        assert_eq!(&frame[4..], sample_bet().encode().unwrap().as_slice());
    }

    #[test]
    fn empty_submission_frame_has_zero_count() {
        let frame = frame_submission("31", &[]).unwrap();
        assert_eq!(frame, vec![b'b', 2, b'3', b'1', 0]);
    }

    #[test]
    fn winners_query_layout() {
        let frame = frame_winners_query("31").unwrap();
        assert_eq!(frame, vec![b'w', 2, b'3', b'1']);
    }

    #[test]
    fn oversized_identity_is_rejected() {
        let agency = "1".repeat(256);
        assert!(matches!(
            frame_submission(&agency, &[]),
            Err(ProtocolError::IdentityTooLong)
        ));
        assert!(matches!(
            frame_winners_query(&agency),
            Err(ProtocolError::IdentityTooLong)
        ));
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let batch = vec![sample_bet(); 256];
        assert!(matches!(
            frame_submission("7", &batch),
            Err(ProtocolError::BatchTooLarge(256))
        ));
    }

    #[test]
    fn ack_status_codes() {
        assert_eq!(decode_ack(&[b'a', 0]).unwrap(), Ack::Ok);
        assert_eq!(decode_ack(&[b'a', 1]).unwrap(), Ack::BadRequest);
        assert_eq!(decode_ack(&[b'a', 7]).unwrap(), Ack::Unknown(7));
    }

    #[test]
    fn ack_with_wrong_tag_is_rejected() {
        assert!(matches!(
            decode_ack(&[b'x', 0]),
            Err(ProtocolError::InvalidResponseTag(b'x'))
        ));
    }

    #[test]
    fn ack_must_be_exactly_two_bytes() {
        assert!(matches!(
            decode_ack(&[b'a']),
            Err(ProtocolError::TruncatedMessage)
        ));
        assert!(matches!(
            decode_ack(&[b'a', 0, 0]),
            Err(ProtocolError::TruncatedMessage)
        ));
    }

    #[test]
    fn winners_ready_list_decodes() {
        let bytes = [0x77, 2, 3, b'A', b'B', b'C', 2, b'D', b'E'];
        assert_eq!(
            decode_winners(&bytes).unwrap(),
            WinnersStatus::Ready(vec!["ABC".to_string(), "DE".to_string()])
        );
    }

    #[test]
    fn winners_ready_may_be_empty() {
        assert_eq!(
            decode_winners(&[0x77, 0]).unwrap(),
            WinnersStatus::Ready(Vec::new())
        );
    }

    #[test]
    fn any_other_discriminator_means_not_ready() {
        assert_eq!(decode_winners(&[0x01]).unwrap(), WinnersStatus::NotReady);
        assert_eq!(decode_winners(&[b'W']).unwrap(), WinnersStatus::NotReady);
    }

    #[test]
    fn truncated_winner_string_is_rejected() {
        assert!(matches!(
            decode_winners(&[0x77, 1, 5, b'a', b'b']),
            Err(ProtocolError::TruncatedMessage)
        ));
    }

    #[test]
    fn missing_count_byte_is_rejected() {
        assert!(matches!(
            decode_winners(&[0x77]),
            Err(ProtocolError::TruncatedMessage)
        ));
    }

    #[test]
    fn empty_winners_response_is_rejected() {
        assert!(matches!(
            decode_winners(&[]),
            Err(ProtocolError::TruncatedMessage)
        ));
    }
}
