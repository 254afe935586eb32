use rosc::{OscMessage, OscPacket, OscType, decoder, encoder};

use crate::osc::{InboundError, Mode, OscError};

/// Address pattern of every outbound mode message.
pub const MODE_ADDRESS: &str = "/";

/// Encodes `mode` as a single-int OSC message.
///
/// # Errors
///
/// [`OscError::Encode`] if rosc rejects the packet.
pub fn encode_mode(mode: Mode) -> Result<Vec<u8>, OscError> {
    let packet = OscPacket::Message(OscMessage {
        addr: MODE_ADDRESS.to_string(),
        args: vec![OscType::Int(mode.code())],
    });
    encoder::encode(&packet).map_err(|err| OscError::Encode(format!("{err:?}")))
}

/// Extracts the mode code of every message in a datagram.
///
/// Bundles are flattened in order. The address pattern is not checked.
///
/// # Returns
///
/// One entry per message: the first argument as a mode code, or why the
/// message was discarded. A datagram that is not OSC at all yields a single
/// [`InboundError::Malformed`]. Range checks on the code are left to the caller.
pub fn decode_inbound(datagram: &[u8]) -> Vec<Result<i32, InboundError>> {
    if datagram.is_empty() {
        return vec![Err(InboundError::Malformed("empty datagram".to_string()))];
    }

    match decoder::decode_udp(datagram) {
        Ok((_, packet)) => {
            let mut codes = Vec::new();
            collect_codes(packet, &mut codes);
            codes
        }
        Err(err) => vec![Err(InboundError::Malformed(format!("{err:?}")))],
    }
}

fn collect_codes(packet: OscPacket, codes: &mut Vec<Result<i32, InboundError>>) {
    match packet {
        OscPacket::Message(message) => codes.push(first_int(&message)),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                collect_codes(inner, codes);
            }
        }
    }
}

fn first_int(message: &OscMessage) -> Result<i32, InboundError> {
    match message.args.first() {
        None => Err(InboundError::Empty),
        Some(OscType::Int(code)) => Ok(*code),
        Some(OscType::Long(code)) => i32::try_from(*code).map_err(|_| InboundError::NotInteger),
        Some(_) => Err(InboundError::NotInteger),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscBundle, OscTime};

    fn encode_message(addr: &str, args: Vec<OscType>) -> Vec<u8> {
        encoder::encode(&OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        }))
        .unwrap()
    }

    #[test]
    fn test_encode_mode_layout() {
        let bytes = encode_mode(Mode::Ar).unwrap();
        // "/" padded to 4, ",i" padded to 4, big-endian int32
        assert_eq!(bytes, vec![b'/', 0, 0, 0, b',', b'i', 0, 0, 0, 0, 0, 2]);

        match decoder::decode_udp(&bytes).unwrap().1 {
            OscPacket::Message(message) => {
                assert_eq!(message.addr, "/");
                assert_eq!(message.args, vec![OscType::Int(2)]);
            }
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn test_decode_accepts_any_address() {
        let bytes = encode_message("/mode", vec![OscType::Int(1)]);
        assert_eq!(decode_inbound(&bytes), vec![Ok(1)]);
    }

    #[test]
    fn test_decode_uses_first_argument() {
        let bytes = encode_message("/", vec![OscType::Int(2), OscType::Int(1)]);
        assert_eq!(decode_inbound(&bytes), vec![Ok(2)]);
    }

    #[test]
    fn test_decode_passes_unknown_codes_through() {
        let bytes = encode_message("/", vec![OscType::Int(5)]);
        assert_eq!(decode_inbound(&bytes), vec![Ok(5)]);
    }

    #[test]
    fn test_decode_empty_message() {
        let bytes = encode_message("/", vec![]);
        assert_eq!(decode_inbound(&bytes), vec![Err(InboundError::Empty)]);
    }

    #[test]
    fn test_decode_non_integer() {
        let bytes = encode_message("/", vec![OscType::Float(2.0)]);
        assert_eq!(decode_inbound(&bytes), vec![Err(InboundError::NotInteger)]);

        let bytes = encode_message("/", vec![OscType::String("AR".to_string())]);
        assert_eq!(decode_inbound(&bytes), vec![Err(InboundError::NotInteger)]);
    }

    #[test]
    fn test_decode_long_argument() {
        let bytes = encode_message("/", vec![OscType::Long(2)]);
        assert_eq!(decode_inbound(&bytes), vec![Ok(2)]);

        let bytes = encode_message("/", vec![OscType::Long(i64::MAX)]);
        assert_eq!(decode_inbound(&bytes), vec![Err(InboundError::NotInteger)]);
    }

    #[test]
    fn test_decode_flattens_bundles() {
        let packet = OscPacket::Bundle(OscBundle {
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![
                OscPacket::Message(OscMessage {
                    addr: "/".to_string(),
                    args: vec![OscType::Int(2)],
                }),
                OscPacket::Message(OscMessage {
                    addr: "/".to_string(),
                    args: vec![],
                }),
                OscPacket::Message(OscMessage {
                    addr: "/".to_string(),
                    args: vec![OscType::Int(1)],
                }),
            ],
        });
        let bytes = encoder::encode(&packet).unwrap();

        assert_eq!(
            decode_inbound(&bytes),
            vec![Ok(2), Err(InboundError::Empty), Ok(1)]
        );
    }

    #[test]
    fn test_decode_garbage() {
        let decoded = decode_inbound(b"\x01\x02\x03");
        assert_eq!(decoded.len(), 1);
        assert!(matches!(decoded[0], Err(InboundError::Malformed(_))));

        let decoded = decode_inbound(&[]);
        assert!(matches!(decoded[0], Err(InboundError::Malformed(_))));
    }
}
