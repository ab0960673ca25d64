pub mod config;
pub mod error;
pub mod request;
pub mod response;

use config::ProtocolConfig;
use request::Request;

pub const REPORT_SIZE: usize = 64;

pub const CMD_CALIBRATE: u8 = b'C';
pub const CMD_MOVE: u8 = b'M';
pub const CMD_TEST: u8 = b'T';
pub const CMD_HALT: u8 = b'H';
pub const CMD_STATUS: u8 = b'S';

pub const STATUS_SWITCHES: u8 = b'S';
pub const STATUS_POSITIONS: u8 = b'P';
pub const STATUS_CALIBRATION: u8 = b'C';

pub const OFFSET_CLASS: usize = 0;
pub const OFFSET_SELECTOR: usize = 1;
pub const OFFSET_DIRECTION: usize = 2;
pub const OFFSET_STEPS: usize = 3;
pub const OFFSET_STEP_DELAY: usize = 4;

pub fn parse_request(frame: &[u8], config: &ProtocolConfig) -> Request {
    Request::decode(frame, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{AxisId, Direction};
    use request::StatusQuery;

    fn frame(bytes: &[u8]) -> [u8; REPORT_SIZE] {
        let mut frame = [0u8; REPORT_SIZE];
        frame[..bytes.len()].copy_from_slice(bytes);
        frame
    }

    #[test]
    fn test_parse_move_request() {
        let config = ProtocolConfig::default();
        let request = parse_request(&frame(&[b'M', b'Z', 1, 5, 0x10, 0x02]), &config);

        match request {
            Request::Move {
                axis,
                direction,
                steps,
                step_delay_ms,
            } => {
                assert_eq!(axis, AxisId::Z);
                assert_eq!(direction, Direction::TowardLimit2);
                assert_eq!(steps, 5);
                assert_eq!(step_delay_ms, Some(0x0210));
            }
            _ => panic!("Expected Move request"),
        }
    }

    #[test]
    fn test_parse_two_level_classes() {
        let config = ProtocolConfig::default();
        assert_eq!(
            parse_request(&frame(b"CX"), &config),
            Request::Calibrate(AxisId::X)
        );
        assert_eq!(
            parse_request(&frame(b"TY"), &config),
            Request::TestEnable(AxisId::Y)
        );
        assert_eq!(
            parse_request(&frame(b"HZ"), &config),
            Request::TestHalt(AxisId::Z)
        );
        assert_eq!(
            parse_request(&frame(b"SP"), &config),
            Request::Status(StatusQuery::Positions)
        );
    }

    #[test]
    fn test_unknown_bytes_are_ignored() {
        let config = ProtocolConfig::default();
        assert_eq!(
            parse_request(&frame(b"QS"), &config),
            Request::Ignored {
                class: b'Q',
                selector: b'S'
            }
        );
        assert!(parse_request(&frame(b"CW"), &config).is_ignored());
        assert!(parse_request(&frame(b"SX"), &config).is_ignored());
        assert!(parse_request(&[], &config).is_ignored());
    }
}
