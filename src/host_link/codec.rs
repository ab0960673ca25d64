use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::{error::ProtocolError, response::Report, REPORT_SIZE};

#[derive(Debug, Default, Clone, Copy)]
pub struct ReportCodec;

impl Decoder for ReportCodec {
    type Item = Report;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Report>, ProtocolError> {
        if src.len() < REPORT_SIZE {
            src.reserve(REPORT_SIZE - src.len());
            return Ok(None);
        }
        let frame = src.split_to(REPORT_SIZE);
        Ok(Some(Report::from_slice(&frame)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Report>, ProtocolError> {
        match self.decode(src)? {
            Some(report) => Ok(Some(report)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::TruncatedReport(src.len())),
        }
    }
}

impl Encoder<Report> for ReportCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Report, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waits_for_whole_report() {
        let mut codec = ReportCodec;
        let mut buf = BytesMut::from(&b"SS"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0u8; REPORT_SIZE]);
        let report = codec.decode(&mut buf).unwrap().expect("a full report");
        assert_eq!(report.byte(0), b'S');
        assert_eq!(report.byte(1), b'S');
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_partial_report_at_eof_is_an_error() {
        let mut codec = ReportCodec;
        let mut buf = BytesMut::from(&b"MX"[..]);
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(ProtocolError::TruncatedReport(2))
        ));
        assert!(codec.decode_eof(&mut BytesMut::new()).unwrap().is_none());
    }

    #[test]
    fn test_encode_writes_full_report() {
        let mut codec = ReportCodec;
        let mut dst = BytesMut::new();
        codec.encode(Report::from_slice(&[1, 2, 3]), &mut dst).unwrap();
        assert_eq!(dst.len(), REPORT_SIZE);
        assert_eq!(&dst[..4], &[1, 2, 3, 0]);
    }
}
