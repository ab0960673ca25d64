#[derive(Debug)]
pub enum ProtocolError {
    TruncatedReport(usize),
    IoError(std::io::Error),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::TruncatedReport(len) => {
                write!(f, "Link closed after {} bytes of a report", len)
            }
            ProtocolError::IoError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::IoError(err)
    }
}
