use super::REPORT_SIZE;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Report([u8; REPORT_SIZE]);

impl Report {
    pub fn new() -> Self {
        Self([0; REPORT_SIZE])
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut report = Self::new();
        let len = bytes.len().min(REPORT_SIZE);
        report.0[..len].copy_from_slice(&bytes[..len]);
        report
    }

    pub fn as_bytes(&self) -> &[u8; REPORT_SIZE] {
        &self.0
    }

    pub fn byte(&self, offset: usize) -> u8 {
        self.0[offset]
    }

    pub fn set_byte(&mut self, offset: usize, value: u8) {
        self.0[offset] = value;
    }

    pub fn u16_le(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.0[offset], self.0[offset + 1]])
    }

    pub fn put_u16_le(&mut self, offset: usize, value: u16) {
        self.0[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Report({:02x?}..)", &self.0[..8])
    }
}
