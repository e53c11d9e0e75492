use time::OffsetDateTime;

/// Terminal status line of a module reply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplyStatus {
    Ok,
    Error,
}

impl ReplyStatus {
    /// Classify a single reply line; payload lines yield `None`.
    pub fn from_line(line: &[u8]) -> Option<Self> {
        match trim_line(line) {
            b"OK" => Some(ReplyStatus::Ok),
            b"ERROR" => Some(ReplyStatus::Error),
            _ => None,
        }
    }
}

/// Everything the module sent back for one command.
///
/// `bytes` holds the raw reply, line terminators included, exactly as received. The status
/// line (when one arrived) is part of `bytes` too: catalog listings treat the trailing `OK`
/// as a line of the listing. `status == None` means the wait window elapsed first.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawResponse {
    pub bytes: Vec<u8>,
    pub status: Option<ReplyStatus>,
    pub timestamp: Option<Timestamp>,
}

impl RawResponse {
    pub fn new(bytes: Vec<u8>, status: Option<ReplyStatus>) -> Self {
        Self {
            bytes,
            status,
            timestamp: Some(Timestamp(OffsetDateTime::now_utc())),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Some(ReplyStatus::Ok)
    }

    pub fn timed_out(&self) -> bool {
        self.status.is_none()
    }

    /// Payload lines, excluding blank lines and the status line.
    pub fn payload_lines(&self) -> impl Iterator<Item = &[u8]> {
        self.bytes
            .split(|&b| b == b'\n')
            .map(trim_line)
            .filter(|l| !l.is_empty() && ReplyStatus::from_line(l).is_none())
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamp(pub OffsetDateTime);

#[derive(Clone, Debug)]
pub struct PortInfo {
    pub name: String,
    pub driver: String,
}
