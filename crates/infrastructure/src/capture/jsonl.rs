use base64::{engine::general_purpose::STANDARD, Engine};
use dnsreplay_application::ports::CaptureSource;
use dnsreplay_domain::{CapturedPacket, DomainError, Transport};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// One decoded packet per line.
///
/// ```json
/// {"ts_sec":1700000000,"ts_usec":125000,"transport":"udp","payload":"q80BAAABAAAAAAAA..."}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketRecord {
    pub ts_sec: i64,
    #[serde(default)]
    pub ts_usec: i64,
    #[serde(default)]
    pub transport: Option<String>,
    /// Base64 of the DNS message, without any TCP length prefix.
    pub payload: String,
}

impl PacketRecord {
    pub fn new(ts_sec: i64, ts_usec: i64, transport: Option<Transport>, payload: &[u8]) -> Self {
        Self {
            ts_sec,
            ts_usec,
            transport: transport.map(|t| t.as_str().to_string()),
            payload: STANDARD.encode(payload),
        }
    }

    fn into_packet(self) -> Result<CapturedPacket, String> {
        let payload = STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| format!("invalid payload: {}", e))?;
        let transport = self
            .transport
            .as_deref()
            .and_then(|t| t.parse::<Transport>().ok());
        Ok(CapturedPacket::new(
            payload,
            transport,
            self.ts_sec,
            self.ts_usec,
        ))
    }
}

/// Reads [`PacketRecord`]s from a JSON Lines stream.
///
/// Malformed lines are logged and skipped, only I/O errors end the source.
pub struct JsonLinesCapture<R> {
    name: String,
    reader: R,
    line: String,
    line_no: u64,
    skipped: u64,
}

impl JsonLinesCapture<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            DomainError::CaptureDecode(format!("{}: {}", path.display(), e))
        })?;
        debug!(target: "core", path = %path.display(), "capture opened");
        Ok(Self::from_reader(path.display().to_string(), BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesCapture<R> {
    pub fn from_reader(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
            line: String::new(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Lines that could not be decoded so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: BufRead> CaptureSource for JsonLinesCapture<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_packet(&mut self) -> Result<Option<CapturedPacket>, DomainError> {
        loop {
            self.line.clear();
            let read = self.reader.read_line(&mut self.line)?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }

            let decoded = serde_json::from_str::<PacketRecord>(text)
                .map_err(|e| e.to_string())
                .and_then(PacketRecord::into_packet);
            match decoded {
                Ok(packet) => return Ok(Some(packet)),
                Err(e) => {
                    self.skipped += 1;
                    warn!(
                        target: "core",
                        source = %self.name,
                        line = self.line_no,
                        error = %e,
                        "skipping undecodable capture line"
                    );
                }
            }
        }
    }
}
