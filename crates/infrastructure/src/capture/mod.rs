mod jsonl;

pub use jsonl::{JsonLinesCapture, PacketRecord};
