//! Text and binary formats the engine uses in its callback buffers.

use crate::error::{BankSyncError, Result};

/// A second-factor method offered by the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecMech {
    pub id: String,
    pub name: String,
}

impl SecMech {
    /// Parse `id:name|id:name`. A missing name falls back to the id.
    pub fn parse(input: &str) -> Result<Vec<SecMech>> {
        input
            .split('|')
            .filter(|option| !option.trim().is_empty())
            .map(|option| {
                let (id, name) = option.split_once(':').unwrap_or((option, option));
                let id = id.trim();
                if id.is_empty() {
                    return Err(BankSyncError::Protocol(format!("malformed security mechanism: {option}")));
                }
                Ok(SecMech {
                    id: id.to_string(),
                    name: name.trim().to_string(),
                })
            })
            .collect()
    }

    pub fn join(options: &[SecMech]) -> String {
        options
            .iter()
            .map(|m| format!("{}:{}", m.id, m.name))
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl std::fmt::Display for SecMech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

pub fn parse_tan_media(input: &str) -> Vec<String> {
    input
        .split('|')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// photoTAN / QR-TAN challenge image.
///
/// Layout: 2-byte big-endian MIME type length, MIME type, 2-byte big-endian
/// image length, image bytes. The engine hands the container over as a string
/// with one ISO-8859-1 char per byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixCode {
    pub mime_type: String,
    pub image: Vec<u8>,
}

impl MatrixCode {
    pub fn parse(data: &str) -> Result<MatrixCode> {
        let bytes = latin1_bytes(data)?;
        let mut pos = 0usize;
        let mime = read_chunk(&bytes, &mut pos)?;
        let image = read_chunk(&bytes, &mut pos)?;
        let mime_type = String::from_utf8(mime.to_vec())
            .map_err(|_| BankSyncError::Protocol("matrix code: MIME type is not text".into()))?;
        Ok(MatrixCode {
            mime_type,
            image: image.to_vec(),
        })
    }

    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(4 + self.mime_type.len() + self.image.len());
        bytes.extend_from_slice(&(self.mime_type.len() as u16).to_be_bytes());
        bytes.extend_from_slice(self.mime_type.as_bytes());
        bytes.extend_from_slice(&(self.image.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&self.image);
        bytes.into_iter().map(char::from).collect()
    }

    /// File extension for saving the image.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

fn latin1_bytes(data: &str) -> Result<Vec<u8>> {
    data.chars()
        .map(|c| {
            u8::try_from(u32::from(c))
                .map_err(|_| BankSyncError::Protocol("matrix code: not a byte string".into()))
        })
        .collect()
}

fn read_chunk<'a>(bytes: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let truncated = || BankSyncError::Protocol("matrix code: truncated".into());
    let header = bytes.get(*pos..*pos + 2).ok_or_else(truncated)?;
    let len = u16::from_be_bytes([header[0], header[1]]) as usize;
    *pos += 2;
    let chunk = bytes.get(*pos..*pos + len).ok_or_else(truncated)?;
    *pos += len;
    Ok(chunk)
}
