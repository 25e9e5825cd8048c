//! multipart/form-data body encoding.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::ApiError;
use crate::types::{MultiPart, PartValue};

// Characters that would break out of a quoted `name="..."` parameter.
const QUOTED_PARAM: &AsciiSet = &CONTROLS.add(b'"').add(b'\\');

pub(crate) fn new_boundary() -> String {
    format!("------------------------{}", uuid::Uuid::new_v4().simple())
}

/// Encode `parts` in order, reading file parts from disk.
pub(crate) fn encode(parts: &[MultiPart], boundary: &str) -> Result<Vec<u8>, ApiError> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let name = utf8_percent_encode(&part.name, QUOTED_PARAM);
        match &part.value {
            PartValue::Text(text) => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes());
                body.extend_from_slice(b"Content-Type: text/plain\r\n\r\n");
                body.extend_from_slice(text.as_bytes());
            }
            PartValue::File(path) => {
                let contents = std::fs::read(path).map_err(|source| ApiError::MultiPartFile {
                    path: path.clone(),
                    source,
                })?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "file".to_string());
                let file_name = utf8_percent_encode(&file_name, QUOTED_PARAM);
                let mime = mime_guess::from_path(path).first_or_octet_stream();
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n")
                        .as_bytes(),
                );
                body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
                body.extend_from_slice(&contents);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Ok(body)
}
