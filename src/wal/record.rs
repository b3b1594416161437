// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Commit log record framing.
//!
//! ## Binary format (per record)
//! ```text
//! [body_len: 4 bytes (LE)][kind: 1 byte][payload: body_len - 1 bytes][crc: 4 bytes (LE)]
//! ```
//! The CRC covers the body (kind byte plus payload).

use crate::types::Timestamp;

use super::error::WalError;

const KIND_TIMESTAMP: u8 = 1;
const KIND_COMMIT: u8 = 2;
const KIND_ABORT: u8 = 3;
const KIND_LOW_WATERMARK: u8 = 4;

/// A single durable record in the commit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRecord {
    /// A start timestamp was handed out.
    Timestamp { ts: Timestamp },
    /// A transaction committed at `commit_ts`.
    Commit {
        start_ts: Timestamp,
        commit_ts: Timestamp,
    },
    /// A transaction aborted.
    Abort { start_ts: Timestamp, is_retry: bool },
    /// The low-watermark advanced.
    LowWatermark { lw: Timestamp },
}

impl LogRecord {
    /// Appends the framed record to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let body_start = buf.len() + 4;
        buf.extend_from_slice(&0u32.to_le_bytes());

        match self {
            LogRecord::Timestamp { ts } => {
                buf.push(KIND_TIMESTAMP);
                buf.extend_from_slice(&ts.to_le_bytes());
            }
            LogRecord::Commit {
                start_ts,
                commit_ts,
            } => {
                buf.push(KIND_COMMIT);
                buf.extend_from_slice(&start_ts.to_le_bytes());
                buf.extend_from_slice(&commit_ts.to_le_bytes());
            }
            LogRecord::Abort { start_ts, is_retry } => {
                buf.push(KIND_ABORT);
                buf.extend_from_slice(&start_ts.to_le_bytes());
                buf.push(u8::from(*is_retry));
            }
            LogRecord::LowWatermark { lw } => {
                buf.push(KIND_LOW_WATERMARK);
                buf.extend_from_slice(&lw.to_le_bytes());
            }
        }

        let body_len = (buf.len() - body_start) as u32;
        buf[body_start - 4..body_start].copy_from_slice(&body_len.to_le_bytes());
        let crc = crc32fast::hash(&buf[body_start..]);
        buf.extend_from_slice(&crc.to_le_bytes());
    }

    /// Decodes a record from a body slice (kind byte plus payload, CRC
    /// already verified by the caller).
    pub fn decode(body: &[u8]) -> Result<LogRecord, WalError> {
        let (&kind, payload) = body
            .split_first()
            .ok_or_else(|| WalError::Corruption("empty record body".to_string()))?;

        match kind {
            KIND_TIMESTAMP => Ok(LogRecord::Timestamp {
                ts: read_u64(payload, 0)?,
            }),
            KIND_COMMIT => Ok(LogRecord::Commit {
                start_ts: read_u64(payload, 0)?,
                commit_ts: read_u64(payload, 8)?,
            }),
            KIND_ABORT => {
                let start_ts = read_u64(payload, 0)?;
                let flag = payload
                    .get(8)
                    .ok_or_else(|| WalError::Corruption("truncated abort record".to_string()))?;
                Ok(LogRecord::Abort {
                    start_ts,
                    is_retry: *flag != 0,
                })
            }
            KIND_LOW_WATERMARK => Ok(LogRecord::LowWatermark {
                lw: read_u64(payload, 0)?,
            }),
            other => Err(WalError::Corruption(format!(
                "unknown record kind {other}"
            ))),
        }
    }
}

fn read_u64(payload: &[u8], at: usize) -> Result<u64, WalError> {
    let bytes: [u8; 8] = payload
        .get(at..at + 8)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| WalError::Corruption("truncated record payload".to_string()))?;
    Ok(u64::from_le_bytes(bytes))
}
