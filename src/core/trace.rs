// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Operation trace parsing
//!
//! `rvcache-sim` replays a plain-text trace of CPU memory operations, one
//! per line:
//!
//! ```text
//! # comments and blank lines are skipped
//! fetch 0x100          # instruction fetch
//! lw    0x200          # word load
//! sw    0x200 0xDEADBEEF
//! sh    0x204 0xABCD
//! sb    0x207 0x41
//! ```
//!
//! Addresses and values accept decimal or `0x` hexadecimal.

use crate::core::cpu::MemWidth;
use crate::core::error::{Result, SimError};

/// One replayed CPU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOp {
    /// Instruction fetch through the I-Cache.
    Fetch {
        /// Fetch address.
        addr: u32,
    },
    /// Word load through the D-Cache.
    Load {
        /// Load address.
        addr: u32,
    },
    /// Store through the D-Cache.
    Store {
        /// Store address.
        addr: u32,
        /// Raw store data.
        value: u32,
        /// Store width.
        width: MemWidth,
    },
}

/// Parse a whole trace file.
///
/// # Errors
///
/// [`SimError::TraceParse`] with the 1-based line number of the first
/// malformed line.
pub fn parse(text: &str) -> Result<Vec<TraceOp>> {
    let mut ops = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        // Strip trailing comments, then surrounding whitespace.
        let meat = raw.split('#').next().unwrap_or("").trim();
        if meat.is_empty() {
            continue;
        }
        ops.push(parse_line(meat, line)?);
    }
    Ok(ops)
}

fn parse_line(meat: &str, line: usize) -> Result<TraceOp> {
    let mut tokens = meat.split_whitespace();
    let op = tokens.next().unwrap_or("");
    let op_lower = op.to_ascii_lowercase();

    let mut number = |what: &str| -> Result<u32> {
        let token = tokens.next().ok_or_else(|| SimError::TraceParse {
            line,
            message: format!("missing {} for '{}'", what, op),
        })?;
        parse_u32(token).ok_or_else(|| SimError::TraceParse {
            line,
            message: format!("bad {} '{}'", what, token),
        })
    };

    let parsed = match op_lower.as_str() {
        "fetch" => TraceOp::Fetch {
            addr: number("address")?,
        },
        "lw" => TraceOp::Load {
            addr: number("address")?,
        },
        "sw" | "sh" | "sb" => {
            let width = match op_lower.as_str() {
                "sw" => MemWidth::Word,
                "sh" => MemWidth::Half,
                _ => MemWidth::Byte,
            };
            TraceOp::Store {
                addr: number("address")?,
                value: number("value")?,
                width,
            }
        }
        _ => {
            return Err(SimError::TraceParse {
                line,
                message: format!("unknown operation '{}'", op),
            })
        }
    };

    if tokens.next().is_some() {
        return Err(SimError::TraceParse {
            line,
            message: format!("trailing tokens after '{}'", op),
        });
    }
    Ok(parsed)
}

fn parse_u32(token: &str) -> Option<u32> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        token.parse().ok()
    }
}
