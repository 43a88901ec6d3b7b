use std::str;

use thiserror::Error;

pub const OP_RRQ: u16 = 1;
pub const OP_WRQ: u16 = 2;
pub const OP_DATA: u16 = 3;
pub const OP_ACK: u16 = 4;
pub const OP_ERROR: u16 = 5;
pub const OP_OACK: u16 = 6; // RFC 2347

/// Wire decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("packet too short for opcode")]
    TooShort,
    #[error("invalid opcode: {0}")]
    InvalidOpcode(u16),
    #[error("{0} packet shorter than its header")]
    Truncated(&'static str),
    #[error("missing {0} terminator")]
    Unterminated(&'static str),
    #[error("invalid {0} encoding")]
    Encoding(&'static str),
}

/// One `name\0value\0` pair of the option extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TftpOption {
    pub name: String,
    pub value: String,
}

impl TftpOption {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TftpPacket {
    RRQ {
        filename: String,
        mode: String,
        options: Vec<TftpOption>,
    },
    WRQ {
        filename: String,
        mode: String,
        options: Vec<TftpOption>,
    },
    DATA {
        block: u16,
        data: Vec<u8>,
    },
    ACK(u16),
    ERROR {
        code: u16,
        msg: String,
    },
    OACK(Vec<TftpOption>),
}

impl TftpPacket {
    pub fn opcode(&self) -> u16 {
        match self {
            TftpPacket::RRQ { .. } => OP_RRQ,
            TftpPacket::WRQ { .. } => OP_WRQ,
            TftpPacket::DATA { .. } => OP_DATA,
            TftpPacket::ACK(_) => OP_ACK,
            TftpPacket::ERROR { .. } => OP_ERROR,
            TftpPacket::OACK(_) => OP_OACK,
        }
    }

    /// Options carried by a packet acknowledging a request: an OACK, or a
    /// request-shaped reply that echoes options back.
    pub fn acknowledged_options(&self) -> Option<&[TftpOption]> {
        match self {
            TftpPacket::OACK(options) => Some(options),
            TftpPacket::RRQ { options, .. } | TftpPacket::WRQ { options, .. }
                if !options.is_empty() =>
            {
                Some(options)
            }
            _ => None,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::with_capacity(self.encoded_len());
        bytes.extend_from_slice(&self.opcode().to_be_bytes());

        match self {
            TftpPacket::RRQ {
                filename,
                mode,
                options,
            }
            | TftpPacket::WRQ {
                filename,
                mode,
                options,
            } => {
                write_cstr(&mut bytes, filename);
                write_cstr(&mut bytes, mode);
                write_options(&mut bytes, options);
            }
            TftpPacket::DATA { block, data } => {
                bytes.extend_from_slice(&block.to_be_bytes());
                bytes.extend_from_slice(data);
            }
            TftpPacket::ACK(block) => {
                bytes.extend_from_slice(&block.to_be_bytes());
            }
            TftpPacket::ERROR { code, msg } => {
                bytes.extend_from_slice(&code.to_be_bytes());
                write_cstr(&mut bytes, msg);
            }
            TftpPacket::OACK(options) => write_options(&mut bytes, options),
        }
        bytes
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < 2 {
            return Err(PacketError::TooShort);
        }

        let opcode = u16::from_be_bytes([buf[0], buf[1]]);
        let body = &buf[2..];
        let pkt = match opcode {
            OP_RRQ | OP_WRQ => {
                let (filename, rest) = read_cstr(body, "filename")?;
                let (mode, rest) = read_cstr(rest, "mode")?;
                let options = read_options(rest)?;
                if opcode == OP_RRQ {
                    TftpPacket::RRQ {
                        filename,
                        mode,
                        options,
                    }
                } else {
                    TftpPacket::WRQ {
                        filename,
                        mode,
                        options,
                    }
                }
            }
            OP_DATA => {
                if body.len() < 2 {
                    return Err(PacketError::Truncated("DATA"));
                }
                TftpPacket::DATA {
                    block: u16::from_be_bytes([body[0], body[1]]),
                    data: body[2..].to_vec(),
                }
            }
            OP_ACK => {
                if body.len() < 2 {
                    return Err(PacketError::Truncated("ACK"));
                }
                TftpPacket::ACK(u16::from_be_bytes([body[0], body[1]]))
            }
            OP_ERROR => {
                if body.len() < 2 {
                    return Err(PacketError::Truncated("ERROR"));
                }
                let code = u16::from_be_bytes([body[0], body[1]]);
                let (msg, _) = read_cstr(&body[2..], "error message")?;
                TftpPacket::ERROR { code, msg }
            }
            OP_OACK => TftpPacket::OACK(read_options(body)?),
            _ => return Err(PacketError::InvalidOpcode(opcode)),
        };

        Ok(pkt)
    }

    fn encoded_len(&self) -> usize {
        let options_len = |options: &[TftpOption]| -> usize {
            options
                .iter()
                .map(|o| o.name.len() + o.value.len() + 2)
                .sum()
        };
        2 + match self {
            TftpPacket::RRQ {
                filename,
                mode,
                options,
            }
            | TftpPacket::WRQ {
                filename,
                mode,
                options,
            } => filename.len() + mode.len() + 2 + options_len(options),
            TftpPacket::DATA { data, .. } => 2 + data.len(),
            TftpPacket::ACK(_) => 2,
            TftpPacket::ERROR { msg, .. } => 2 + msg.len() + 1,
            TftpPacket::OACK(options) => options_len(options),
        }
    }
}

fn write_cstr(bytes: &mut Vec<u8>, s: &str) {
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
}

fn write_options(bytes: &mut Vec<u8>, options: &[TftpOption]) {
    for option in options {
        write_cstr(bytes, &option.name);
        write_cstr(bytes, &option.value);
    }
}

// Reads a \0 terminated string, returning it and the bytes after the terminator.
fn read_cstr<'a>(buf: &'a [u8], what: &'static str) -> Result<(String, &'a [u8]), PacketError> {
    let pos = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(PacketError::Unterminated(what))?;
    let s = str::from_utf8(&buf[..pos])
        .map_err(|_| PacketError::Encoding(what))?
        .to_string();
    Ok((s, &buf[pos + 1..]))
}

fn read_options(mut buf: &[u8]) -> Result<Vec<TftpOption>, PacketError> {
    let mut options = Vec::new();
    while !buf.is_empty() {
        let (name, rest) = read_cstr(buf, "option name")?;
        let (value, rest) = read_cstr(rest, "option value")?;
        options.push(TftpOption { name, value });
        buf = rest;
    }
    Ok(options)
}
