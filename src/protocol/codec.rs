//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! Framing is two layers: a [`Message`] is an id plus an opaque body, and
//! commands/responses are built on top of messages.

use std::io::{Read, Write};

use crate::error::{FlowError, Result};

use super::{Command, CommandType, Response, Status};

/// Header size: 4 bytes data length + 4 bytes id
pub const HEADER_SIZE: usize = 8;

/// One framed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u32,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(id: u32, data: Vec<u8>) -> Self {
        Self { id, data }
    }
}

// =============================================================================
// Message Framing
// =============================================================================

/// Encode a message to bytes
///
/// Format: data_len (4, LE) + id (4, LE) + data
pub fn encode_message(message: &Message) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_SIZE + message.data.len());
    bytes.extend_from_slice(&(message.data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&message.id.to_le_bytes());
    bytes.extend_from_slice(&message.data);
    bytes
}

/// Decode a message from bytes
pub fn decode_message(bytes: &[u8], max_packet_size: u32) -> Result<Message> {
    let (data_len, id) = parse_header(bytes, max_packet_size)?;

    let total_len = HEADER_SIZE + data_len;
    if bytes.len() < total_len {
        return Err(FlowError::Protocol(format!(
            "Incomplete message: expected {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    Ok(Message::new(id, bytes[HEADER_SIZE..total_len].to_vec()))
}

/// Read a complete message from a stream
///
/// Blocks until a complete message is received or an error occurs
pub fn read_message<R: Read>(reader: &mut R, max_packet_size: u32) -> Result<Message> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;
    let (data_len, id) = parse_header(&header, max_packet_size)?;

    let mut data = vec![0u8; data_len];
    if data_len > 0 {
        reader.read_exact(&mut data)?;
    }

    Ok(Message::new(id, data))
}

/// Write a message to a stream
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    writer.write_all(&encode_message(message))?;
    writer.flush()?;
    Ok(())
}

fn parse_header(bytes: &[u8], max_packet_size: u32) -> Result<(usize, u32)> {
    if bytes.len() < HEADER_SIZE {
        return Err(FlowError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let data_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let id = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

    if data_len > max_packet_size {
        return Err(FlowError::Protocol(format!(
            "Message too large: {} bytes (max {})",
            data_len, max_packet_size
        )));
    }

    Ok((data_len as usize, id))
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command as a framed message
pub fn encode_command(command: &Command) -> Vec<u8> {
    encode_message(&command_to_message(command))
}

/// Decode a command from framed bytes
pub fn decode_command(bytes: &[u8], max_packet_size: u32) -> Result<Command> {
    command_from_message(decode_message(bytes, max_packet_size)?)
}

/// Read a complete command from a stream
pub fn read_command<R: Read>(reader: &mut R, max_packet_size: u32) -> Result<Command> {
    command_from_message(read_message(reader, max_packet_size)?)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    write_message(writer, &command_to_message(command))
}

fn command_to_message(command: &Command) -> Message {
    let data = match command {
        Command::Get { key } => key.clone(),
        Command::Put { key, value } => {
            let mut data = Vec::with_capacity(4 + key.len() + value.len());
            data.extend_from_slice(&(key.len() as u32).to_be_bytes());
            data.extend_from_slice(key);
            data.extend_from_slice(value);
            data
        }
        Command::Sync | Command::Ping => Vec::new(),
    };
    Message::new(command.command_type() as u32, data)
}

fn command_from_message(message: Message) -> Result<Command> {
    let command_type = CommandType::from_id(message.id).ok_or_else(|| {
        FlowError::Protocol(format!("Unknown command id: {}", message.id))
    })?;

    match command_type {
        CommandType::Get => Ok(Command::Get { key: message.data }),
        CommandType::Put => decode_put_command(&message.data),
        CommandType::Sync => expect_empty("SYNC", &message.data).map(|_| Command::Sync),
        CommandType::Ping => expect_empty("PING", &message.data).map(|_| Command::Ping),
    }
}

/// Decode PUT command payload
fn decode_put_command(payload: &[u8]) -> Result<Command> {
    if payload.len() < 4 {
        return Err(FlowError::Protocol(
            "PUT command: missing key length".to_string(),
        ));
    }

    let key_len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;

    if payload.len() < 4 + key_len {
        return Err(FlowError::Protocol(format!(
            "PUT command: incomplete key (expected {}, got {})",
            key_len,
            payload.len() - 4
        )));
    }

    let key = payload[4..4 + key_len].to_vec();
    let value = payload[4 + key_len..].to_vec();

    Ok(Command::Put { key, value })
}

fn expect_empty(name: &str, payload: &[u8]) -> Result<()> {
    if !payload.is_empty() {
        return Err(FlowError::Protocol(format!(
            "{} command: unexpected payload of {} bytes",
            name,
            payload.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response as a framed message
pub fn encode_response(response: &Response) -> Vec<u8> {
    encode_message(&response_to_message(response))
}

/// Decode a response from framed bytes
pub fn decode_response(bytes: &[u8], max_packet_size: u32) -> Result<Response> {
    response_from_message(decode_message(bytes, max_packet_size)?)
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R, max_packet_size: u32) -> Result<Response> {
    response_from_message(read_message(reader, max_packet_size)?)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    write_message(writer, &response_to_message(response))
}

fn response_to_message(response: &Response) -> Message {
    Message::new(
        response.status as u32,
        response.payload.clone().unwrap_or_default(),
    )
}

fn response_from_message(message: Message) -> Result<Response> {
    let status = Status::from_id(message.id).ok_or_else(|| {
        FlowError::Protocol(format!("Unknown response status: {}", message.id))
    })?;

    let payload = if message.data.is_empty() {
        None
    } else {
        Some(message.data)
    };

    Ok(Response { status, payload })
}
