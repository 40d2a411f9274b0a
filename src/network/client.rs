//! TCP Client
//!
//! Blocking client for the FlowDB wire protocol.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{FlowError, Result};
use crate::protocol::{read_response, write_command, Command, Response, Status};

/// Largest response body the client accepts by default (16 MB)
pub const DEFAULT_MAX_RESPONSE_SIZE: u32 = 16 * 1024 * 1024;

/// A connection to a FlowDB server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    max_response_size: u32,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        })
    }

    /// Override the largest accepted response body
    pub fn with_max_response_size(mut self, size: u32) -> Self {
        self.max_response_size = size;
        self
    }

    /// Get a value; a missing key is `KeyNotFound`
    pub fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let response = self.call(&Command::Get { key: key.to_vec() })?;
        Ok(response.payload.unwrap_or_default())
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.call(&Command::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.call(&Command::Sync)?;
        Ok(())
    }

    /// Returns the server's reply payload ("PONG")
    pub fn ping(&mut self) -> Result<Vec<u8>> {
        let response = self.call(&Command::Ping)?;
        Ok(response.payload.unwrap_or_default())
    }

    /// Send a command and wait for its response
    pub fn call(&mut self, command: &Command) -> Result<Response> {
        write_command(&mut self.writer, command)?;
        let response = read_response(&mut self.reader, self.max_response_size)?;
        match response.status {
            Status::Ok => Ok(response),
            Status::NotFound => Err(FlowError::KeyNotFound),
            Status::Error => Err(FlowError::Remote(
                response.error_message().unwrap_or_default(),
            )),
        }
    }
}
