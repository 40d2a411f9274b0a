//! Command definitions
//!
//! Represents requests from clients.

/// Command types (the message id on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandType {
    Get = 0,
    Put = 1,
    Sync = 2,
    Ping = 3,
}

impl CommandType {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(CommandType::Get),
            1 => Some(CommandType::Put),
            2 => Some(CommandType::Sync),
            3 => Some(CommandType::Ping),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    Get { key: Vec<u8> },

    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Flush the active segment to disk
    Sync,

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Sync => CommandType::Sync,
            Command::Ping => CommandType::Ping,
        }
    }
}
