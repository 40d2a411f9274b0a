//! Protocol Module
//!
//! Length-prefixed message framing for client-server communication.
//!
//! ## Message Format
//! ```text
//! ┌──────────────┬──────────┬─────────────────────────────┐
//! │ DataLen (4)  │  Id (4)  │         Data                │
//! └──────────────┴──────────┴─────────────────────────────┘
//! ```
//! Both header fields are little-endian. `DataLen` is bounded by the
//! configured `max_packet_size`.
//!
//! ### Request Ids
//! - 0: GET   - Data: key
//! - 1: PUT   - Data: key_len (4, big-endian) + key + value
//! - 2: SYNC  - Data: empty
//! - 3: PING  - Data: empty
//!
//! ### Response Ids (status)
//! - 0: OK         - Data: value for GET, "PONG" for PING, else empty
//! - 1: NOT_FOUND  - Data: empty
//! - 2: ERROR      - Data: UTF-8 error message

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{Response, Status};
pub use codec::{
    decode_command, decode_message, decode_response, encode_command, encode_message,
    encode_response, read_command, read_message, read_response, write_command, write_message,
    write_response, Message, HEADER_SIZE,
};
