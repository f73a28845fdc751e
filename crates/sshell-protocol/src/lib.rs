//! sshell Protocol - status records exchanged over the shared pipe
//!
//! Every agent writes fixed-size [`StatusRecord`]s to the write end of a
//! single pipe it inherited from the supervisor. There is no framing: the
//! reader consumes exactly [`RECORD_SIZE`] bytes per record, so the layout
//! below is the whole contract.
//!
//! ```text
//! offset  width  field
//!      0      4  id              i32 LE
//!      4      4  pid             i32 LE
//!      8      5  data            bytes, NUL padded
//!     13      4  status          i32 LE
//!     17     15  ip              bytes, NUL padded
//!     32     20  topic           bytes, NUL padded
//!     52      4  channel_handle  i32 LE
//!     56      4  slot            i32 LE (-1 when unregistered)
//! ```

pub mod error;
pub mod record;
pub mod writer;

pub use error::ProtocolError;
pub use record::{StatusRecord, DATA_LEN, IP_LEN, PIPE_BUF_MIN, RECORD_SIZE, TOPIC_LEN};
pub use writer::StatusWriter;
