//! Streaming completion protocol: decode, assemble, and drive one exchange.

pub mod assembler;
pub mod decoder;
pub mod session;

pub use assembler::{Applied, MessageAssembler};
pub use decoder::ChunkDecoder;
pub use session::{
    SessionConfig, SessionHandle, SessionOutcome, SessionState, SessionStats, StreamSession,
};
