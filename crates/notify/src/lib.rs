//! The Notifier: subscribes to the Monitor's broadcast
//! of finalized sessions and delivers them to an external chat API, either
//! one message per session (VERBOSE) or batched on a fixed cadence (BATCH),
//! subject to a token-bucket rate limit and a quiet-hours window.

pub mod error;
pub mod message;
pub mod notifier;
pub mod quiet_hours;
pub mod rate_limiter;
pub mod ring_buffer;
pub mod transport;

pub use error::NotifyError;
pub use notifier::{Notifier, NotifierMode};
pub use quiet_hours::QuietHours;
pub use rate_limiter::RateLimiter;
pub use ring_buffer::RingBuffer;
pub use transport::{ChatTransport, HttpChatTransport};
