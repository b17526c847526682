//! Media transport adapter.
//!
//! Once a call is `Active`, fetches a session credential, joins the
//! channel on the external transport, and publishes local audio. Media
//! failures never end the call; they are reported as `MediaEvent::Error`
//! and the call continues signaling-only.

mod credentials;
mod session;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use credentials::{fetch_with_retry, CredentialService, HttpCredentialService, RetryPolicy};
pub use session::{MediaAdapter, MediaPhase, MediaSession, MediaSettings};
pub use transport::{JoinRequest, MediaChannel, MediaTransport, SignalingOnlyTransport};
pub use types::{
    CredentialError, MediaError, MediaEvent, RemoteStreamEvent, SessionCredential, StreamId,
};
