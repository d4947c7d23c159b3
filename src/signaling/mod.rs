//! Signaling layer capabilities
//!
//! The protocol itself is implemented elsewhere; this module only defines
//! what the session consumes from it.

pub mod client;
pub mod negotiation;

pub use client::{ClientEvent, DownstreamOffer, Permissions, SessionClient, UserChange};
pub use negotiation::{
    EncodingParameters, IceConnectionState, Negotiation, NegotiationEvent, NegotiationHandle,
    ReceiverInfo, RtpSender, SendParameters, TransportError,
};
