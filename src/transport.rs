//! Outbound transport seam.
//!
//! The SOAP call execution, WSDL plumbing and partner authentication live
//! outside this service. The orchestration core only needs a narrow
//! contract: send a serialized message, get back either a raw response or a
//! failure signal it can classify.

use async_trait::async_trait;

use crate::classify::ErrorKind;

/// Raw failure reported by the transport layer.
///
/// When the transport already knows what went wrong (e.g. it saw a SOAP
/// fault or an HTTP 429), it sets `category` and the classifier takes that
/// at face value. Otherwise classification falls back to message text.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureSignal {
    pub category: Option<ErrorKind>,
    pub message: String,
}

impl FailureSignal {
    pub fn categorized<S: Into<String>>(category: ErrorKind, message: S) -> Self {
        Self {
            category: Some(category),
            message: message.into(),
        }
    }

    pub fn text<S: Into<String>>(message: S) -> Self {
        Self {
            category: None,
            message: message.into(),
        }
    }
}

/// Outcome of one dispatch attempt against the partner endpoint.
#[derive(Debug, Clone)]
pub enum DispatchReply {
    /// Partner accepted the message; raw response body kept for audit.
    Accepted { raw_response: String },
    /// Partner rejected the message or the call itself failed.
    Rejected(FailureSignal),
}

/// Narrow contract with the excluded SOAP transport.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Execute one outbound call with an already-serialized payload.
    ///
    /// Timeouts are the caller's responsibility; a call that exceeds the
    /// message-kind budget should be reported as a Timeout-categorized
    /// [`FailureSignal`].
    async fn send(&self, serialized_message: &str) -> DispatchReply;
}
