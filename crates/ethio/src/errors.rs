use thiserror::Error;

/// Wire codec failures. Anything here means the peer sent bytes we cannot
/// interpret; callers treat it as peer misbehavior.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("rlp: {0}")]
    Rlp(#[from] alloy_rlp::Error),

    #[error("unknown message id: {0:#04x}")]
    UnknownMessageId(u8),
}

/// Stateless block and transaction checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ommers hash mismatch")]
    OmmersHashMismatch,

    #[error("transactions root mismatch")]
    TransactionsRootMismatch,

    #[error("unusable signature v value: {0}")]
    InvalidSignatureV(u64),

    #[error("signature recovery failed")]
    BadSignature,
}

/// Io-layer failures above the codec.
#[derive(Debug, Error)]
pub enum EthIoError {
    #[error("no free discovery port in {0}..={1}")]
    PortsExhausted(u16, u16),

    #[error("malformed enode url: {0}")]
    MalformedEnode(String),

    #[error("wire: {0}")]
    Wire(#[from] WireError),
}
