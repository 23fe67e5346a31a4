/// A transaction as seen on its origin chain, reduced to what the marking
/// policy and the unified form need.
pub trait ForeignTx {
    /// Chain-native transaction identifier.
    fn tx_id(&self) -> String;

    /// Sender identity used for settlement-window lookups.
    fn sender(&self) -> String;

    /// Sender identity matched against the designated wallet, when the
    /// chain distinguishes it from [`ForeignTx::sender`] (Lisk exposes the
    /// generator public key separately from the address).
    fn sender_key(&self) -> Option<String>;

    /// Recipient identity; absent for non-transfer shapes such as contract
    /// creation.
    fn recipient(&self) -> Option<String>;

    /// Transferred amount as big-endian bytes in chain-native units.
    fn value_bytes(&self) -> Vec<u8>;

    /// Whether this is a plain value transfer on its chain.
    fn is_value_transfer(&self) -> bool;
}

/// A validated foreign block ready for translation.
///
/// Implementations normalize chain-specific encodings up front: the
/// timestamp is already in milliseconds since the Unix epoch and the merkle
/// root is already the chain's transaction digest in hex.
pub trait ForeignBlock {
    type Tx: ForeignTx;

    fn height(&self) -> u64;
    fn block_id(&self) -> String;
    fn parent_id(&self) -> String;
    fn timestamp_ms(&self) -> u64;
    fn merkle_root(&self) -> String;
    fn transactions(&self) -> &[Self::Tx];
}
