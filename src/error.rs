use thiserror::Error;

/// Errors surfaced by the block pipeline, the announce ring and the codecs.
///
/// Validation errors always leave chain state untouched. Failures detected
/// after validation, during commit, are invariant violations and terminate
/// the process instead of appearing here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("already initialised")]
    AlreadyInitialised,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("previous block digest does not match")]
    PreviousBlockDigestDoesNotMatch,

    #[error("invalid block header version")]
    InvalidBlockHeaderVersion,

    #[error("block version must not decrease")]
    BlockVersionMustNotDecrease,

    #[error("invalid block header timestamp")]
    InvalidBlockHeaderTimestamp,

    #[error("transaction already exists")]
    TransactionAlreadyExists,

    #[error("double transfer attempt")]
    DoubleTransferAttempt,

    #[error("transaction count out of range")]
    TransactionCountOutOfRange,

    #[error("merkle root does not match")]
    MerkleRootDoesNotMatch,

    #[error("missing block owner")]
    MissingBlockOwner,

    #[error("block not found")]
    BlockNotFound,

    #[error("no connections available")]
    NoConnectionsAvailable,

    // codec and signature errors, propagated unchanged by the validator

    #[error("invalid block header size")]
    InvalidBlockHeaderSize,

    #[error("not a transaction pack")]
    NotTransactionPack,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid currency")]
    InvalidCurrency,

    #[error("invalid currency address: {0}")]
    InvalidCurrencyAddress(String),

    #[error("invalid payment")]
    InvalidPayment,
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, ChainError>;
