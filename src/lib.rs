/*!
# deedchain

Core of a property-title blockchain node. A *deed* is a transferable title
over a registered asset; every block additionally records an owner for the
block itself, payable in external currencies.

Two subsystems live here:

* the block ingestion pipeline: validate a packed binary block against the
  current chain state, then commit its side effects to the storage pools in
  a strict linear sequence, and
* the peer announcement ring: an ordered in-memory index of live peers that
  answers "who is my next neighbour on the overlay ring".

Transport, mining, the key-value engine and the user-facing API are
collaborators outside this crate.
*/
#[macro_use]
extern crate lazy_static;

pub mod announce;
pub mod asset;
pub mod avl;
pub mod blockchain;
pub mod blockrecord;
pub mod blockring;
pub mod constants;
pub mod crypto;
pub mod currency;
pub mod error;
pub mod genesis;
pub mod merkle;
pub mod mode;
pub mod ownership;
pub mod payment;
pub mod reservoir;
pub mod storage;
pub mod time;
pub mod transaction;

#[cfg(test)]
pub mod test_utilities;

pub use crate::error::{ChainError, Result};
