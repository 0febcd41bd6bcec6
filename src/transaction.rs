use crate::crypto::{verify, DeedHash, DeedPublicKey, DeedSignature};
use crate::currency::{Currency, PaymentMap};
use crate::error::{ChainError, Result};
use std::convert::TryInto;

// record tags, one byte at the front of every packed record
const TAG_OLD_BASE_DATA: u8 = 0x01;
const TAG_ASSET_DATA: u8 = 0x02;
const TAG_DEED_ISSUE: u8 = 0x03;
const TAG_DEED_TRANSFER_UNRATIFIED: u8 = 0x04;
const TAG_DEED_TRANSFER_COUNTERSIGNED: u8 = 0x05;
const TAG_BLOCK_FOUNDATION: u8 = 0x06;
const TAG_BLOCK_OWNER_TRANSFER: u8 = 0x07;

/// Pre-foundation base record: one currency and its payment address,
/// signed by the block owner. Only ever valid at the front of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct OldBaseData {
    pub currency: Currency,
    pub payment_address: String,
    pub owner: DeedPublicKey,
    pub nonce: u64,
    pub signature: DeedSignature,
}

/// Registration of an asset that deeds can subsequently be issued over
#[derive(Debug, Clone, PartialEq)]
pub struct AssetData {
    pub name: String,
    pub fingerprint: String,
    pub metadata: String,
    pub registrant: DeedPublicKey,
    pub signature: DeedSignature,
}

/// Issue of a new deed over a registered asset
#[derive(Debug, Clone, PartialEq)]
pub struct DeedIssue {
    pub asset_id: DeedHash,
    pub owner: DeedPublicKey,
    pub nonce: u64,
    pub signature: DeedSignature,
}

/// One-party transfer of a deed; `link` names the transaction being spent
#[derive(Debug, Clone, PartialEq)]
pub struct DeedTransferUnratified {
    pub link: DeedHash,
    pub owner: DeedPublicKey,
    pub signature: DeedSignature,
}

/// Two-party transfer; the new owner countersigns the linked record
#[derive(Debug, Clone, PartialEq)]
pub struct DeedTransferCountersigned {
    pub link: DeedHash,
    pub owner: DeedPublicKey,
    pub signature: DeedSignature,
    pub countersignature: DeedSignature,
}

/// The block's own ownership record with its payment addresses
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFoundation {
    pub version: u64,
    pub payments: PaymentMap,
    pub owner: DeedPublicKey,
    pub nonce: u64,
    pub signature: DeedSignature,
}

/// Transfer of a previously founded block to a new owner
#[derive(Debug, Clone, PartialEq)]
pub struct BlockOwnerTransfer {
    pub link: DeedHash,
    pub version: u64,
    pub payments: PaymentMap,
    pub owner: DeedPublicKey,
    pub signature: DeedSignature,
}

/// The closed set of records a block may carry.
///
/// Adding a variant is a consensus change; every consumer matches
/// exhaustively so the compiler finds them all.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionRecord {
    OldBaseData(OldBaseData),
    AssetData(AssetData),
    DeedIssue(DeedIssue),
    DeedTransferUnratified(DeedTransferUnratified),
    DeedTransferCountersigned(DeedTransferCountersigned),
    BlockFoundation(BlockFoundation),
    BlockOwnerTransfer(BlockOwnerTransfer),
}

//
// byte cursor helpers; integers big-endian, variable strings carry a u16
// length prefix, fixed-width arrays raw
//

fn put_str(vbytes: &mut Vec<u8>, s: &str) {
    vbytes.extend(&(s.len() as u16).to_be_bytes());
    vbytes.extend(s.as_bytes());
}

fn get_u8(data: &[u8], offset: &mut usize) -> Result<u8> {
    let b = *data.get(*offset).ok_or(ChainError::NotTransactionPack)?;
    *offset += 1;
    Ok(b)
}

fn get_u64(data: &[u8], offset: &mut usize) -> Result<u64> {
    if *offset + 8 > data.len() {
        return Err(ChainError::NotTransactionPack);
    }
    let n = u64::from_be_bytes(data[*offset..*offset + 8].try_into().unwrap());
    *offset += 8;
    Ok(n)
}

fn get_str(data: &[u8], offset: &mut usize) -> Result<String> {
    if *offset + 2 > data.len() {
        return Err(ChainError::NotTransactionPack);
    }
    let len = u16::from_be_bytes(data[*offset..*offset + 2].try_into().unwrap()) as usize;
    *offset += 2;
    if *offset + len > data.len() {
        return Err(ChainError::NotTransactionPack);
    }
    let s = String::from_utf8(data[*offset..*offset + len].to_vec())
        .map_err(|_| ChainError::NotTransactionPack)?;
    *offset += len;
    Ok(s)
}

fn get_array<const N: usize>(data: &[u8], offset: &mut usize) -> Result<[u8; N]> {
    if *offset + N > data.len() {
        return Err(ChainError::NotTransactionPack);
    }
    let a = data[*offset..*offset + N].try_into().unwrap();
    *offset += N;
    Ok(a)
}

fn get_payments(data: &[u8], offset: &mut usize) -> Result<PaymentMap> {
    let (payments, consumed) = PaymentMap::unpack(&data[*offset..])?;
    *offset += consumed;
    Ok(payments)
}

impl TransactionRecord {
    /// Unpack one record from the front of `data`, returning the record and
    /// the number of bytes it occupied. The tx id of the record is the
    /// digest of exactly those bytes.
    pub fn unpack(data: &[u8], testing: bool) -> Result<(TransactionRecord, usize)> {
        let mut offset = 0;
        let tag = get_u8(data, &mut offset)?;
        let record = match tag {
            TAG_OLD_BASE_DATA => {
                let currency = Currency::from_code(get_u8(data, &mut offset)?)?;
                let payment_address = get_str(data, &mut offset)?;
                currency.validate_address(&payment_address, testing)?;
                let owner = get_array::<33>(data, &mut offset)?;
                let nonce = get_u64(data, &mut offset)?;
                let signature = get_array::<64>(data, &mut offset)?;
                TransactionRecord::OldBaseData(OldBaseData {
                    currency,
                    payment_address,
                    owner,
                    nonce,
                    signature,
                })
            }
            TAG_ASSET_DATA => {
                let name = get_str(data, &mut offset)?;
                let fingerprint = get_str(data, &mut offset)?;
                let metadata = get_str(data, &mut offset)?;
                let registrant = get_array::<33>(data, &mut offset)?;
                let signature = get_array::<64>(data, &mut offset)?;
                TransactionRecord::AssetData(AssetData {
                    name,
                    fingerprint,
                    metadata,
                    registrant,
                    signature,
                })
            }
            TAG_DEED_ISSUE => {
                let asset_id = get_array::<32>(data, &mut offset)?;
                let owner = get_array::<33>(data, &mut offset)?;
                let nonce = get_u64(data, &mut offset)?;
                let signature = get_array::<64>(data, &mut offset)?;
                TransactionRecord::DeedIssue(DeedIssue {
                    asset_id,
                    owner,
                    nonce,
                    signature,
                })
            }
            TAG_DEED_TRANSFER_UNRATIFIED => {
                let link = get_array::<32>(data, &mut offset)?;
                let owner = get_array::<33>(data, &mut offset)?;
                let signature = get_array::<64>(data, &mut offset)?;
                TransactionRecord::DeedTransferUnratified(DeedTransferUnratified {
                    link,
                    owner,
                    signature,
                })
            }
            TAG_DEED_TRANSFER_COUNTERSIGNED => {
                let link = get_array::<32>(data, &mut offset)?;
                let owner = get_array::<33>(data, &mut offset)?;
                let signature = get_array::<64>(data, &mut offset)?;
                let countersignature = get_array::<64>(data, &mut offset)?;
                TransactionRecord::DeedTransferCountersigned(DeedTransferCountersigned {
                    link,
                    owner,
                    signature,
                    countersignature,
                })
            }
            TAG_BLOCK_FOUNDATION => {
                let version = get_u64(data, &mut offset)?;
                let payments = get_payments(data, &mut offset)?;
                let owner = get_array::<33>(data, &mut offset)?;
                let nonce = get_u64(data, &mut offset)?;
                let signature = get_array::<64>(data, &mut offset)?;
                TransactionRecord::BlockFoundation(BlockFoundation {
                    version,
                    payments,
                    owner,
                    nonce,
                    signature,
                })
            }
            TAG_BLOCK_OWNER_TRANSFER => {
                let link = get_array::<32>(data, &mut offset)?;
                let version = get_u64(data, &mut offset)?;
                let payments = get_payments(data, &mut offset)?;
                let owner = get_array::<33>(data, &mut offset)?;
                let signature = get_array::<64>(data, &mut offset)?;
                TransactionRecord::BlockOwnerTransfer(BlockOwnerTransfer {
                    link,
                    version,
                    payments,
                    owner,
                    signature,
                })
            }
            _ => return Err(ChainError::NotTransactionPack),
        };
        Ok((record, offset))
    }

    /// Re-pack the record, verifying its signature against `signer`.
    ///
    /// The returned bytes are identical to the form `unpack` consumed, so
    /// the digest of the result is the record's tx id. An unsigned or
    /// wrongly signed record fails with `InvalidSignature`.
    pub fn pack(&self, signer: &DeedPublicKey) -> Result<Vec<u8>> {
        let unsigned = self.pack_unsigned();
        let signature = self.signature();
        if !verify(&unsigned, signature, signer) {
            return Err(ChainError::InvalidSignature);
        }
        let mut vbytes = unsigned;
        vbytes.extend(&signature[..]);
        if let TransactionRecord::DeedTransferCountersigned(tx) = self {
            vbytes.extend(&tx.countersignature[..]);
        }
        Ok(vbytes)
    }

    /// The signature-free prefix, the byte form a signer actually signs.
    pub fn pack_unsigned(&self) -> Vec<u8> {
        let mut vbytes: Vec<u8> = vec![];
        match self {
            TransactionRecord::OldBaseData(tx) => {
                vbytes.push(TAG_OLD_BASE_DATA);
                vbytes.push(tx.currency.code());
                put_str(&mut vbytes, &tx.payment_address);
                vbytes.extend(&tx.owner[..]);
                vbytes.extend(&tx.nonce.to_be_bytes());
            }
            TransactionRecord::AssetData(tx) => {
                vbytes.push(TAG_ASSET_DATA);
                put_str(&mut vbytes, &tx.name);
                put_str(&mut vbytes, &tx.fingerprint);
                put_str(&mut vbytes, &tx.metadata);
                vbytes.extend(&tx.registrant[..]);
            }
            TransactionRecord::DeedIssue(tx) => {
                vbytes.push(TAG_DEED_ISSUE);
                vbytes.extend(&tx.asset_id);
                vbytes.extend(&tx.owner[..]);
                vbytes.extend(&tx.nonce.to_be_bytes());
            }
            TransactionRecord::DeedTransferUnratified(tx) => {
                vbytes.push(TAG_DEED_TRANSFER_UNRATIFIED);
                vbytes.extend(&tx.link);
                vbytes.extend(&tx.owner[..]);
            }
            TransactionRecord::DeedTransferCountersigned(tx) => {
                vbytes.push(TAG_DEED_TRANSFER_COUNTERSIGNED);
                vbytes.extend(&tx.link);
                vbytes.extend(&tx.owner[..]);
            }
            TransactionRecord::BlockFoundation(tx) => {
                vbytes.push(TAG_BLOCK_FOUNDATION);
                vbytes.extend(&tx.version.to_be_bytes());
                // payments were validated at unpack/creation; packing the
                // map itself cannot fail
                vbytes.extend(pack_payment_entries(&tx.payments));
                vbytes.extend(&tx.owner[..]);
                vbytes.extend(&tx.nonce.to_be_bytes());
            }
            TransactionRecord::BlockOwnerTransfer(tx) => {
                vbytes.push(TAG_BLOCK_OWNER_TRANSFER);
                vbytes.extend(&tx.link);
                vbytes.extend(&tx.version.to_be_bytes());
                vbytes.extend(pack_payment_entries(&tx.payments));
                vbytes.extend(&tx.owner[..]);
            }
        }
        vbytes
    }

    fn signature(&self) -> &DeedSignature {
        match self {
            TransactionRecord::OldBaseData(tx) => &tx.signature,
            TransactionRecord::AssetData(tx) => &tx.signature,
            TransactionRecord::DeedIssue(tx) => &tx.signature,
            TransactionRecord::DeedTransferUnratified(tx) => &tx.signature,
            TransactionRecord::DeedTransferCountersigned(tx) => &tx.signature,
            TransactionRecord::BlockFoundation(tx) => &tx.signature,
            TransactionRecord::BlockOwnerTransfer(tx) => &tx.signature,
        }
    }
}

// payment entries without address validation, for deterministic re-packing
fn pack_payment_entries(payments: &PaymentMap) -> Vec<u8> {
    let mut vbytes: Vec<u8> = vec![payments.0.len() as u8];
    for (currency, address) in &payments.0 {
        vbytes.push(currency.code());
        put_str(&mut vbytes, address);
    }
    vbytes
}

impl AssetData {
    /// Asset id: digest of the fingerprint alone, so re-registration of the
    /// same material maps to the same asset.
    pub fn asset_id(&self) -> DeedHash {
        crate::crypto::hash(self.fingerprint.as_bytes())
    }
}

/// Validate the payment map carried by a foundation-class record.
///
/// Versions 1 and 2 exist; version 2 requires both a Bitcoin and a
/// Litecoin entry. Every address must parse for its currency on the
/// selected network.
pub fn check_payments(version: u64, testing: bool, payments: &PaymentMap) -> Result<()> {
    if version < 1 || version > 2 {
        return Err(ChainError::InvalidPayment);
    }
    if payments.is_empty() {
        return Err(ChainError::InvalidPayment);
    }
    for (currency, address) in &payments.0 {
        currency.validate_address(address, testing)?;
    }
    if version == 2 && !(payments.contains(Currency::Bitcoin) && payments.contains(Currency::Litecoin))
    {
        return Err(ChainError::InvalidPayment);
    }
    Ok(())
}
