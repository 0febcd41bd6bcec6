use crate::crypto::hash;
use crate::error::{ChainError, Result};
use base58::{FromBase58, ToBase58};
use std::collections::BTreeMap;
use std::convert::TryInto;

/// Currencies accepted for block-owner payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Currency {
    Bitcoin,
    Litecoin,
}

// base58check version bytes
const BITCOIN_LIVE_VERSIONS: [u8; 2] = [0x00, 0x05];
const BITCOIN_TEST_VERSIONS: [u8; 2] = [0x6f, 0xc4];
const LITECOIN_LIVE_VERSIONS: [u8; 2] = [0x30, 0x32];
const LITECOIN_TEST_VERSIONS: [u8; 2] = [0x6f, 0x3a];

impl Currency {
    pub fn code(self) -> u8 {
        match self {
            Currency::Bitcoin => 1,
            Currency::Litecoin => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Currency> {
        match code {
            1 => Ok(Currency::Bitcoin),
            2 => Ok(Currency::Litecoin),
            _ => Err(ChainError::InvalidCurrency),
        }
    }

    /// Name used to key payment handlers and discovery frames
    pub fn name(self) -> &'static str {
        match self {
            Currency::Bitcoin => "bitcoin",
            Currency::Litecoin => "litecoin",
        }
    }

    /// Check a payment address for this currency on the selected network.
    pub fn validate_address(self, address: &str, testing: bool) -> Result<()> {
        let payload = base58check_decode(address)?;
        let versions = match (self, testing) {
            (Currency::Bitcoin, false) => BITCOIN_LIVE_VERSIONS,
            (Currency::Bitcoin, true) => BITCOIN_TEST_VERSIONS,
            (Currency::Litecoin, false) => LITECOIN_LIVE_VERSIONS,
            (Currency::Litecoin, true) => LITECOIN_TEST_VERSIONS,
        };
        if !versions.contains(&payload[0]) {
            return Err(ChainError::InvalidCurrencyAddress(address.to_string()));
        }
        Ok(())
    }
}

// decode and checksum-verify a base58check address, returning the 21-byte
// version+hash payload
fn base58check_decode(address: &str) -> Result<[u8; 21]> {
    let raw = address
        .from_base58()
        .map_err(|_| ChainError::InvalidCurrencyAddress(address.to_string()))?;
    if raw.len() != 25 {
        return Err(ChainError::InvalidCurrencyAddress(address.to_string()));
    }
    let checksum = &hash(&hash(&raw[..21]))[..4];
    if checksum != &raw[21..] {
        return Err(ChainError::InvalidCurrencyAddress(address.to_string()));
    }
    Ok(raw[..21].try_into().unwrap())
}

fn base58check_encode(payload: &[u8; 21]) -> String {
    let mut raw = payload.to_vec();
    raw.extend(&hash(&hash(payload))[..4]);
    raw.to_base58()
}

/// Derive the Litecoin rendering of a Bitcoin payment address.
///
/// The hashed key material is shared; only the version byte and checksum
/// change. Used for single-base-record blocks that predate explicit
/// Litecoin payment entries.
pub fn litecoin_from_bitcoin(address: &str) -> Result<String> {
    let mut payload = base58check_decode(address)?;
    payload[0] = match payload[0] {
        0x00 => 0x30,
        0x05 => 0x32,
        0x6f => 0x6f,
        0xc4 => 0x3a,
        _ => return Err(ChainError::InvalidCurrencyAddress(address.to_string())),
    };
    Ok(base58check_encode(&payload))
}

/// Map of currency to payment address carried by foundation-class records.
///
/// A `BTreeMap` keeps the packed form canonical: entries pack in ascending
/// currency-code order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentMap(pub BTreeMap<Currency, String>);

impl PaymentMap {
    pub fn new() -> Self {
        PaymentMap(BTreeMap::new())
    }

    pub fn insert(&mut self, currency: Currency, address: String) {
        self.0.insert(currency, address);
    }

    pub fn get(&self, currency: Currency) -> Option<&String> {
        self.0.get(&currency)
    }

    pub fn contains(&self, currency: Currency) -> bool {
        self.0.contains_key(&currency)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pack to bytes, validating every address for its currency on the
    /// selected network.
    pub fn pack(&self, testing: bool) -> Result<Vec<u8>> {
        if self.0.is_empty() {
            return Err(ChainError::InvalidPayment);
        }
        let mut vbytes: Vec<u8> = vec![self.0.len() as u8];
        for (currency, address) in &self.0 {
            currency.validate_address(address, testing)?;
            vbytes.push(currency.code());
            vbytes.extend(&(address.len() as u16).to_be_bytes());
            vbytes.extend(address.as_bytes());
        }
        Ok(vbytes)
    }

    /// Unpack from the front of `data`, returning the map and the bytes
    /// consumed.
    pub fn unpack(data: &[u8]) -> Result<(PaymentMap, usize)> {
        if data.is_empty() {
            return Err(ChainError::InvalidPayment);
        }
        let count = data[0] as usize;
        let mut map = PaymentMap::new();
        let mut offset = 1;
        for _ in 0..count {
            if offset + 3 > data.len() {
                return Err(ChainError::InvalidPayment);
            }
            let currency = Currency::from_code(data[offset])?;
            let len =
                u16::from_be_bytes(data[offset + 1..offset + 3].try_into().unwrap()) as usize;
            offset += 3;
            if offset + len > data.len() {
                return Err(ChainError::InvalidPayment);
            }
            let address = String::from_utf8(data[offset..offset + len].to_vec())
                .map_err(|_| ChainError::InvalidPayment)?;
            offset += len;
            map.insert(currency, address);
        }
        Ok((map, offset))
    }
}
