//! Oracle account layouts
//!
//! All three account kinds share a 16-byte little-endian header:
//!
//! ```text
//! 0   magic   u32   0xa1b2c3d4
//! 4   version u32
//! 8   type    u32   1 mapping, 2 product, 3 price
//! 12  size    u32   bytes in use
//! ```
//!
//! - Mapping: product count at 16, next mapping at 24..56, product keys
//!   from 56, 32 bytes each.
//! - Product: price account at 16..48, then attribute pairs of
//!   u8-length-prefixed key and value strings up to `size`.
//! - Price: exponent at 20, aggregate price/confidence/status at
//!   208/216/224.
//!
//! Parsers never panic; anything short or inconsistent is a
//! [`LayoutError`].

use std::collections::BTreeMap;

use thiserror::Error;

use super::ledger::AccountKey;

pub const MAGIC: u32 = 0xa1b2_c3d4;
pub const VERSION: u32 = 2;

const HEADER_LEN: usize = 16;
const MAPPING_KEYS_OFFSET: usize = 56;
const PRODUCT_ATTRS_OFFSET: usize = 48;
const PRICE_EXPONENT_OFFSET: usize = 20;
const PRICE_AGG_OFFSET: usize = 208;
pub const PRICE_MIN_LEN: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    Mapping = 1,
    Product = 2,
    Price = 3,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("account too short: {len} bytes, need {need}")]
    TooShort { len: usize, need: usize },

    #[error("bad magic 0x{0:08x}")]
    BadMagic(u32),

    #[error("expected account type {expected:?}, found {found}")]
    WrongType { expected: AccountType, found: u32 },

    #[error("attribute at offset {offset} runs past {end}")]
    Attribute { offset: usize, end: usize },

    #[error("attribute at offset {offset} is not valid utf-8")]
    Utf8 { offset: usize },
}

/// Product directory page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub products: Vec<AccountKey>,
    /// Next page in the chain, if any.
    pub next: Option<AccountKey>,
}

/// Product descriptor with its attribute table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub price_account: AccountKey,
    pub attributes: BTreeMap<String, String>,
}

impl Product {
    /// Display symbol: the exchange alias when present, else the
    /// canonical symbol.
    pub fn display_symbol(&self) -> Option<&str> {
        ["nasdaq_symbol", "cms_symbol", "symbol"]
            .iter()
            .find_map(|k| self.attributes.get(*k))
            .map(String::as_str)
    }

    pub fn asset_type(&self) -> Option<&str> {
        self.attributes.get("asset_type").map(String::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.attributes.get("description").map(String::as_str)
    }
}

/// Aggregate price status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceStatus {
    Unknown,
    Trading,
    Halted,
    Auction,
}

impl From<u32> for PriceStatus {
    fn from(raw: u32) -> Self {
        match raw {
            1 => PriceStatus::Trading,
            2 => PriceStatus::Halted,
            3 => PriceStatus::Auction,
            _ => PriceStatus::Unknown,
        }
    }
}

/// Aggregate price scaled by the account exponent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceData {
    pub exponent: i32,
    pub price: f64,
    pub confidence: f64,
    pub status: PriceStatus,
}

pub fn parse_mapping(data: &[u8]) -> Result<Mapping, LayoutError> {
    check_header(data, AccountType::Mapping, MAPPING_KEYS_OFFSET)?;

    let count = read_u32(data, 16)? as usize;
    let need = MAPPING_KEYS_OFFSET + count * 32;
    if data.len() < need {
        return Err(LayoutError::TooShort {
            len: data.len(),
            need,
        });
    }

    let products = (0..count)
        .filter_map(|i| {
            let start = MAPPING_KEYS_OFFSET + i * 32;
            AccountKey::from_slice(&data[start..start + 32])
        })
        .collect();
    let next = read_key(data, 24)?;

    Ok(Mapping {
        products,
        next: (!next.is_zero()).then_some(next),
    })
}

pub fn parse_product(data: &[u8]) -> Result<Product, LayoutError> {
    check_header(data, AccountType::Product, PRODUCT_ATTRS_OFFSET)?;

    let price_account = read_key(data, 16)?;
    let end = (read_u32(data, 12)? as usize).min(data.len());

    let mut attributes = BTreeMap::new();
    let mut offset = PRODUCT_ATTRS_OFFSET;
    while offset < end {
        let (key, next) = read_attr(data, offset, end)?;
        if next >= end {
            break;
        }
        let (value, after) = read_attr(data, next, end)?;
        if !key.is_empty() {
            attributes.insert(key, value);
        }
        offset = after;
    }

    Ok(Product {
        price_account,
        attributes,
    })
}

pub fn parse_price(data: &[u8]) -> Result<PriceData, LayoutError> {
    check_header(data, AccountType::Price, PRICE_MIN_LEN)?;

    let exponent = read_i32(data, PRICE_EXPONENT_OFFSET)?;
    let raw_price = read_i64(data, PRICE_AGG_OFFSET)?;
    let raw_conf = read_u64(data, PRICE_AGG_OFFSET + 8)?;
    let status = read_u32(data, PRICE_AGG_OFFSET + 16)?;

    let scale = 10f64.powi(exponent);
    Ok(PriceData {
        exponent,
        price: raw_price as f64 * scale,
        confidence: raw_conf as f64 * scale,
        status: status.into(),
    })
}

fn check_header(data: &[u8], expected: AccountType, min_len: usize) -> Result<(), LayoutError> {
    if data.len() < min_len.max(HEADER_LEN) {
        return Err(LayoutError::TooShort {
            len: data.len(),
            need: min_len.max(HEADER_LEN),
        });
    }
    let magic = read_u32(data, 0)?;
    if magic != MAGIC {
        return Err(LayoutError::BadMagic(magic));
    }
    let found = read_u32(data, 8)?;
    if found != expected as u32 {
        return Err(LayoutError::WrongType { expected, found });
    }
    Ok(())
}

fn read_attr(data: &[u8], offset: usize, end: usize) -> Result<(String, usize), LayoutError> {
    let len = *data.get(offset).ok_or(LayoutError::Attribute { offset, end })? as usize;
    let start = offset + 1;
    let stop = start + len;
    if stop > end {
        return Err(LayoutError::Attribute { offset, end });
    }
    let text = std::str::from_utf8(&data[start..stop]).map_err(|_| LayoutError::Utf8 { offset })?;
    Ok((text.to_string(), stop))
}

fn bytes<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], LayoutError> {
    data.get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(LayoutError::TooShort {
            len: data.len(),
            need: offset + N,
        })
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, LayoutError> {
    bytes(data, offset).map(u32::from_le_bytes)
}

fn read_i32(data: &[u8], offset: usize) -> Result<i32, LayoutError> {
    bytes(data, offset).map(i32::from_le_bytes)
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, LayoutError> {
    bytes(data, offset).map(u64::from_le_bytes)
}

fn read_i64(data: &[u8], offset: usize) -> Result<i64, LayoutError> {
    bytes(data, offset).map(i64::from_le_bytes)
}

fn read_key(data: &[u8], offset: usize) -> Result<AccountKey, LayoutError> {
    bytes::<32>(data, offset).map(AccountKey::new)
}

// Writers for building fixtures in tests and test doubles.

fn header(kind: AccountType, size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(size);
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(kind as u32).to_le_bytes());
    out.extend_from_slice(&(size as u32).to_le_bytes());
    out
}

/// Encode a mapping account.
pub fn encode_mapping(products: &[AccountKey], next: Option<AccountKey>) -> Vec<u8> {
    let size = MAPPING_KEYS_OFFSET + products.len() * 32;
    let mut out = header(AccountType::Mapping, size);
    out.extend_from_slice(&(products.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(next.unwrap_or(AccountKey::new([0; 32])).as_bytes());
    for key in products {
        out.extend_from_slice(key.as_bytes());
    }
    out
}

/// Encode a product account. Keys and values longer than 255 bytes are cut.
pub fn encode_product(price_account: AccountKey, attributes: &[(&str, &str)]) -> Vec<u8> {
    let mut attrs = Vec::new();
    for (key, value) in attributes {
        for text in [key, value] {
            let raw = &text.as_bytes()[..text.len().min(u8::MAX as usize)];
            attrs.push(raw.len() as u8);
            attrs.extend_from_slice(raw);
        }
    }
    let size = PRODUCT_ATTRS_OFFSET + attrs.len();
    let mut out = header(AccountType::Product, size);
    out.extend_from_slice(price_account.as_bytes());
    out.extend_from_slice(&attrs);
    out
}

/// Encode a price account with the given aggregate.
pub fn encode_price(exponent: i32, price: i64, confidence: u64, status: u32) -> Vec<u8> {
    let mut out = header(AccountType::Price, PRICE_MIN_LEN);
    out.resize(PRICE_MIN_LEN, 0);
    out[PRICE_EXPONENT_OFFSET..PRICE_EXPONENT_OFFSET + 4].copy_from_slice(&exponent.to_le_bytes());
    out[PRICE_AGG_OFFSET..PRICE_AGG_OFFSET + 8].copy_from_slice(&price.to_le_bytes());
    out[PRICE_AGG_OFFSET + 8..PRICE_AGG_OFFSET + 16].copy_from_slice(&confidence.to_le_bytes());
    out[PRICE_AGG_OFFSET + 16..PRICE_AGG_OFFSET + 20].copy_from_slice(&status.to_le_bytes());
    out
}
