//! PDF stream filters
//!
//! The writer only ever encodes with Flate and ASCIIHex; decoding supports
//! the filters that stream expansion can meet on non-image, non-font
//! streams. Image and font compression schemes (DCT, CCITT, JBIG2, JPX, ...)
//! are recognized for classification but never decoded here.

pub mod asciihex;
pub mod flate;

pub use asciihex::{decode_ascii_hex, encode_ascii_hex};
pub use flate::{decode_flate, decode_flate_tolerant, encode_flate};

use crate::fitz::error::{Error, Result};
use crate::pdf::object::{Dict, Object};

/// Filters understood by the decode chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    FlateDecode,
    ASCIIHexDecode,
}

impl FilterType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FlateDecode" | "Fl" => Some(FilterType::FlateDecode),
            "ASCIIHexDecode" | "AHx" => Some(FilterType::ASCIIHexDecode),
            _ => None,
        }
    }
}

/// Collect the filter chain named by a stream dictionary, first filter first.
pub fn filter_chain(dict: &Dict) -> Result<Vec<FilterType>> {
    let mut chain = Vec::new();
    match dict.get("Filter") {
        None => {}
        Some(Object::Name(n)) => chain.push(named_filter(n.as_str())?),
        Some(Object::Array(a)) => {
            for item in a {
                match item {
                    Object::Name(n) => chain.push(named_filter(n.as_str())?),
                    Object::Null => {}
                    _ => return Err(Error::syntax("non-name entry in /Filter array")),
                }
            }
        }
        Some(_) => return Err(Error::syntax("/Filter is neither a name nor an array")),
    }
    Ok(chain)
}

fn named_filter(name: &str) -> Result<FilterType> {
    FilterType::from_name(name)
        .ok_or_else(|| Error::unsupported(format!("cannot decode /{} stream", name)))
}

/// Run the stream's filter chain over `data`, producing the raw bytes.
///
/// With `truncated` supplied, a damaged Flate stream yields its salvageable
/// prefix and sets the flag; without it the damage is an error.
pub fn decode_stream(dict: &Dict, data: &[u8], mut truncated: Option<&mut bool>) -> Result<Vec<u8>> {
    if let Some(parms) = dict.get("DecodeParms") {
        if predictor_in_use(parms) {
            return Err(Error::unsupported("predictor DecodeParms"));
        }
    }
    let mut out = data.to_vec();
    for filter in filter_chain(dict)? {
        out = match filter {
            FilterType::ASCIIHexDecode => decode_ascii_hex(&out)?,
            FilterType::FlateDecode => match truncated.as_deref_mut() {
                Some(flag) => decode_flate_tolerant(&out, flag),
                None => decode_flate(&out)?,
            },
        };
    }
    Ok(out)
}

fn predictor_in_use(parms: &Object) -> bool {
    let check = |d: &Dict| {
        d.get("Predictor")
            .and_then(|p| p.as_int())
            .map(|p| p > 1)
            .unwrap_or(false)
    };
    match parms {
        Object::Dict(d) => check(d),
        Object::Array(a) => a.iter().any(|o| o.as_dict().map(check).unwrap_or(false)),
        _ => false,
    }
}
