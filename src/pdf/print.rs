//! Object serialization
//!
//! Turns objects back into PDF syntax. Two forms: the pretty form separates
//! tokens with single spaces; the tight form drops every space that a
//! delimiter already provides. Both are deterministic, which the two-pass
//! linearized write and the signature patcher rely on.

use crate::pdf::object::{Dict, Name, Object, PdfString};

/// Serialize an object into `buf`. Stream bodies are not emitted here; the
/// object writer handles `stream`/`endstream` framing itself.
pub fn append_obj(buf: &mut Vec<u8>, obj: &Object, tight: bool) {
    match obj {
        Object::Null => buf.extend_from_slice(b"null"),
        Object::Bool(true) => buf.extend_from_slice(b"true"),
        Object::Bool(false) => buf.extend_from_slice(b"false"),
        Object::Int(i) => buf.extend_from_slice(i.to_string().as_bytes()),
        Object::Real(r) => buf.extend_from_slice(format_real(*r).as_bytes()),
        Object::String(s) => append_string(buf, s),
        Object::Name(n) => append_name(buf, n),
        Object::Array(a) => {
            buf.push(b'[');
            if !tight && !a.is_empty() {
                buf.push(b' ');
            }
            for (i, item) in a.iter().enumerate() {
                if i > 0 && (!tight || needs_leading_space(item)) {
                    buf.push(b' ');
                }
                append_obj(buf, item, tight);
            }
            if !tight && !a.is_empty() {
                buf.push(b' ');
            }
            buf.push(b']');
        }
        Object::Dict(d) | Object::Stream { dict: d, .. } => append_dict(buf, d, tight),
        Object::Ref(r) => {
            buf.extend_from_slice(format!("{} {} R", r.num, r.gen).as_bytes());
        }
    }
}

/// Serialize to an owned byte vector.
pub fn obj_to_bytes(obj: &Object, tight: bool) -> Vec<u8> {
    let mut buf = Vec::new();
    append_obj(&mut buf, obj, tight);
    buf
}

fn append_dict(buf: &mut Vec<u8>, dict: &Dict, tight: bool) {
    buf.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        if !tight {
            buf.push(b' ');
        }
        append_name(buf, key);
        if !tight || needs_leading_space(value) {
            buf.push(b' ');
        }
        append_obj(buf, value, tight);
    }
    if !tight {
        buf.push(b' ');
    }
    buf.extend_from_slice(b">>");
}

/// In tight form, a token that starts with a regular character still needs a
/// space to separate it from a preceding regular character; tokens opening
/// with a delimiter do not.
fn needs_leading_space(obj: &Object) -> bool {
    !matches!(
        obj,
        Object::String(_)
            | Object::Name(_)
            | Object::Array(_)
            | Object::Dict(_)
            | Object::Stream { .. }
    )
}

fn append_name(buf: &mut Vec<u8>, name: &Name) {
    buf.push(b'/');
    for &b in name.as_str().as_bytes() {
        if is_regular_name_char(b) {
            buf.push(b);
        } else {
            buf.push(b'#');
            buf.extend_from_slice(format!("{:02x}", b).as_bytes());
        }
    }
}

fn is_regular_name_char(b: u8) -> bool {
    if !(b'!'..=b'~').contains(&b) {
        return false;
    }
    !matches!(
        b,
        b'#' | b'/' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'%'
    )
}

fn append_string(buf: &mut Vec<u8>, s: &PdfString) {
    let bytes = s.as_bytes();
    if bytes.iter().all(|&b| is_literal_friendly(b)) {
        buf.push(b'(');
        for &b in bytes {
            match b {
                b'\n' => buf.extend_from_slice(b"\\n"),
                b'\r' => buf.extend_from_slice(b"\\r"),
                b'\t' => buf.extend_from_slice(b"\\t"),
                b'(' => buf.extend_from_slice(b"\\("),
                b')' => buf.extend_from_slice(b"\\)"),
                b'\\' => buf.extend_from_slice(b"\\\\"),
                _ => buf.push(b),
            }
        }
        buf.push(b')');
    } else {
        buf.push(b'<');
        for &b in bytes {
            buf.extend_from_slice(format!("{:02x}", b).as_bytes());
        }
        buf.push(b'>');
    }
}

fn is_literal_friendly(b: u8) -> bool {
    (32..=126).contains(&b) || b == b'\n' || b == b'\r' || b == b'\t'
}

fn format_real(r: f64) -> String {
    if !r.is_finite() {
        return "0".to_string();
    }
    let mut s = format!("{:.6}", r);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}
