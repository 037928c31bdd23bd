//! IPv4 scalar functions
//!
//! `iptoa` renders a packed integer as dotted-quad text and `atoip` packs it
//! back. They double as the reference users of the custom-function machinery.

use rusqlite::types::Value;

use crate::driver::ScalarFunc;

/// Scalar functions converting IPv4 addresses to and from 32-bit integers.
pub fn ip_functions() -> Vec<ScalarFunc> {
    vec![
        ScalarFunc::new("iptoa", 1, true, |ctx| {
            let ip: i64 = ctx.get(0)?;
            Ok(Value::Text(to_ipv4(ip)))
        }),
        ScalarFunc::new("atoip", 1, true, |ctx| {
            let text: String = ctx.get(0)?;
            Ok(Value::Integer(from_ipv4(&text)))
        }),
    ]
}

fn to_ipv4(ip: i64) -> String {
    let a = (ip >> 24) & 0xFF;
    let b = (ip >> 16) & 0xFF;
    let c = (ip >> 8) & 0xFF;
    let d = ip & 0xFF;
    format!("{a}.{b}.{c}.{d}")
}

/// Anything that is not four dot-separated fields packs to -1; fields that
/// fail to parse contribute zero.
fn from_ipv4(ip: &str) -> i64 {
    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return -1;
    }
    let field = |s: &str| s.parse::<i64>().unwrap_or(0);
    (field(octets[0]) << 24) + (field(octets[1]) << 16) + (field(octets[2]) << 8) + field(octets[3])
}
