//! PEM normalization for harvested certificate chains.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const LINE_WIDTH: usize = 64;

/// Hard-wrap a single-line base64 string to conformant 64-column lines,
/// each terminated by a newline.
pub fn wrap_base64(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / LINE_WIDTH + 1);
    let bytes = input.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        let end = usize::min(start + LINE_WIDTH, bytes.len());
        out.push_str(&input[start..end]);
        out.push('\n');
        start = end;
    }
    out
}

/// Encode a DER certificate chain as concatenated PEM blocks, preserving
/// chain order.
pub fn chain_to_pem(chain: &[Vec<u8>]) -> String {
    let mut pem = String::new();
    for der in chain {
        pem.push_str("-----BEGIN CERTIFICATE-----\n");
        pem.push_str(&wrap_base64(&STANDARD.encode(der)));
        pem.push_str("-----END CERTIFICATE-----\n");
    }
    pem
}
