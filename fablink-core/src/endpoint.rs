//! Node endpoint rewriting.
//!
//! The control plane advertises node addresses as plain HTTP(S) URLs; ledger
//! clients dial the same hosts over TLS-secured gRPC on port 443.

/// Rewrite an advertised node address to a secure gRPC endpoint.
///
/// Strips a literal `http://` or `https://` scheme prefix, drops any path
/// and original port, and re-hosts the bare hostname as `grpcs://{host}:443`.
pub fn rehost_grpcs(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let host_end = rest.find([':', '/']).unwrap_or(rest.len());
    format!("grpcs://{}:443", &rest[..host_end])
}
