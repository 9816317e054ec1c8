//! Canonical signing string for response verification
//! (draft-cavage-http-signatures, as used by Keygen).
//!
//! ```text
//! (request-target): get /v1/accounts/<id>/machines/<id>
//! host: api.keygen.sh
//! date: <Date header>
//! digest: sha-256=<base64>
//! ```

/// Build the signing string for response signature verification.
///
/// Components are newline-delimited with no trailing newline. The method is
/// lowercased. The digest line is present only when the response carried a
/// `Digest` header.
pub fn build_signing_string(
    method: &str,
    path: &str,
    host: &str,
    date: &str,
    digest_header: Option<&str>,
) -> String {
    let base = format!(
        "(request-target): {} {}\nhost: {}\ndate: {}",
        method.to_lowercase(),
        path,
        host,
        date
    );

    match digest_header {
        Some(digest) => format!("{}\ndigest: {}", base, digest),
        None => base,
    }
}
