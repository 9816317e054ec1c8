//! Verification pipeline composing all response checks.
//!
//! 1. Required headers present (fail-closed); a non-empty body needs a `Digest`
//! 2. Digest matches body
//! 3. Ed25519 signature over the canonical signing string
//! 4. Freshness (not replayed, not future-dated)

use crate::client::transport::ApiResponse;
use crate::clock::Clock;
use crate::crypto::{
    digest::verify_digest, freshness::check_date_freshness, keys::AccountKey,
    signing::build_signing_string, verify::parse_signature_header,
};
use crate::errors::ResponseRejection;
use crate::TollgateError;
use base64::{engine::general_purpose::STANDARD, Engine};

/// Verify a response's authenticity and freshness with the account key.
///
/// # Errors
/// `ResponseNotGenuine` carrying the first check that failed.
pub fn verify_response(
    response: &ApiResponse,
    account_key: &AccountKey,
    clock: &dyn Clock,
) -> Result<(), TollgateError> {
    check_response(response, account_key, clock).map_err(|rejection| {
        tracing::warn!(
            path = %response.request_path,
            %rejection,
            "rejecting unauthenticated response"
        );
        TollgateError::ResponseNotGenuine(rejection)
    })
}

fn check_response(
    response: &ApiResponse,
    account_key: &AccountKey,
    clock: &dyn Clock,
) -> Result<(), ResponseRejection> {
    let signature_header = response
        .signature
        .as_deref()
        .ok_or(ResponseRejection::SignatureMissing)?;

    let date_header = response
        .date
        .as_deref()
        .ok_or(ResponseRejection::SignatureMissing)?;

    // Without a digest line the signature says nothing about the body.
    if response.digest.is_none() && !response.body.is_empty() {
        return Err(ResponseRejection::DigestMissing);
    }
    verify_digest(&response.body, response.digest.as_deref())?;

    let parsed_sig =
        parse_signature_header(signature_header).ok_or(ResponseRejection::SignatureInvalid)?;

    let signature = STANDARD
        .decode(parsed_sig.signature.as_bytes())
        .map_err(|_| ResponseRejection::SignatureInvalid)?;

    let signing_string = build_signing_string(
        response.method.as_str(),
        &response.request_path,
        &response.host,
        date_header,
        response.digest.as_deref(),
    );

    account_key
        .verify(signing_string.as_bytes(), &signature)
        .map_err(|_| ResponseRejection::SignatureInvalid)?;

    check_date_freshness(date_header, clock)?;

    Ok(())
}
