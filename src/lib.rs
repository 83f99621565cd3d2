//! # Vetrina (storefront account verification & session authentication)
//!
//! `vetrina` proves control of an email address via a one-time passcode (OTP),
//! gates login on that proof, and manages server-side session state for
//! authenticated customers and for transient flash redirect data.
//!
//! ## Accounts & verification
//!
//! Signup creates an unverified account, issues a short-lived 6-digit code and
//! dispatches it by email. Submitting the correct code within its validity
//! window flips the account to verified, exactly once. Codes are single-use:
//! the match and the delete are one logical unit, so a replayed or concurrent
//! submission can never succeed twice.
//!
//! - **Hashing:** passwords and passcodes are stored as Argon2id PHC strings,
//!   never as plaintext. Session tokens are stored as SHA-256 hashes; the raw
//!   token only ever lives in the customer's cookie.
//! - **Enumeration:** login failures return one generic invalid-credential
//!   message regardless of whether the email exists.
//! - **Supersession:** issuing a code replaces any pending code for the same
//!   email, so at most one live code exists per address at any time.
//!
//! ## Sessions & flash
//!
//! Sessions are opaque cookie tokens backed by Postgres. A flash slot carries
//! an error message plus echoed form inputs across a redirect; it is written
//! once, read once, and cleared on that read.

pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_app_user_agent() {
        assert!(APP_USER_AGENT.starts_with("vetrina/"));
    }
}
