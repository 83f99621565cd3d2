//! Verification and session endpoints.
//!
//! The flows form a small state machine per email:
//! `Unregistered -> Registered(unverified) -> Verified`. Signup creates the
//! unverified account and issues a code; verify consumes the code and flips
//! the flag exactly once; login against an unverified account re-issues a code
//! instead of authenticating; login against a verified account rotates to an
//! authenticated session.

pub mod login;
pub mod session;
pub mod signup;
pub mod types;
pub mod verify;

mod flash;
mod state;
mod storage;
mod utils;

pub use state::AuthConfig;
