//! Persistence layer: account records and one-time passcodes.

pub mod otp;
pub mod users;
