//! One-time delivery codes for cash-on-delivery orders.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;

use super::status::OrderStatus;

pub const CODE_LENGTH: usize = 6;
pub const CODE_TTL_MINUTES: i64 = 30;
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Reasons a verification or regeneration request is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("This order does not require verification")]
    NotRequired,
    #[error("This order is already verified")]
    AlreadyVerified,
    #[error("This order cannot be verified in its current state ({0})")]
    InvalidState(OrderStatus),
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("This verification code has already been used and cannot be reused")]
    CodeReused,
    #[error("Verification code has expired")]
    Expired,
}

impl VerificationError {
    /// Stable identifier clients switch on.
    pub fn reason(&self) -> &'static str {
        match self {
            VerificationError::NotRequired => "not_required",
            VerificationError::AlreadyVerified => "already_verified",
            VerificationError::InvalidState(_) => "invalid_state",
            VerificationError::InvalidCode => "invalid_code",
            VerificationError::CodeReused => "code_reused",
            VerificationError::Expired => "expired",
        }
    }
}

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn is_expired(generated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match generated_at {
        Some(at) => now > at + Duration::minutes(CODE_TTL_MINUTES),
        None => true,
    }
}

/// Verification-relevant slice of an order.
#[derive(Debug, Clone)]
pub struct CodeState<'a> {
    pub required: bool,
    pub delivery_verified: bool,
    pub status: OrderStatus,
    pub code: Option<&'a str>,
    pub code_verified: bool,
    pub generated_at: Option<DateTime<Utc>>,
}

impl CodeState<'_> {
    /// Check a submitted code. Rules are evaluated in a fixed order so each failure
    /// maps to exactly one reason.
    pub fn check_submission(&self, submitted: &str, now: DateTime<Utc>) -> Result<(), VerificationError> {
        let matches = self.code.is_some_and(|code| code == submitted);

        if !self.required {
            return Err(VerificationError::NotRequired);
        }
        if self.delivery_verified {
            return Err(if matches {
                VerificationError::CodeReused
            } else {
                VerificationError::AlreadyVerified
            });
        }
        if !self.status.accepts_verification() {
            return Err(VerificationError::InvalidState(self.status));
        }
        if !matches {
            return Err(VerificationError::InvalidCode);
        }
        if self.code_verified {
            return Err(VerificationError::CodeReused);
        }
        if is_expired(self.generated_at, now) {
            return Err(VerificationError::Expired);
        }
        Ok(())
    }

    pub fn check_regeneration(&self) -> Result<(), VerificationError> {
        if !self.required {
            return Err(VerificationError::NotRequired);
        }
        if self.delivery_verified {
            return Err(VerificationError::AlreadyVerified);
        }
        if !self.status.accepts_code_regeneration() {
            return Err(VerificationError::InvalidState(self.status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(now: DateTime<Utc>) -> CodeState<'static> {
        CodeState {
            required: true,
            delivery_verified: false,
            status: OrderStatus::OutForDelivery,
            code: Some("AB12CD"),
            code_verified: false,
            generated_at: Some(now - Duration::minutes(5)),
        }
    }

    #[test]
    fn generated_codes_use_the_alphabet() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn correct_fresh_code_is_accepted() {
        let now = Utc::now();
        assert_eq!(pending(now).check_submission("AB12CD", now), Ok(()));
    }

    #[test]
    fn each_failure_has_its_own_reason() {
        let now = Utc::now();

        let state = CodeState { required: false, ..pending(now) };
        assert_eq!(state.check_submission("AB12CD", now), Err(VerificationError::NotRequired));

        let state = CodeState { status: OrderStatus::Processing, ..pending(now) };
        assert_eq!(
            state.check_submission("AB12CD", now),
            Err(VerificationError::InvalidState(OrderStatus::Processing))
        );

        assert_eq!(pending(now).check_submission("ZZZZZZ", now), Err(VerificationError::InvalidCode));

        let state = CodeState { code_verified: true, ..pending(now) };
        assert_eq!(state.check_submission("AB12CD", now), Err(VerificationError::CodeReused));

        let state = CodeState { generated_at: Some(now - Duration::minutes(31)), ..pending(now) };
        assert_eq!(state.check_submission("AB12CD", now), Err(VerificationError::Expired));
    }

    #[test]
    fn resubmitting_a_consumed_code_reports_reuse() {
        let now = Utc::now();
        let state = CodeState {
            delivery_verified: true,
            code_verified: true,
            status: OrderStatus::Delivered,
            ..pending(now)
        };
        assert_eq!(state.check_submission("AB12CD", now), Err(VerificationError::CodeReused));
        assert_eq!(state.check_submission("QQQQQQ", now), Err(VerificationError::AlreadyVerified));
    }

    #[test]
    fn expiry_boundary_is_inclusive_of_thirty_minutes() {
        let at = Utc::now();
        assert!(!is_expired(Some(at), at + Duration::minutes(30)));
        assert!(is_expired(Some(at), at + Duration::minutes(30) + Duration::seconds(1)));
        assert!(is_expired(None, at));
    }

    #[test]
    fn regeneration_requires_open_unverified_order() {
        let now = Utc::now();
        assert!(CodeState { status: OrderStatus::Processing, ..pending(now) }.check_regeneration().is_ok());
        assert_eq!(
            CodeState { status: OrderStatus::Placed, ..pending(now) }.check_regeneration(),
            Err(VerificationError::InvalidState(OrderStatus::Placed))
        );
        assert_eq!(
            CodeState { delivery_verified: true, ..pending(now) }.check_regeneration(),
            Err(VerificationError::AlreadyVerified)
        );
    }
}
