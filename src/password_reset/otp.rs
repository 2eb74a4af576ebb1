use rand::{rngs::OsRng, Rng};
use uuid::Uuid;

pub const CODE_RANGE: std::ops::RangeInclusive<u16> = 1000..=9999;

/// Four-digit code drawn from the OS CSPRNG.
pub fn generate_code() -> String {
    OsRng.gen_range(CODE_RANGE).to_string()
}

/// Compares without short-circuiting on the first differing byte.
pub fn codes_match(stored: &str, submitted: &str) -> bool {
    let (a, b) = (stored.as_bytes(), submitted.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn otp_key(user_id: Uuid) -> String {
    format!("otp_{user_id}")
}

pub fn verified_key(user_id: Uuid) -> String {
    format!("otp_verified_{user_id}")
}

/// Failed verifications against the current code.
pub fn attempts_key(user_id: Uuid) -> String {
    format!("otp_attempts_{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_four_digits() {
        for _ in 0..1000 {
            let code = generate_code();
            assert_eq!(code.len(), 4);
            let n: u16 = code.parse().unwrap();
            assert!(CODE_RANGE.contains(&n));
        }
    }

    #[test]
    fn comparison_requires_exact_match() {
        assert!(codes_match("4821", "4821"));
        assert!(!codes_match("4821", "4822"));
        assert!(!codes_match("4821", "482"));
        assert!(!codes_match("4821", "48210"));
        assert!(!codes_match("4821", ""));
    }

    #[test]
    fn keys_are_scoped_by_user() {
        let id = Uuid::nil();
        assert_eq!(otp_key(id), "otp_00000000-0000-0000-0000-000000000000");
        assert_eq!(
            verified_key(id),
            "otp_verified_00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            attempts_key(id),
            "otp_attempts_00000000-0000-0000-0000-000000000000"
        );
    }
}
