//! Banks and user bank accounts (payout destinations).

use uuid::Uuid;

use super::RecordStatus;

/// A user's bank account joined with its bank.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BankAccountDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
    pub bank_code: String,
    pub bank_status: RecordStatus,
}

/// Mask an account number as first 3 digits + `****` + last 3 digits.
///
/// Numbers of six characters or fewer are returned unchanged.
pub fn mask_account_number(account_number: &str) -> String {
    let chars: Vec<char> = account_number.chars().collect();
    if chars.len() <= 6 {
        return account_number.to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{}****{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_numbers() {
        assert_eq!(mask_account_number("1234567890"), "123****890");
        assert_eq!(mask_account_number("1234567"), "123****567");
    }

    #[test]
    fn short_numbers_are_left_alone() {
        assert_eq!(mask_account_number("123456"), "123456");
        assert_eq!(mask_account_number(""), "");
    }
}
