//! Payment settings singleton and payout destination routing.
//!
//! When a withdrawal reaches the configured threshold and its owner is not
//! on the wishlist, the payout goes to the configured alternate bank account
//! instead of the user's own. The account-holder name always stays the
//! user's. The same routing is applied to admin listings and to the payout
//! actually submitted to the gateway.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bank::BankAccountDetails;
use crate::error::AppError;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentSettings {
    pub id: i32,
    pub bank_name: String,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    #[serde(rename = "withdraw_threshold", with = "crate::money::amount")]
    pub withdraw_threshold_cents: i64,
    pub wishlist_user_ids: Vec<Uuid>,
}

impl PaymentSettings {
    pub fn is_user_in_wishlist(&self, user_id: Uuid) -> bool {
        self.wishlist_user_ids.contains(&user_id)
    }
}

/// Body of `PUT /admin/payment-settings`.
///
/// # JSON Example
///
/// ```json
/// {
///   "bank_name": "Bank Negara Indonesia",
///   "bank_code": "BNI",
///   "account_number": "9990001112",
///   "account_name": "Operations",
///   "withdraw_threshold": 500000,
///   "wishlist_user_ids": ["550e8400-e29b-41d4-a716-446655440000"]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct UpdatePaymentSettingsRequest {
    pub bank_name: String,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    #[serde(rename = "withdraw_threshold", with = "crate::money::amount")]
    pub withdraw_threshold_cents: i64,
    #[serde(default)]
    pub wishlist_user_ids: Vec<Uuid>,
}

impl UpdatePaymentSettingsRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("bank_name", &self.bank_name),
            ("bank_code", &self.bank_code),
            ("account_number", &self.account_number),
            ("account_name", &self.account_name),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{} is required", field)));
            }
        }
        if self.withdraw_threshold_cents <= 0 {
            return Err(AppError::Validation(
                "withdraw_threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where a payout is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutDestination {
    pub bank_name: String,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

/// Resolve the payout destination for a withdrawal.
///
/// Without a settings row every payout goes to the user's own account.
pub fn route_payout(
    settings: Option<&PaymentSettings>,
    user_id: Uuid,
    amount_cents: i64,
    account: &BankAccountDetails,
) -> PayoutDestination {
    match settings {
        Some(ps)
            if !ps.is_user_in_wishlist(user_id) && amount_cents >= ps.withdraw_threshold_cents =>
        {
            PayoutDestination {
                bank_name: ps.bank_name.clone(),
                bank_code: ps.bank_code.clone(),
                account_number: ps.account_number.clone(),
                account_name: account.account_name.clone(),
            }
        }
        _ => PayoutDestination {
            bank_name: account.bank_name.clone(),
            bank_code: account.bank_code.clone(),
            account_number: account.account_number.clone(),
            account_name: account.account_name.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordStatus;

    fn account(user_id: Uuid) -> BankAccountDetails {
        BankAccountDetails {
            id: Uuid::new_v4(),
            user_id,
            account_name: "Siti Rahma".to_string(),
            account_number: "1234567890".to_string(),
            bank_name: "Bank Central Asia".to_string(),
            bank_code: "BCA".to_string(),
            bank_status: RecordStatus::Active,
        }
    }

    fn settings(wishlist: Vec<Uuid>) -> PaymentSettings {
        PaymentSettings {
            id: 1,
            bank_name: "Bank Negara Indonesia".to_string(),
            bank_code: "BNI".to_string(),
            account_number: "9990001112".to_string(),
            account_name: "Operations".to_string(),
            withdraw_threshold_cents: 10_000_000,
            wishlist_user_ids: wishlist,
        }
    }

    #[test]
    fn substitutes_destination_above_threshold() {
        let user = Uuid::new_v4();
        let dest = route_payout(Some(&settings(vec![])), user, 10_000_000, &account(user));

        assert_eq!(dest.bank_code, "BNI");
        assert_eq!(dest.account_number, "9990001112");
        // Holder name stays the user's own
        assert_eq!(dest.account_name, "Siti Rahma");
    }

    #[test]
    fn keeps_real_destination_below_threshold() {
        let user = Uuid::new_v4();
        let dest = route_payout(Some(&settings(vec![])), user, 9_999_999, &account(user));
        assert_eq!(dest.bank_code, "BCA");
        assert_eq!(dest.account_number, "1234567890");
    }

    #[test]
    fn wishlisted_users_keep_real_destination() {
        let user = Uuid::new_v4();
        let dest = route_payout(
            Some(&settings(vec![user])),
            user,
            50_000_000,
            &account(user),
        );
        assert_eq!(dest.bank_code, "BCA");
    }

    #[test]
    fn no_settings_means_real_destination() {
        let user = Uuid::new_v4();
        let dest = route_payout(None, user, 50_000_000, &account(user));
        assert_eq!(dest.bank_name, "Bank Central Asia");
    }

    fn update(threshold: i64) -> UpdatePaymentSettingsRequest {
        UpdatePaymentSettingsRequest {
            bank_name: "Bank Negara Indonesia".to_string(),
            bank_code: "BNI".to_string(),
            account_number: "9990001112".to_string(),
            account_name: "Operations".to_string(),
            withdraw_threshold_cents: threshold,
            wishlist_user_ids: vec![],
        }
    }

    #[test]
    fn settings_update_requires_every_field() {
        assert!(update(50_000_000).validate().is_ok());
        assert!(matches!(update(0).validate(), Err(AppError::Validation(_))));

        let mut blank = update(50_000_000);
        blank.bank_code = "  ".to_string();
        assert!(matches!(blank.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn settings_update_body_takes_decimal_threshold() {
        let req: UpdatePaymentSettingsRequest = serde_json::from_str(
            r#"{
                "bank_name": "Bank Negara Indonesia",
                "bank_code": "BNI",
                "account_number": "9990001112",
                "account_name": "Operations",
                "withdraw_threshold": 500000
            }"#,
        )
        .unwrap();
        assert_eq!(req.withdraw_threshold_cents, 50_000_000);
        assert!(req.wishlist_user_ids.is_empty());
    }
}
