//! Payment settings - the singleton row that drives payout routing.

use crate::{
    db::DbPool,
    error::AppError,
    models::settings::{PaymentSettings, UpdatePaymentSettingsRequest},
};

/// The settings row, if one has been saved.
pub async fn load(pool: &DbPool) -> Result<Option<PaymentSettings>, AppError> {
    let settings =
        sqlx::query_as::<_, PaymentSettings>("SELECT * FROM payment_settings WHERE id = 1")
            .fetch_optional(pool)
            .await?;
    Ok(settings)
}

/// # Errors
///
/// - `NotFound`: settings were never saved, so no payout is rerouted
pub async fn get(pool: &DbPool) -> Result<PaymentSettings, AppError> {
    load(pool).await?.ok_or(AppError::NotFound("Payment settings"))
}

/// Create or replace the settings row.
pub async fn update(
    pool: &DbPool,
    req: UpdatePaymentSettingsRequest,
) -> Result<PaymentSettings, AppError> {
    req.validate()?;

    let settings = sqlx::query_as::<_, PaymentSettings>(
        r#"
        INSERT INTO payment_settings (
            id, bank_name, bank_code, account_number, account_name,
            withdraw_threshold_cents, wishlist_user_ids
        )
        VALUES (1, $1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE
        SET bank_name = EXCLUDED.bank_name,
            bank_code = EXCLUDED.bank_code,
            account_number = EXCLUDED.account_number,
            account_name = EXCLUDED.account_name,
            withdraw_threshold_cents = EXCLUDED.withdraw_threshold_cents,
            wishlist_user_ids = EXCLUDED.wishlist_user_ids
        RETURNING *
        "#,
    )
    .bind(req.bank_name.trim())
    .bind(req.bank_code.trim())
    .bind(req.account_number.trim())
    .bind(req.account_name.trim())
    .bind(req.withdraw_threshold_cents)
    .bind(&req.wishlist_user_ids)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        bank_code = %settings.bank_code,
        withdraw_threshold_cents = settings.withdraw_threshold_cents,
        wishlist = settings.wishlist_user_ids.len(),
        "payment settings updated"
    );

    Ok(settings)
}
