use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::coupons::{CouponList, CreateCouponRequest},
    entity::coupons::{
        ActiveModel as CouponActive, Column as CouponCol, Entity as Coupons, Model as CouponModel,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Coupon,
    pricing::Discount,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Map a coupon row to the discount it grants. At most one of the two
/// fields is set; a coupon with neither grants nothing.
pub fn discount_of(coupon: &Coupon) -> Discount {
    if let Some(percent) = coupon.percent_off {
        Discount::Percent(percent as i64)
    } else if let Some(amount) = coupon.amount_off_pln {
        Discount::Amount(amount)
    } else {
        Discount::None
    }
}

/// Resolve a submitted code and record the redemption. Any way the coupon
/// can be unusable (unknown, inactive, outside its window, exhausted) is a
/// soft miss: checkout proceeds without a discount and no error is raised.
///
/// Returns the canonical code and discount when the coupon was redeemed.
pub async fn resolve_and_redeem(
    state: &AppState,
    code: &str,
) -> AppResult<Option<(String, Discount)>> {
    let code = code.trim();
    if code.is_empty() {
        return Ok(None);
    }

    let coupon: Option<Coupon> =
        sqlx::query_as("SELECT * FROM coupons WHERE lower(code) = lower($1)")
            .bind(code)
            .fetch_optional(&state.pool)
            .await?;
    let Some(coupon) = coupon else {
        tracing::debug!(code, "coupon not found, proceeding without discount");
        return Ok(None);
    };

    if !redeem(&state.pool, coupon.id).await? {
        tracing::debug!(code = %coupon.code, "coupon not usable, proceeding without discount");
        return Ok(None);
    }

    Ok(Some((coupon.code.clone(), discount_of(&coupon))))
}

/// Atomic increment-with-check. All usability conditions live in the WHERE
/// clause, so two concurrent checkouts cannot both take the last redemption
/// of a capped coupon.
pub async fn redeem(pool: &DbPool, coupon_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE coupons
        SET redemptions_count = redemptions_count + 1
        WHERE id = $1
          AND active
          AND (valid_from IS NULL OR valid_from <= now())
          AND (valid_to IS NULL OR valid_to >= now())
          AND (max_redemptions IS NULL OR redemptions_count < max_redemptions)
        "#,
    )
    .bind(coupon_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn create_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;

    if payload.percent_off.is_some() && payload.amount_off_pln.is_some() {
        return Err(AppError::BadRequest(
            "coupon cannot carry both percent_off and amount_off_pln".into(),
        ));
    }
    if let Some(percent) = payload.percent_off {
        if !(0..=100).contains(&percent) {
            return Err(AppError::BadRequest(
                "percent_off must be between 0 and 100".into(),
            ));
        }
    }
    if payload.amount_off_pln.is_some_and(|a| a <= 0) {
        return Err(AppError::BadRequest(
            "amount_off_pln must be greater than 0".into(),
        ));
    }
    let code = payload.code.trim().to_string();
    if code.is_empty() {
        return Err(AppError::BadRequest("coupon code must not be empty".into()));
    }

    let coupon = CouponActive {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        percent_off: Set(payload.percent_off),
        amount_off_pln: Set(payload.amount_off_pln),
        valid_from: Set(payload.valid_from.map(Into::into)),
        valid_to: Set(payload.valid_to.map(Into::into)),
        max_redemptions: Set(payload.max_redemptions),
        redemptions_count: Set(0),
        active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "coupon_create",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": coupon.id, "code": coupon.code })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Coupon created",
        coupon_from_entity(coupon),
        Some(Meta::empty()),
    ))
}

pub async fn list_coupons(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;
    let items = Coupons::find()
        .order_by_desc(CouponCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(coupon_from_entity)
        .collect();
    Ok(ApiResponse::success(
        "Coupons",
        CouponList { items },
        Some(Meta::empty()),
    ))
}

pub async fn deactivate_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let existing = Coupons::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let mut active: CouponActive = existing.into();
    active.active = Set(false);
    let coupon = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "coupon_deactivate",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": coupon.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Coupon deactivated",
        coupon_from_entity(coupon),
        Some(Meta::empty()),
    ))
}

pub fn coupon_from_entity(model: CouponModel) -> Coupon {
    Coupon {
        id: model.id,
        code: model.code,
        percent_off: model.percent_off,
        amount_off_pln: model.amount_off_pln,
        valid_from: model.valid_from.map(|dt| dt.with_timezone(&Utc)),
        valid_to: model.valid_to.map(|dt| dt.with_timezone(&Utc)),
        max_redemptions: model.max_redemptions,
        redemptions_count: model.redemptions_count,
        active: model.active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
