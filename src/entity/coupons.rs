use sea_orm::entity::prelude::*;

/// Coupon row. `code` is unique case-insensitively (enforced by a unique
/// index on `lower(code)`); `redemptions_count` is only ever incremented,
/// atomically, by the redemption query.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub code: String,
    pub percent_off: Option<i32>,
    pub amount_off_pln: Option<i64>,
    pub valid_from: Option<DateTimeWithTimeZone>,
    pub valid_to: Option<DateTimeWithTimeZone>,
    pub max_redemptions: Option<i32>,
    pub redemptions_count: i32,
    pub active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
