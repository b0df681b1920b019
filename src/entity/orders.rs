use sea_orm::entity::prelude::*;

/// One row per successful payment confirmation. EUR columns are display
/// bookkeeping carried from checkout metadata; PLN columns are the amounts
/// of record.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub user_id: Uuid,
    /// Payment-session id, unique: makes webhook redelivery idempotent.
    pub payment_session_id: String,
    pub total_pln: i64,
    pub total_eur: i64,
    pub shipping_cost_pln: i64,
    pub shipping_cost_eur: i64,
    pub discount_pln: i64,
    pub coupon_code: Option<String>,
    pub status: String,
    pub shipping_address: String,
    pub service_id: String,
    pub carrier_name: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
