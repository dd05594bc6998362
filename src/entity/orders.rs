use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub farm_id: Uuid,
    /// Farm owner at checkout time.
    pub farmer_id: Option<Uuid>,
    pub total_amount: i64,
    pub discount: i64,
    pub discount_code: Option<String>,
    pub delivery_type: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub delivery_address: Option<Json>,
    #[sea_orm(column_type = "JsonBinary")]
    pub delivery_slot: Json,
    pub payment_method: String,
    pub payment_status: String,
    pub order_status: String,
    pub verification_code: Option<String>,
    pub code_generated_at: Option<DateTimeWithTimeZone>,
    pub code_verified: bool,
    pub code_verified_at: Option<DateTimeWithTimeZone>,
    pub verification_required: bool,
    pub delivery_verified: bool,
    pub delivery_verified_by: Option<String>,
    pub delivery_verified_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::farms::Entity",
        from = "Column::FarmId",
        to = "super::farms::Column::Id"
    )]
    Farms,
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::order_status_history::Entity")]
    StatusHistory,
}

impl Related<super::farms::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Farms.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
