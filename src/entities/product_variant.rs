use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// One size/colour combination of a product with its own stock and price.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    /// Preserves the order the variants were submitted in.
    pub position: i32,
    pub size: VariantSize,
    /// JSON array of colour names; the first entry is the one carts match on.
    #[sea_orm(column_type = "Json")]
    pub colors: Json,
    pub count_in_stock: i32,
    pub price: Decimal,
}

impl Model {
    pub fn color_list(&self) -> Vec<String> {
        serde_json::from_value(self.colors.clone()).unwrap_or_default()
    }

    pub fn primary_color(&self) -> Option<String> {
        self.color_list().into_iter().next()
    }

    /// Exact, case-sensitive match on size and first colour.
    pub fn matches(&self, size: VariantSize, color: &str) -> bool {
        self.size == size && self.primary_color().as_deref() == Some(color)
    }
}

/// First variant, in position order, matching `size` and `color`.
pub fn find_matching(variants: &[Model], size: VariantSize, color: &str) -> Option<Model> {
    let mut ordered: Vec<&Model> = variants.iter().collect();
    ordered.sort_by_key(|v| v.position);
    ordered
        .into_iter()
        .find(|v| v.matches(size, color))
        .cloned()
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(4))")]
pub enum VariantSize {
    #[sea_orm(string_value = "L")]
    L,
    #[sea_orm(string_value = "M")]
    M,
    #[sea_orm(string_value = "S")]
    S,
}
