// larder/src/model/shop.rs

use crate::model::Cents;
use crate::store::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
  pub id: String,
  pub name: String,
  pub price: Cents,
  #[serde(default)]
  pub description: Option<String>,
}

/// A seller. Read-only from this crate's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
  #[serde(default)]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub logo: Option<String>,
  #[serde(default)]
  pub menu: Vec<MenuItem>,
}

impl Shop {
  pub fn from_document(id: &str, data: &Document) -> Result<Self, serde_json::Error> {
    let mut shop: Shop = serde_json::from_value(Value::Object(data.clone()))?;
    shop.id = id.to_string();
    Ok(shop)
  }

  pub fn menu_item(&self, item_id: &str) -> Option<&MenuItem> {
    self.menu.iter().find(|item| item.id == item_id)
  }
}
