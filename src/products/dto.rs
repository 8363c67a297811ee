use serde::Deserialize;

use super::repo_types::{NewProduct, ProductPatch};
use crate::validation::Violations;

/// Maximum rows returned by a barcode search.
pub const SEARCH_LIMIT: i64 = 50;

fn check_barcode(v: &mut Violations, barcode: &str) {
    if barcode.trim().is_empty() {
        v.push("barcode", "is required");
    }
}

fn check_price(v: &mut Violations, price: f64) {
    if !price.is_finite() || price < 0.0 {
        v.push("price", "must be a non-negative number");
    }
}

fn check_stock(v: &mut Violations, stock: i64) {
    if stock < 0 {
        v.push("stock", "must not be negative");
    }
}

/// Body of create and full replace.
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub barcode: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i64,
}

impl ProductRequest {
    pub fn validate(&self) -> Result<(), Violations> {
        let mut v = Violations::new();
        check_barcode(&mut v, &self.barcode);
        v.check_length("name", &self.name, 2, 50);
        v.check_length("description", &self.description, 2, 100);
        check_price(&mut v, self.price);
        check_stock(&mut v, self.stock);
        v.into_result()
    }
}

impl From<ProductRequest> for NewProduct {
    fn from(r: ProductRequest) -> Self {
        Self {
            barcode: r.barcode.trim().to_string(),
            name: r.name,
            description: r.description,
            price: r.price,
            stock: r.stock,
        }
    }
}

/// Body of a partial update; only supplied fields are validated.
#[derive(Debug, Default, Deserialize)]
pub struct ProductPatchRequest {
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i64>,
}

impl ProductPatchRequest {
    pub fn validate(&self) -> Result<(), Violations> {
        let mut v = Violations::new();
        if let Some(barcode) = &self.barcode {
            check_barcode(&mut v, barcode);
        }
        if let Some(name) = &self.name {
            v.check_length("name", name, 2, 50);
        }
        if let Some(description) = &self.description {
            v.check_length("description", description, 2, 100);
        }
        if let Some(price) = self.price {
            check_price(&mut v, price);
        }
        if let Some(stock) = self.stock {
            check_stock(&mut v, stock);
        }
        v.into_result()
    }

    pub fn is_empty(&self) -> bool {
        self.barcode.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
    }
}

impl From<ProductPatchRequest> for ProductPatch {
    fn from(r: ProductPatchRequest) -> Self {
        Self {
            barcode: r.barcode.map(|b| b.trim().to_string()),
            name: r.name,
            description: r.description,
            price: r.price,
            stock: r.stock,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub barcode: String,
}
