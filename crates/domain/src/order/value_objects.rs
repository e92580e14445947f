//! Order record and the request shapes that produce it.

use common::OrderId;
use serde::{Deserialize, Serialize};

use super::OrderError;

/// A single order as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub item: String,
    pub amount: i64,
}

impl Order {
    /// Creates an order with the given fields.
    pub fn new(id: impl Into<OrderId>, item: impl Into<String>, amount: i64) -> Self {
        Self {
            id: id.into(),
            item: item.into(),
            amount,
        }
    }

    /// Returns a copy with `delta` added to the amount, clamped at zero.
    pub fn with_adjusted_amount(&self, delta: i64) -> Self {
        Self {
            id: self.id.clone(),
            item: self.item.clone(),
            amount: self.amount.saturating_add(delta).max(0),
        }
    }
}

/// Input for creating an order. A missing or blank `id` is generated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOrder {
    #[serde(default)]
    pub id: Option<OrderId>,
    pub item: String,
    pub amount: i64,
}

impl NewOrder {
    /// Creates input with a caller-supplied ID.
    pub fn with_id(id: impl Into<OrderId>, item: impl Into<String>, amount: i64) -> Self {
        Self {
            id: Some(id.into()),
            item: item.into(),
            amount,
        }
    }

    /// Creates input that lets the service generate the ID.
    pub fn generated(item: impl Into<String>, amount: i64) -> Self {
        Self {
            id: None,
            item: item.into(),
            amount,
        }
    }

    /// Validates the input and resolves the final order ID.
    pub fn into_order(self) -> Result<Order, OrderError> {
        validate_amount(self.amount)?;
        let id = match self.id {
            Some(id) if !id.is_blank() => id,
            _ => OrderId::generate(),
        };
        Ok(Order {
            id,
            item: self.item,
            amount: self.amount,
        })
    }
}

/// Input for replacing an existing order.
///
/// The target ID comes from the request path; an `id` in the body is
/// accepted only when it matches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderUpdate {
    #[serde(default)]
    pub id: Option<OrderId>,
    pub item: String,
    pub amount: i64,
}

impl OrderUpdate {
    pub fn new(item: impl Into<String>, amount: i64) -> Self {
        Self {
            id: None,
            item: item.into(),
            amount,
        }
    }

    /// Validates the input against the target ID.
    pub fn into_order(self, target: &OrderId) -> Result<Order, OrderError> {
        validate_amount(self.amount)?;
        if let Some(body_id) = &self.id
            && !body_id.is_blank()
            && body_id != target
        {
            return Err(OrderError::InvalidInput(format!(
                "body id {body_id} does not match path id {target}"
            )));
        }
        Ok(Order {
            id: target.clone(),
            item: self.item,
            amount: self.amount,
        })
    }
}

fn validate_amount(amount: i64) -> Result<(), OrderError> {
    if amount < 0 {
        return Err(OrderError::InvalidInput(format!(
            "amount must be non-negative, got {amount}"
        )));
    }
    Ok(())
}
