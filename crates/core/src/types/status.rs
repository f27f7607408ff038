//! Status and role enums.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// ```text
/// created ──verify, stock available──▶ captured
///    └─────verify, stock short────────▶ failed_out_of_stock
/// ```
///
/// Both outcomes are terminal. Nothing moves an order backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Registered with the gateway, awaiting payment verification.
    #[default]
    Created,
    /// Payment verified and stock committed.
    Captured,
    /// Payment verified but stock could not cover the order.
    FailedOutOfStock,
}

impl OrderStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Captured | Self::FailedOutOfStock)
    }

    /// Whether `self -> next` is a legal forward transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Captured | Self::FailedOutOfStock)
        )
    }

    /// Wire/database spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Captured => "captured",
            Self::FailedOutOfStock => "failed_out_of_stock",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "captured" => Ok(Self::Captured),
            "failed_out_of_stock" => Ok(Self::FailedOutOfStock),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Role stored on the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular shopper: sees and pays for their own orders.
    #[default]
    Customer,
    /// Store operator: sees every order and may adjust stock.
    Admin,
}

impl UserRole {
    /// Whether this role may perform store-management actions.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 3] = [
        OrderStatus::Created,
        OrderStatus::Captured,
        OrderStatus::FailedOutOfStock,
    ];

    #[test]
    fn test_only_created_moves_forward() {
        for from in ALL {
            for to in ALL {
                let expected = from == OrderStatus::Created && to != OrderStatus::Created;
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Created.is_terminal());
        assert!(OrderStatus::Captured.is_terminal());
        assert!(OrderStatus::FailedOutOfStock.is_terminal());
    }

    #[test]
    fn test_status_string_forms_agree() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("customer".parse::<UserRole>().unwrap(), UserRole::Customer);
        assert!("root".parse::<UserRole>().is_err());
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::default().is_admin());
    }
}
