//! # Permissions Module
//!
//! The role/permission table for Plaza POS.
//!
//! ## Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Effective Permission Set                            │
//! │                                                                         │
//! │   Role (SuperAdmin | ShopAdmin | Staff)                                │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   Role::permissions()  ── static, compile-time-checked table           │
//! │        │                                                                │
//! │        │        User.permission_overrides (additive grants)            │
//! │        │                 │                                              │
//! │        ▼                 ▼                                              │
//! │   effective = RolePermissions(role) ∪ overrides                        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   has_permission(effective, required) → allow / Forbidden              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Rules
//! - `Permission` is a CLOSED enum. No stringly-typed permission names can
//!   reach a check; unknown names fail at deserialization, not at runtime.
//! - Authorization always goes through the effective-set union. Comparing
//!   role names directly would silently ignore per-user overrides.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Permission
// =============================================================================

/// Every operation the system can gate, as a closed set.
///
/// Serialized as snake_case strings (e.g. `"delete_product"`) in user
/// override columns and API payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Create/suspend/reactivate shops and edit subscription expiry.
    /// Shop-lifecycle permission: SuperAdmin only, never grantable by role.
    ManageShops,
    /// Create, edit, deactivate users and edit their overrides.
    ManageUsers,
    ViewProducts,
    CreateProduct,
    EditProduct,
    DeleteProduct,
    ViewStock,
    /// Manual stock adjustments and purchase receipts.
    AdjustStock,
    CreateSale,
    ViewSales,
    CreateReturn,
    /// Complete or cancel returns (status transitions).
    ManageReturns,
    ViewReports,
    ManageSettings,
}

impl Permission {
    /// The snake_case wire name, matching the serde representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageShops => "manage_shops",
            Permission::ManageUsers => "manage_users",
            Permission::ViewProducts => "view_products",
            Permission::CreateProduct => "create_product",
            Permission::EditProduct => "edit_product",
            Permission::DeleteProduct => "delete_product",
            Permission::ViewStock => "view_stock",
            Permission::AdjustStock => "adjust_stock",
            Permission::CreateSale => "create_sale",
            Permission::ViewSales => "view_sales",
            Permission::CreateReturn => "create_return",
            Permission::ManageReturns => "manage_returns",
            Permission::ViewReports => "view_reports",
            Permission::ManageSettings => "manage_settings",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Role
// =============================================================================

/// User roles, from widest to narrowest authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System operator. Lives in the system namespace, has every permission
    /// including shop lifecycle management. No tenant affinity.
    SuperAdmin,
    /// Owner/manager of one shop. Everything tenant-scoped.
    ShopAdmin,
    /// Counter staff. Sell, return, look things up.
    Staff,
}

/// Permissions granted to every role (SuperAdmin).
const ALL_PERMISSIONS: &[Permission] = &[
    Permission::ManageShops,
    Permission::ManageUsers,
    Permission::ViewProducts,
    Permission::CreateProduct,
    Permission::EditProduct,
    Permission::DeleteProduct,
    Permission::ViewStock,
    Permission::AdjustStock,
    Permission::CreateSale,
    Permission::ViewSales,
    Permission::CreateReturn,
    Permission::ManageReturns,
    Permission::ViewReports,
    Permission::ManageSettings,
];

/// ShopAdmin: everything except shop lifecycle management.
const SHOP_ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ManageUsers,
    Permission::ViewProducts,
    Permission::CreateProduct,
    Permission::EditProduct,
    Permission::DeleteProduct,
    Permission::ViewStock,
    Permission::AdjustStock,
    Permission::CreateSale,
    Permission::ViewSales,
    Permission::CreateReturn,
    Permission::ManageReturns,
    Permission::ViewReports,
    Permission::ManageSettings,
];

/// Staff: the counter subset.
const STAFF_PERMISSIONS: &[Permission] = &[
    Permission::ViewProducts,
    Permission::ViewStock,
    Permission::CreateSale,
    Permission::ViewSales,
    Permission::CreateReturn,
];

impl Role {
    /// The static role → permission table.
    ///
    /// SuperAdmin's set is the union of all defined permissions plus the
    /// shop-lifecycle permissions unavailable to other roles.
    pub const fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::SuperAdmin => ALL_PERMISSIONS,
            Role::ShopAdmin => SHOP_ADMIN_PERMISSIONS,
            Role::Staff => STAFF_PERMISSIONS,
        }
    }

    /// The snake_case wire name, matching the serde representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::ShopAdmin => "shop_admin",
            Role::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Effective Set
// =============================================================================

/// Computes a user's effective permission set:
/// `RolePermissions(role) ∪ overrides`.
///
/// Overrides are ADDITIVE only; there is no per-user revocation. Revoking
/// access means changing the role or deactivating the user.
pub fn effective_permissions(role: Role, overrides: &[Permission]) -> HashSet<Permission> {
    let mut set: HashSet<Permission> = role.permissions().iter().copied().collect();
    set.extend(overrides.iter().copied());
    set
}

/// The authorization predicate.
///
/// Always computed over the effective-set union so overrides are honored.
/// Never short-circuit on the role name alone.
pub fn has_permission(role: Role, overrides: &[Permission], required: Permission) -> bool {
    role.permissions().contains(&required) || overrides.contains(&required)
}

// =============================================================================
// Unit Tests
// =============================================================================
