//! # Permission Gates
//!
//! Declarative permission checks at operation entry points.
//!
//! ```rust,ignore
//! gate(Permission::CreateSale).check(&identity)?;
//! ```

use plaza_core::Permission;

use crate::authenticator::Identity;
use crate::error::{AuthError, AuthResult};

/// A required permission for one operation.
#[derive(Debug, Clone, Copy)]
pub struct Gate {
    permission: Permission,
}

/// Builds a gate for a permission.
pub fn gate(permission: Permission) -> Gate {
    Gate { permission }
}

impl Gate {
    /// Checks the identity against this gate.
    ///
    /// ## Errors
    /// `Forbidden`, naming both the missing permission and the caller's
    /// role so audit logs explain the denial.
    pub fn check(&self, identity: &Identity) -> AuthResult<()> {
        if identity.can(self.permission) {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                permission: self.permission,
                role: identity.role,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_core::{effective_permissions, Role};

    fn staff_identity(overrides: &[Permission]) -> Identity {
        Identity {
            user_id: "u1".to_string(),
            name: "Staff".to_string(),
            role: Role::Staff,
            tenant_id: Some("shop-1".to_string()),
            permissions: effective_permissions(Role::Staff, overrides),
        }
    }

    #[test]
    fn test_gate_allows_role_permission() {
        let identity = staff_identity(&[]);
        assert!(gate(Permission::CreateSale).check(&identity).is_ok());
    }

    #[test]
    fn test_gate_denies_with_context() {
        let identity = staff_identity(&[]);
        let err = gate(Permission::DeleteProduct).check(&identity).unwrap_err();
        assert!(matches!(
            err,
            AuthError::Forbidden {
                permission: Permission::DeleteProduct,
                role: Role::Staff,
            }
        ));
    }

    #[test]
    fn test_gate_honors_overrides() {
        let identity = staff_identity(&[Permission::DeleteProduct]);
        assert!(gate(Permission::DeleteProduct).check(&identity).is_ok());
    }
}
