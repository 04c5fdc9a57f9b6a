/*!
 * # Role-Based Access Control
 *
 * Each route declares the [`Permission`] it needs; each [`Role`] maps to a
 * fixed permission set. The admin set is a superset of the user set.
 */

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::entities::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    /// Own profile, password and photo.
    ProfileManage,
    CartManage,
    WishlistManage,
    AddressManage,
    /// Place, list, view, pay and delete one's own orders.
    OrdersPlace,
    ReviewsWrite,

    UsersManage,
    CatalogWrite,
    /// All-orders listing and delivery.
    OrdersManage,
    /// Edit or delete any review.
    ReviewsModerate,
}

lazy_static! {
    static ref USER_PERMISSIONS: HashSet<Permission> = [
        Permission::ProfileManage,
        Permission::CartManage,
        Permission::WishlistManage,
        Permission::AddressManage,
        Permission::OrdersPlace,
        Permission::ReviewsWrite,
    ]
    .into_iter()
    .collect();

    pub static ref ROLE_PERMISSIONS: HashMap<Role, HashSet<Permission>> = {
        let mut roles = HashMap::new();
        roles.insert(Role::User, USER_PERMISSIONS.clone());
        roles.insert(Role::Admin, Permission::iter().collect());
        roles
    };
}

pub fn role_permissions(role: Role) -> Option<&'static HashSet<Permission>> {
    ROLE_PERMISSIONS.get(&role)
}

pub fn role_has_permission(role: Role, permission: Permission) -> bool {
    role_permissions(role)
        .map(|set| set.contains(&permission))
        .unwrap_or(false)
}
