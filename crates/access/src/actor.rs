//! The acting user of a request.

use entities::{Role, User, UserId};

/// A registered user performing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn student(user_id: UserId) -> Self {
        Self::new(user_id, Role::Student)
    }

    pub fn professor(user_id: UserId) -> Self {
        Self::new(user_id, Role::Professor)
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.role)
    }
}
