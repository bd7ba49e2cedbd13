//! Authenticated users and the user registry.

use crate::hub::ConnectionId;

use super::sets;

/// Authenticated user bound to exactly one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub connection: ConnectionId,
}

impl User {
    pub fn new(id: impl Into<String>, connection: ConnectionId) -> Self {
        Self {
            id: id.into(),
            connection,
        }
    }

    pub fn unique_by(list: &[User], eq: impl Fn(&User, &User) -> bool) -> Vec<User> {
        sets::unique_by(list, eq)
    }

    /// Users deduplicated by id.
    pub fn unique(list: &[User]) -> Vec<User> {
        Self::unique_by(list, same_id)
    }

    pub fn exclude_by(list: &[User], remove: &[User], eq: impl Fn(&User, &User) -> bool) -> Vec<User> {
        sets::exclude_by(list, remove, eq)
    }

    /// `list` minus every user whose id appears in `remove`.
    pub fn exclude(list: &[User], remove: &[User]) -> Vec<User> {
        Self::exclude_by(list, remove, same_id)
    }
}

fn same_id(a: &User, b: &User) -> bool {
    a.id == b.id
}

#[derive(Debug, Default)]
pub struct UserRegistry {
    users: Vec<User>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the id or the connection is already bound.
    pub fn authenticate(&mut self, user: User) -> bool {
        if self.by_id(&user.id).is_some() || self.by_connection(user.connection).is_some() {
            return false;
        }
        self.users.push(user);
        true
    }

    pub fn unauthenticate(&mut self, id: &str) -> Option<User> {
        let pos = self.users.iter().position(|u| u.id == id)?;
        Some(self.users.remove(pos))
    }

    pub fn by_id(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn by_connection(&self, conn: ConnectionId) -> Option<&User> {
        self.users.iter().find(|u| u.connection == conn)
    }

    pub fn all(&self) -> &[User] {
        &self.users
    }
}
