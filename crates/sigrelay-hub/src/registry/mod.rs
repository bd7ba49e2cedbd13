//! Authoritative membership state.
//!
//! One `Registry` belongs to one `Hub`; there is no process-wide instance, so
//! several hubs in one process never share channels or users.

pub mod channel;
pub mod sets;
pub mod user;

pub use channel::{Channel, ChannelRegistry};
pub use user::{User, UserRegistry};

#[derive(Debug, Default)]
pub struct Registry {
    pub channels: ChannelRegistry,
    pub users: UserRegistry,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `user` to `channel`. False if the channel is missing or `user`
    /// already belongs to it.
    pub fn join(&mut self, user: &str, channel: &str) -> bool {
        self.channels
            .by_id_mut(channel)
            .map(|c| c.add_member(user))
            .unwrap_or(false)
    }

    /// Remove `user` from `channel`. False if nothing changed.
    pub fn leave(&mut self, user: &str, channel: &str) -> bool {
        self.channels
            .by_id_mut(channel)
            .map(|c| c.remove_member(user))
            .unwrap_or(false)
    }

    /// Ids of the channels `user` belongs to, once each.
    pub fn channels_of(&self, user: &str) -> Vec<String> {
        let joined: Vec<Channel> = self.channels.by_member(user).into_iter().cloned().collect();
        Channel::unique(&joined)
            .into_iter()
            .map(|c| c.id().to_string())
            .collect()
    }

    /// Authenticated members of `channel` not listed in `except`, in join
    /// order. Empty if the channel is not open.
    pub fn members_of(&self, channel: &str, except: &[User]) -> Vec<User> {
        match self.channels.by_id(channel) {
            Some(c) => User::exclude(&self.users_in(c), except),
            None => Vec::new(),
        }
    }

    /// Authenticated users sharing at least one channel with `user`, once
    /// each, without `user` itself.
    pub fn peers_of(&self, user: &str) -> Vec<User> {
        let everyone: Vec<User> = self
            .channels
            .by_member(user)
            .into_iter()
            .flat_map(|c| self.users_in(c))
            .collect();
        let me: Vec<User> = self.users.by_id(user).cloned().into_iter().collect();
        User::exclude(&User::unique(&everyone), &me)
    }

    fn users_in(&self, channel: &Channel) -> Vec<User> {
        channel
            .members()
            .iter()
            .filter_map(|id| self.users.by_id(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::ConnectionId;

    fn ids(users: Vec<User>) -> Vec<String> {
        users.into_iter().map(|u| u.id).collect()
    }

    #[test]
    fn membership_is_derived_from_channels() {
        let mut reg = Registry::new();
        reg.channels.open("c1");
        reg.channels.open("c2");

        assert!(reg.join("A", "c1"));
        assert!(!reg.join("A", "c1"));
        assert!(reg.join("A", "c2"));
        assert!(!reg.join("A", "missing"));
        assert_eq!(reg.channels_of("A"), ["c1", "c2"]);

        assert!(reg.leave("A", "c1"));
        assert!(!reg.leave("A", "c1"));
        assert_eq!(reg.channels_of("A"), ["c2"]);
    }

    #[test]
    fn members_and_peers_skip_unauthenticated_and_excluded() {
        let mut reg = Registry::new();
        for (i, id) in ["A", "B", "C"].iter().enumerate() {
            reg.users.authenticate(User::new(*id, ConnectionId::from_raw(i as u64 + 1)));
        }
        reg.channels.open(Channel::from_members("c1", ["A", "B", "ghost"]));
        reg.channels.open(Channel::from_members("c2", ["A", "B", "C"]));

        assert_eq!(ids(reg.members_of("c1", &[])), ["A", "B"]);
        let a = reg.users.by_id("A").cloned().into_iter().collect::<Vec<_>>();
        assert_eq!(ids(reg.members_of("c2", &a)), ["B", "C"]);
        assert!(reg.members_of("missing", &[]).is_empty());

        assert_eq!(ids(reg.peers_of("A")), ["B", "C"]);
        assert_eq!(ids(reg.peers_of("C")), ["A", "B"]);
        assert!(reg.peers_of("nobody").is_empty());
    }
}
