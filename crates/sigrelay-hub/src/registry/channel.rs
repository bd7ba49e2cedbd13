//! Server-side channels and the channel registry.

use super::sets;

/// Named group with an ordered, duplicate-free member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    id: String,
    members: Vec<String>,
}

impl Channel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            members: Vec::new(),
        }
    }

    /// Channel pre-populated with `members` (duplicates dropped).
    pub fn from_members<I, S>(id: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<String> = members.into_iter().map(Into::into).collect();
        Self {
            id: id.into(),
            members: sets::unique_by(&list, |a, b| a == b),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn has_member(&self, user: &str) -> bool {
        self.members.iter().any(|m| m == user)
    }

    /// Returns false if `user` was already a member.
    pub fn add_member(&mut self, user: impl Into<String>) -> bool {
        let user = user.into();
        if self.has_member(&user) {
            return false;
        }
        self.members.push(user);
        true
    }

    /// Returns false if `user` was not a member.
    pub fn remove_member(&mut self, user: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != user);
        self.members.len() != before
    }

    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            members: self.members.clone(),
        }
    }

    pub fn with_members<I, S>(&self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_members(self.id.clone(), members)
    }

    pub fn unique_by(list: &[Channel], eq: impl Fn(&Channel, &Channel) -> bool) -> Vec<Channel> {
        sets::unique_by(list, eq)
    }

    /// Channels deduplicated by id.
    pub fn unique(list: &[Channel]) -> Vec<Channel> {
        Self::unique_by(list, same_id)
    }

    pub fn exclude_by(
        list: &[Channel],
        remove: &[Channel],
        eq: impl Fn(&Channel, &Channel) -> bool,
    ) -> Vec<Channel> {
        sets::exclude_by(list, remove, eq)
    }

    /// `list` minus every channel whose id appears in `remove`.
    pub fn exclude(list: &[Channel], remove: &[Channel]) -> Vec<Channel> {
        Self::exclude_by(list, remove, same_id)
    }
}

fn same_id(a: &Channel, b: &Channel) -> bool {
    a.id == b.id
}

impl From<&str> for Channel {
    fn from(id: &str) -> Self {
        Channel::new(id)
    }
}

impl From<String> for Channel {
    fn from(id: String) -> Self {
        Channel::new(id)
    }
}

/// Open channels, in opening order.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a channel with the same id is already open.
    pub fn open(&mut self, channel: impl Into<Channel>) -> bool {
        let channel = channel.into();
        if self.by_id(channel.id()).is_some() {
            return false;
        }
        self.channels.push(channel);
        true
    }

    /// Returns false if no such channel was open.
    pub fn close(&mut self, id: &str) -> bool {
        let before = self.channels.len();
        self.channels.retain(|c| c.id != id);
        self.channels.len() != before
    }

    pub fn by_id(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn by_id_mut(&mut self, id: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.id == id)
    }

    /// Channels `user` is a member of.
    pub fn by_member(&self, user: &str) -> Vec<&Channel> {
        self.channels.iter().filter(|c| c.has_member(user)).collect()
    }

    pub fn all(&self) -> &[Channel] {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_close_are_idempotent() {
        let mut reg = ChannelRegistry::new();
        assert!(reg.open("c1"));
        assert!(!reg.open(Channel::from_members("c1", ["x"])));
        assert_eq!(reg.all().len(), 1);
        assert!(reg.by_id("c1").map(|c| c.members().is_empty()).unwrap_or(false));

        assert!(reg.close("c1"));
        assert!(!reg.close("c1"));
        assert!(reg.by_id("c1").is_none());
    }

    #[test]
    fn add_member_once() {
        let mut c = Channel::new("c1");
        assert!(c.add_member("A"));
        assert!(!c.add_member("A"));
        assert_eq!(c.members().len(), 1);
        assert!(c.remove_member("A"));
        assert!(!c.remove_member("A"));
    }

    #[test]
    fn copies_leave_the_original_alone() {
        let c = Channel::from_members("c1", ["A", "B", "A"]);
        assert_eq!(c.members(), ["A", "B"]);

        let renamed = c.with_id("c2");
        let repopulated = c.with_members(["C"]);
        assert_eq!(renamed.members(), c.members());
        assert_eq!(repopulated.id(), "c1");
        assert_eq!(repopulated.members(), ["C"]);
        assert_eq!(c.id(), "c1");
    }

    #[test]
    fn by_member_and_list_helpers() {
        let mut reg = ChannelRegistry::new();
        reg.open(Channel::from_members("c1", ["A", "B"]));
        reg.open(Channel::from_members("c2", ["B"]));
        reg.open("c3");

        let ids: Vec<&str> = reg.by_member("B").into_iter().map(|c| c.id()).collect();
        assert_eq!(ids, ["c1", "c2"]);

        // id equality: member lists do not make channels distinct
        let list = vec![Channel::new("x"), Channel::new("y"), Channel::from_members("x", ["A"])];
        assert_eq!(Channel::unique(&list), vec![Channel::new("x"), Channel::new("y")]);
        assert_eq!(Channel::exclude(&list, &[Channel::from_members("x", ["B"])]), vec![Channel::new("y")]);

        let by_size = Channel::unique_by(&list, |a, b| a.members().len() == b.members().len());
        assert_eq!(by_size, vec![Channel::new("x"), Channel::from_members("x", ["A"])]);
        let kept = Channel::exclude_by(&list, &[Channel::new("z")], |a, b| a.members() == b.members());
        assert_eq!(kept, vec![Channel::from_members("x", ["A"])]);
    }
}
