//! Validation and recipient resolution over a registry snapshot.

use sigrelay_core::protocol::{Address, Envelope, MessageType};
use sigrelay_core::{RelayError, Result};

use crate::registry::{Registry, User};

/// Check an inbound envelope from a connection bound to `user`.
///
/// Checks run in a fixed order and the first failure wins. Control types stop
/// after the sender check; their own preconditions are checked when the
/// command is performed.
pub fn validate(reg: &Registry, env: &Envelope, user: Option<&str>) -> Result<()> {
    if env.msg_type().is_empty() {
        return Err(RelayError::NoType);
    }
    if *env.msg_type() == MessageType::Auth {
        return Ok(());
    }
    let Some(user) = user else {
        return Err(RelayError::NotAuthenticated);
    };
    if env.sender_id() != Some(user) {
        return Err(RelayError::InvalidSender);
    }
    if env.msg_type().is_control() || env.is_server_bound() {
        return Ok(());
    }

    let channel = env.channel().unwrap_or(&Address::All);
    let receiver = env.receiver().unwrap_or(&Address::All);

    let members = match channel {
        Address::Server => {
            return Err(RelayError::Invalid("channel cannot be the server".into()));
        }
        Address::All => None,
        Address::Id(c) => {
            let ch = reg
                .channels
                .by_id(c)
                .ok_or_else(|| RelayError::NonExistentChannel(c.clone()))?;
            if !ch.has_member(user) {
                return Err(RelayError::SenderNotInChannel(c.clone()));
            }
            Some(ch)
        }
    };

    if let Address::Id(r) = receiver {
        if reg.users.by_id(r).is_none() {
            return Err(RelayError::NonExistentReceiver(r.clone()));
        }
        if let Some(ch) = members {
            if !ch.has_member(r) {
                return Err(RelayError::ReceiverNotInChannel(ch.id().to_string()));
            }
        }
    }
    Ok(())
}

/// User ids an envelope is delivered to. Channel fan-out only reaches
/// authenticated members.
///
/// | channel | receiver | recipients                                        |
/// |---------|----------|---------------------------------------------------|
/// | ALL     | ALL      | members of all of the sender's channels, once each, minus the sender |
/// | ALL     | id       | `id`                                              |
/// | id      | ALL      | members of channel `id` minus the sender          |
/// | id      | id       | `id`                                              |
///
/// Unset `channel`/`receiver` count as ALL. Anything addressed to SERVER
/// resolves to nobody.
pub fn resolve_recipients(reg: &Registry, env: &Envelope) -> Vec<String> {
    let sender = env.sender_id();
    let channel = env.channel().unwrap_or(&Address::All);
    let receiver = env.receiver().unwrap_or(&Address::All);

    match (channel, receiver) {
        (Address::Server, _) | (_, Address::Server) => Vec::new(),
        (Address::All, Address::All) => match sender {
            Some(s) => user_ids(reg.peers_of(s)),
            None => Vec::new(),
        },
        (Address::Id(c), Address::All) => {
            let me: Vec<User> = sender
                .and_then(|s| reg.users.by_id(s))
                .cloned()
                .into_iter()
                .collect();
            user_ids(reg.members_of(c, &me))
        }
        (_, Address::Id(r)) => vec![r.clone()],
    }
}

fn user_ids(users: Vec<User>) -> Vec<String> {
    users.into_iter().map(|u| u.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::ConnectionId;
    use crate::registry::{Channel, User};
    use sigrelay_core::ErrorKind;

    fn registry() -> Registry {
        let mut reg = Registry::new();
        for (i, id) in ["A", "B", "C", "D"].iter().enumerate() {
            reg.users.authenticate(User::new(*id, ConnectionId::from_raw(i as u64 + 1)));
        }
        reg.channels.open(Channel::from_members("c1", ["A", "B", "C"]));
        reg.channels.open(Channel::from_members("c2", ["A", "C", "D"]));
        reg
    }

    fn kind(r: Result<()>) -> Option<ErrorKind> {
        r.err().map(|e| e.kind())
    }

    #[test]
    fn all_all_is_deduplicated_and_skips_sender() {
        let reg = registry();
        let env = Envelope::new("ping").with_sender("A");
        assert_eq!(resolve_recipients(&reg, &env), ["B", "C", "D"]);
    }

    #[test]
    fn specific_combinations() {
        let reg = registry();
        let base = Envelope::new("ping").with_sender("A");

        let to_channel = base.with_channel("c1").with_receiver(Address::All);
        assert_eq!(resolve_recipients(&reg, &to_channel), ["B", "C"]);

        let direct = base.with_channel("c1").with_receiver("C");
        assert_eq!(resolve_recipients(&reg, &direct), ["C"]);

        let direct_any = base.with_channel(Address::All).with_receiver("D");
        assert_eq!(resolve_recipients(&reg, &direct_any), ["D"]);

        let server = base.with_receiver(Address::Server);
        assert!(resolve_recipients(&reg, &server).is_empty());
    }

    #[test]
    fn validation_order() {
        let reg = registry();
        let ok = Envelope::new("ping").with_sender("A").with_channel("c1").with_receiver("B");
        assert_eq!(validate(&reg, &ok, Some("A")), Ok(()));

        assert_eq!(kind(validate(&reg, &Envelope::new(""), None)), Some(ErrorKind::NoType));
        assert_eq!(validate(&reg, &Envelope::new(MessageType::Auth), None), Ok(()));
        assert_eq!(kind(validate(&reg, &ok, None)), Some(ErrorKind::NotAuthenticated));
        assert_eq!(kind(validate(&reg, &ok, Some("B"))), Some(ErrorKind::InvalidSender));

        let join = Envelope::new(MessageType::Join).with_sender("A").with_channel("nope");
        assert_eq!(validate(&reg, &join, Some("A")), Ok(()));

        let missing = ok.with_channel("nope");
        assert_eq!(kind(validate(&reg, &missing, Some("A"))), Some(ErrorKind::NonExistentChannel));

        let outsider = ok.with_sender("D").with_channel("c1");
        assert_eq!(kind(validate(&reg, &outsider, Some("D"))), Some(ErrorKind::SenderNotInChannel));

        let ghost = ok.with_receiver("Z");
        assert_eq!(kind(validate(&reg, &ghost, Some("A"))), Some(ErrorKind::NonExistentReceiver));

        let not_member = ok.with_receiver("D");
        assert_eq!(kind(validate(&reg, &not_member, Some("A"))), Some(ErrorKind::ReceiverNotInChannel));

        let server_channel = ok.with_channel(Address::Server);
        assert_eq!(kind(validate(&reg, &server_channel, Some("A"))), Some(ErrorKind::Invalid));

        let server_bound = ok.with_channel("nope").with_receiver(Address::Server);
        assert_eq!(validate(&reg, &server_bound, Some("A")), Ok(()));
    }
}
