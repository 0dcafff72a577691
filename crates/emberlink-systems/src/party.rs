//! Group membership, invites and leadership.
//!
//! The server's group list names every member except the local player, so
//! a leader change to a name missing from the list means the local player
//! was promoted.

use emberlink_protocol::messages::party::{
    AcceptInvite, DeclineInvite, DisbandGroup, GroupInvite, GroupList, GroupMember, InvitePlayer,
    LootMethod, LootRules, PartyCommandResult, PartyMessage, SetGroupLeader, SetLootMethod,
    UninviteMember,
};
use emberlink_protocol::{Guid, ServerMessage};
use emberlink_session::{compose, SessionError};
use emberlink_transport::Transport;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::base::SystemCore;
use crate::SystemContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyEvent {
    Invited(GroupInvite),
    Updated { members: usize, leader: Guid },
    Declined(String),
    /// The local player left or was removed.
    Left,
    Disbanded,
    LeaderChanged { name: String, leader: Guid },
    CommandResult(PartyCommandResult),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct PartyState {
    player: Guid,
    pending_invite: Option<GroupInvite>,
    group: Option<GroupList>,
}

impl PartyState {
    fn new(player: Guid) -> Self {
        Self {
            player,
            pending_invite: None,
            group: None,
        }
    }

    fn is_leader(&self) -> bool {
        self.group
            .as_ref()
            .is_some_and(|group| group.leader == self.player)
    }

    fn require_leader(&self) -> Result<&GroupList, SessionError> {
        let group = self
            .group
            .as_ref()
            .ok_or_else(|| SessionError::not_open("group"))?;
        if group.leader != self.player {
            return Err(SessionError::not_allowed("only the group leader can do that"));
        }
        Ok(group)
    }

    fn require_led_member(&self, guid: Guid) -> Result<(), SessionError> {
        let group = self.require_leader()?;
        if !group.members.iter().any(|member| member.guid == guid) {
            return Err(SessionError::not_found("group member", guid.0));
        }
        Ok(())
    }

    fn apply(&mut self, message: ServerMessage, events: &mut Vec<PartyEvent>) {
        let ServerMessage::Party(message) = message else {
            return;
        };
        match message {
            PartyMessage::Invite(invite) => {
                info!(inviter = %invite.inviter, can_accept = invite.can_accept, "group invite");
                self.pending_invite = Some(invite.clone());
                events.push(PartyEvent::Invited(invite));
            }
            PartyMessage::List(list) if list.members.is_empty() => {
                if self.group.take().is_some() {
                    info!("left group");
                    events.push(PartyEvent::Left);
                }
            }
            PartyMessage::List(list) => {
                self.pending_invite = None;
                events.push(PartyEvent::Updated {
                    members: list.members.len(),
                    leader: list.leader,
                });
                self.group = Some(list);
            }
            PartyMessage::Decline(decline) => events.push(PartyEvent::Declined(decline.name)),
            PartyMessage::Uninvite => {
                self.group = None;
                info!("removed from group");
                events.push(PartyEvent::Left);
            }
            PartyMessage::Destroyed => {
                self.group = None;
                info!("group disbanded");
                events.push(PartyEvent::Disbanded);
            }
            PartyMessage::SetLeader(set) => {
                let player = self.player;
                let Some(group) = self.group.as_mut() else {
                    debug!(name = %set.name, "leader change with no group, ignoring");
                    return;
                };
                group.leader = group
                    .members
                    .iter()
                    .find(|member| member.name.eq_ignore_ascii_case(&set.name))
                    .map_or(player, |member| member.guid);
                events.push(PartyEvent::LeaderChanged {
                    name: set.name,
                    leader: group.leader,
                });
            }
            PartyMessage::CommandResult(result) => {
                if !result.is_ok() {
                    debug!(operation = ?result.operation, member = %result.member, result = ?result.result, "party command refused");
                }
                events.push(PartyEvent::CommandResult(result));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

pub struct PartySystem<T> {
    core: SystemCore<T, PartyState, PartyEvent>,
}

impl<T: Transport> PartySystem<T> {
    pub fn new(ctx: &SystemContext<T>) -> Self {
        Self {
            core: SystemCore::start(
                ctx,
                "party",
                PartyState::new(ctx.player),
                PartyMessage::OPCODES,
                PartyState::apply,
            ),
        }
    }

    // -- commands -----------------------------------------------------------

    /// Invites `name`. In a group, only the leader may invite.
    pub async fn invite(&self, name: &str, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.core.cell.read(|state| {
            if state.group.is_some() && !state.is_leader() {
                return Err(SessionError::not_allowed("only the group leader can do that"));
            }
            Ok(())
        })?;
        self.core
            .send(&InvitePlayer { name: name.to_owned() }, cancel)
            .await
    }

    pub async fn accept_invite(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.core.cell.read(|state| match &state.pending_invite {
            None => Err(SessionError::not_open("group invite")),
            Some(invite) if !invite.can_accept => {
                Err(SessionError::not_allowed("invite cannot be accepted"))
            }
            Some(_) => Ok(()),
        })?;
        self.core.send(&AcceptInvite, cancel).await?;
        self.core.cell.update(|state| state.pending_invite = None);
        Ok(())
    }

    pub async fn decline_invite(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        if self.core.cell.read(|state| state.pending_invite.is_none()) {
            return Err(SessionError::not_open("group invite"));
        }
        self.core.send(&DeclineInvite, cancel).await?;
        self.core.cell.update(|state| state.pending_invite = None);
        Ok(())
    }

    /// Removes `member`. Leader only.
    pub async fn kick(
        &self,
        member: Guid,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.core.cell.read(|state| state.require_led_member(member))?;
        let packet = UninviteMember {
            member,
            reason: reason.to_owned(),
        };
        self.core.send(&packet, cancel).await
    }

    /// Hands leadership to `member`. Leader only.
    pub async fn promote(&self, member: Guid, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.core.cell.read(|state| state.require_led_member(member))?;
        self.core.send(&SetGroupLeader(member), cancel).await
    }

    pub async fn leave(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        if self.core.cell.read(|state| state.group.is_none()) {
            return Err(SessionError::not_open("group"));
        }
        self.core.send(&DisbandGroup, cancel).await?;
        let was_grouped = self.core.cell.update(|state| state.group.take().is_some());
        if was_grouped {
            self.core.cell.emit(PartyEvent::Left);
        }
        Ok(())
    }

    /// Changes the loot rules. Leader only.
    pub async fn set_loot_method(
        &self,
        method: LootMethod,
        master_looter: Guid,
        threshold: u8,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.core.cell.read(|state| state.require_leader().map(|_| ()))?;
        if method == LootMethod::MasterLoot && master_looter.is_empty() {
            return Err(SessionError::not_allowed("master loot needs a master looter"));
        }
        let packet = SetLootMethod {
            method,
            master_looter,
            threshold,
        };
        self.core.send(&packet, cancel).await
    }

    // -- queries ------------------------------------------------------------

    pub fn in_group(&self) -> bool {
        self.core.cell.read(|state| state.group.is_some())
    }

    pub fn pending_invite(&self) -> Option<GroupInvite> {
        self.core.cell.read(|state| state.pending_invite.clone())
    }

    /// Members other than the local player.
    pub fn members(&self) -> Vec<GroupMember> {
        self.core.cell.read(|state| {
            state
                .group
                .as_ref()
                .map(|group| group.members.clone())
                .unwrap_or_default()
        })
    }

    pub fn leader(&self) -> Option<Guid> {
        self.core
            .cell
            .read(|state| state.group.as_ref().map(|group| group.leader))
    }

    pub fn is_leader(&self) -> bool {
        self.core.cell.read(PartyState::is_leader)
    }

    pub fn loot_rules(&self) -> Option<LootRules> {
        self.core
            .cell
            .read(|state| state.group.as_ref().and_then(|group| group.loot))
    }

    // -- views --------------------------------------------------------------

    pub fn events(&self) -> impl Stream<Item = PartyEvent> + Send + 'static {
        self.core.events()
    }

    /// Group commands the server refused.
    pub fn rejections(&self) -> impl Stream<Item = PartyCommandResult> + Send + 'static {
        compose::projected(self.events(), |event| match event {
            PartyEvent::CommandResult(result) if !result.is_ok() => Some(result),
            _ => None,
        })
    }

    // -- lifecycle ----------------------------------------------------------

    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

#[cfg(test)]
mod tests {
    use emberlink_protocol::messages::party::GroupSetLeader;

    use super::*;

    const PLAYER: Guid = Guid(0x42);
    const THRALL: Guid = Guid(0x77);

    fn member(name: &str, guid: Guid) -> GroupMember {
        GroupMember {
            name: name.into(),
            guid,
            online: true,
            subgroup: 0,
            flags: 0,
            roles: 0,
        }
    }

    fn grouped(leader: Guid) -> PartyState {
        let mut state = PartyState::new(PLAYER);
        let mut list = GroupList::empty();
        list.members = vec![member("Thrall", THRALL)];
        list.leader = leader;
        state.apply(ServerMessage::Party(PartyMessage::List(list)), &mut Vec::new());
        state
    }

    #[test]
    fn test_empty_list_leaves_group() {
        let mut state = grouped(PLAYER);
        let mut events = Vec::new();
        state.apply(ServerMessage::Party(PartyMessage::List(GroupList::empty())), &mut events);
        assert!(state.group.is_none());
        assert_eq!(events, vec![PartyEvent::Left]);
    }

    #[test]
    fn test_set_leader_by_name() {
        let mut state = grouped(PLAYER);
        let set = |name: &str| {
            ServerMessage::Party(PartyMessage::SetLeader(GroupSetLeader { name: name.into() }))
        };

        state.apply(set("thrall"), &mut Vec::new());
        assert_eq!(state.group.as_ref().map(|g| g.leader), Some(THRALL));
        assert!(!state.is_leader());

        // Not in the list: the local player.
        state.apply(set("Jaina"), &mut Vec::new());
        assert!(state.is_leader());
    }

    #[test]
    fn test_leader_checks() {
        let state = grouped(THRALL);
        assert!(matches!(
            state.require_led_member(THRALL),
            Err(SessionError::Precondition(_))
        ));

        let state = grouped(PLAYER);
        assert!(state.require_led_member(THRALL).is_ok());
        assert!(state.require_led_member(Guid(0x1)).is_err());
    }

    #[test]
    fn test_list_clears_pending_invite() {
        let mut state = PartyState::new(PLAYER);
        let invite = GroupInvite {
            can_accept: true,
            inviter: "Thrall".into(),
        };
        state.apply(ServerMessage::Party(PartyMessage::Invite(invite)), &mut Vec::new());
        assert!(state.pending_invite.is_some());

        let mut list = GroupList::empty();
        list.members = vec![member("Thrall", THRALL)];
        state.apply(ServerMessage::Party(PartyMessage::List(list)), &mut Vec::new());
        assert!(state.pending_invite.is_none());
    }
}
