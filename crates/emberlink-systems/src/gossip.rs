//! NPC gossip menus.
//!
//! A menu replaces the snapshot wholesale. NPC text records arrive
//! separately and carry only a text id, so each id is bound to the NPC it
//! was requested for: by the menu that names it, or by
//! [`GossipSystem::query_text`]. A text record patches the snapshot only
//! when its NPC is the one the window is open on.

use std::collections::HashMap;

use emberlink_protocol::messages::gossip::{
    GossipHello, GossipIcon, GossipMenu, GossipMessage, GossipOption, NpcTextUpdate,
    QueryNpcText, SelectGossipOption,
};
use emberlink_protocol::{Guid, ServerMessage};
use emberlink_session::{compose, Phase, SessionError, WindowState};
use emberlink_transport::Transport;
use futures_util::{stream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::base::SystemCore;
use crate::SystemContext;

/// A service an NPC advertises through a gossip option icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Vendor,
    FlightMaster,
    Trainer,
    Banker,
    TabardDesigner,
    Battlemaster,
}

impl ServiceKind {
    pub fn from_icon(icon: GossipIcon) -> Option<Self> {
        Some(match icon {
            GossipIcon::Vendor => Self::Vendor,
            GossipIcon::Taxi => Self::FlightMaster,
            GossipIcon::Trainer => Self::Trainer,
            GossipIcon::MoneyBag => Self::Banker,
            GossipIcon::Tabard => Self::TabardDesigner,
            GossipIcon::Battle => Self::Battlemaster,
            _ => return None,
        })
    }
}

/// A service found on an NPC's menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredService {
    pub npc: Guid,
    pub kind: ServiceKind,
    pub option: u32,
}

/// The open menu plus its NPC text, once known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipSnapshot {
    pub menu: GossipMenu,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GossipEvent {
    Menu(GossipMenu),
    Text { npc: Guid, text_id: u32, text: String },
    Closed { npc: Option<Guid> },
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct GossipState {
    window: WindowState,
    snapshot: Option<GossipSnapshot>,
    /// Text id → the NPC it was requested for.
    text_bindings: HashMap<u32, Guid>,
}

impl GossipState {
    fn close(&mut self) -> Option<Guid> {
        self.snapshot = None;
        self.text_bindings.clear();
        self.window.close()
    }

    fn apply(&mut self, message: ServerMessage, events: &mut Vec<GossipEvent>) {
        let ServerMessage::Gossip(message) = message else {
            return;
        };
        match message {
            GossipMessage::Menu(menu) => {
                let solicited = self.window.confirm_open(menu.npc);
                info!(npc = %menu.npc, options = menu.options.len(), solicited, "gossip menu");
                self.text_bindings.retain(|_, npc| *npc == menu.npc);
                if menu.text_id != 0 {
                    self.text_bindings.insert(menu.text_id, menu.npc);
                }
                self.snapshot = Some(GossipSnapshot {
                    menu: menu.clone(),
                    text: None,
                });
                events.push(GossipEvent::Menu(menu));
            }
            GossipMessage::Complete => {
                if self.window.phase() != Phase::Closed {
                    let npc = self.close();
                    info!(npc = ?npc, "gossip closed by server");
                    events.push(GossipEvent::Closed { npc });
                }
            }
            GossipMessage::TextUpdate(update) => self.apply_text(update, events),
        }
    }

    fn apply_text(&mut self, update: NpcTextUpdate, events: &mut Vec<GossipEvent>) {
        let bound = self.text_bindings.get(&update.text_id).copied();
        let target = self.window.target();
        let (Some(npc), Some(snapshot)) = (bound.filter(|npc| Some(*npc) == target), &mut self.snapshot)
        else {
            debug!(text_id = update.text_id, bound = ?bound, target = ?target, "stale npc text, ignoring");
            return;
        };
        let text = update.best_text().unwrap_or_default().to_owned();
        snapshot.text = Some(text.clone());
        events.push(GossipEvent::Text {
            npc,
            text_id: update.text_id,
            text,
        });
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

pub struct GossipSystem<T> {
    core: SystemCore<T, GossipState, GossipEvent>,
}

impl<T: Transport> GossipSystem<T> {
    pub fn new(ctx: &SystemContext<T>) -> Self {
        Self {
            core: SystemCore::start(
                ctx,
                "gossip",
                GossipState::default(),
                GossipMessage::OPCODES,
                GossipState::apply,
            ),
        }
    }

    /// Greets `npc`, asking for its menu.
    pub async fn talk(&self, npc: Guid, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.core.send(&GossipHello(npc), cancel).await?;
        self.core.cell.update(|state| {
            if !(state.window.is_open() && state.window.target() == Some(npc)) {
                state.snapshot = None;
                state.window.begin_open(npc);
            }
        });
        Ok(())
    }

    /// Picks option `index` of the open menu. Coded options need `code`.
    pub async fn select(
        &self,
        index: u32,
        code: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let packet = self.core.cell.read(|state| {
            let npc = state.window.require_open("gossip")?;
            let snapshot = state
                .snapshot
                .as_ref()
                .ok_or_else(|| SessionError::not_open("gossip"))?;
            let option = snapshot
                .menu
                .options
                .iter()
                .find(|option| option.index == index)
                .ok_or_else(|| SessionError::not_found("gossip option", index))?;
            let code = match (option.coded, code) {
                (true, None | Some("")) => {
                    return Err(SessionError::not_allowed("gossip option requires a code"));
                }
                (true, Some(code)) => Some(code.to_owned()),
                (false, _) => None,
            };
            Ok(SelectGossipOption {
                npc,
                menu_id: snapshot.menu.menu_id,
                index,
                code,
            })
        })?;
        self.core.send(&packet, cancel).await?;
        self.core.cell.update(|state| state.window.begin_wait());
        Ok(())
    }

    /// Requests NPC text `text_id` for the NPC the window is on.
    pub async fn query_text(
        &self,
        text_id: u32,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let npc = self
            .core
            .cell
            .read(|state| state.window.target())
            .ok_or_else(|| SessionError::not_open("gossip"))?;
        self.core.send(&QueryNpcText { text_id, npc }, cancel).await?;
        self.core.cell.update(|state| {
            state.text_bindings.insert(text_id, npc);
        });
        Ok(())
    }

    /// Closes the window locally. The server has no close command for
    /// gossip; it simply stops expecting a selection.
    pub fn close(&self) -> Result<(), SessionError> {
        self.core.cell.ensure_live()?;
        let npc = self.core.cell.update(GossipState::close);
        if npc.is_some() {
            self.core.cell.emit(GossipEvent::Closed { npc });
        }
        Ok(())
    }

    // -- queries ------------------------------------------------------------

    pub fn is_open(&self) -> bool {
        self.core.cell.read(|state| state.window.is_open())
    }

    pub fn phase(&self) -> Phase {
        self.core.cell.read(|state| state.window.phase())
    }

    pub fn current_target(&self) -> Option<Guid> {
        self.core.cell.read(|state| state.window.target())
    }

    pub fn menu(&self) -> Option<GossipSnapshot> {
        self.core.cell.read(|state| state.snapshot.clone())
    }

    pub fn options(&self) -> Vec<GossipOption> {
        self.core.cell.read(|state| {
            state
                .snapshot
                .as_ref()
                .map(|snapshot| snapshot.menu.options.clone())
                .unwrap_or_default()
        })
    }

    // -- views --------------------------------------------------------------

    pub fn events(&self) -> impl Stream<Item = GossipEvent> + Send + 'static {
        self.core.events()
    }

    pub fn menus(&self) -> impl Stream<Item = GossipMenu> + Send + 'static {
        compose::projected(self.events(), |event| match event {
            GossipEvent::Menu(menu) => Some(menu),
            _ => None,
        })
    }

    /// Every service advertised by a menu, one item per option.
    pub fn services_discovered(&self) -> impl Stream<Item = DiscoveredService> + Send + 'static {
        self.menus().flat_map(|menu| {
            let npc = menu.npc;
            stream::iter(menu.options.into_iter().filter_map(move |option| {
                ServiceKind::from_icon(option.icon).map(|kind| DiscoveredService {
                    npc,
                    kind,
                    option: option.index,
                })
            }))
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
