//! Edit session state machine
//!
//! ```text
//! Viewing -> Editing -> Validating -> Applying -> Viewing
//!                           |
//!                           +-> Rejected -> Editing
//! ```

use super::diff::{compute_diff, EditDiff, PeerEdit};
use crate::models::{Network, PeerId};
use crate::{Error, Result};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

/// Where an edit session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditState {
    Viewing,
    Editing,
    Validating,
    Applying,
    Rejected,
}

/// Edit of one peer, from opening the form to applying it
#[derive(Debug, Clone)]
pub struct EditSession {
    peer_id: PeerId,
    state: EditState,
    working: PeerEdit,
    last_error: Option<Error>,
}

impl EditSession {
    /// Open a session on the current state of `peer_id`
    pub fn open(network: &Network, peer_id: &PeerId) -> Result<Self> {
        Ok(Self {
            peer_id: peer_id.clone(),
            state: EditState::Viewing,
            working: PeerEdit::from_network(network, peer_id)?,
            last_error: None,
        })
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn working(&self) -> &PeerEdit {
        &self.working
    }

    /// Error that sent the session to `Rejected`
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    fn transition(&mut self, from: &[EditState], to: EditState) -> Result<()> {
        if !from.contains(&self.state) {
            return Err(Error::InvalidArgument(format!(
                "edit session cannot go from {:?} to {:?}",
                self.state, to
            )));
        }
        self.state = to;
        Ok(())
    }

    /// Start (or resume after a rejection) editing the working copy
    pub fn begin_edit(&mut self) -> Result<&mut PeerEdit> {
        self.transition(
            &[EditState::Viewing, EditState::Editing, EditState::Rejected],
            EditState::Editing,
        )?;
        Ok(&mut self.working)
    }

    /// Replace the working copy wholesale
    pub fn replace_working(&mut self, edit: PeerEdit) -> Result<()> {
        *self.begin_edit()? = edit;
        Ok(())
    }

    /// Diff the working copy against `network`
    ///
    /// On a validation failure the session moves to `Rejected` and keeps
    /// the working copy for correction.
    pub fn validate(&mut self, network: &Network, subnet: Ipv4Net) -> Result<EditDiff> {
        self.transition(&[EditState::Editing], EditState::Validating)?;
        match compute_diff(network, subnet, &self.peer_id, &self.working) {
            Ok(diff) => {
                self.last_error = None;
                Ok(diff)
            }
            Err(e) => {
                self.state = EditState::Rejected;
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn begin_apply(&mut self) -> Result<()> {
        self.transition(&[EditState::Validating], EditState::Applying)
    }

    /// Back to viewing the applied state of the peer
    pub fn finish_apply(&mut self, network: &Network) -> Result<()> {
        self.transition(&[EditState::Applying], EditState::Viewing)?;
        self.working = PeerEdit::from_network(network, &self.peer_id)?;
        Ok(())
    }
}
