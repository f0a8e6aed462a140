use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::money::Won;
use crate::receipt::ExtractionResult;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("At least one participant is required")]
    NoParticipants,
    #[error("Item '{0}' has no assigned participants")]
    UnassignedItem(String),
    #[error("Participant '{0}' is listed more than once")]
    DuplicateParticipant(String),
}

/// Where the won left over by floor division end up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Reported in [`Settlement::unallocated`], owed by nobody.
    #[default]
    Unallocated,
    /// Added to the share of the first participant of each split.
    FirstParticipant,
}

/// An item together with the participants who shared it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedItem {
    pub item_name: String,
    pub total_amount: i64,
    pub participants: Vec<String>,
}

/// Per-participant amounts owed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub shares: BTreeMap<String, Won>,
    /// Remainder of floor division that was not assigned to anyone.
    pub unallocated: Won,
}

impl Settlement {
    pub fn share_of(&self, participant: &str) -> Option<Won> {
        self.shares.get(participant).copied()
    }

    pub fn allocated(&self) -> Won {
        self.shares.values().copied().sum()
    }

    fn credit(&mut self, participant: &str, amount: Won) {
        *self.shares.entry(participant.to_string()).or_default() += amount;
    }

    fn distribute(&mut self, total: Won, participants: &[String], policy: RemainderPolicy) {
        let (share, remainder) = total.split(participants.len());
        for name in participants {
            self.credit(name, share);
        }
        match (policy, participants.first()) {
            (RemainderPolicy::FirstParticipant, Some(first)) => self.credit(first, remainder),
            _ => self.unallocated += remainder,
        }
    }
}

fn check_unique(participants: &[String]) -> Result<(), SettlementError> {
    let mut seen = BTreeSet::new();
    for name in participants {
        if !seen.insert(name.as_str()) {
            return Err(SettlementError::DuplicateParticipant(name.clone()));
        }
    }
    Ok(())
}

/// Split the grand total of every receipt evenly among `participants`.
pub fn equal_split(
    receipts: &[ExtractionResult],
    participants: &[String],
    policy: RemainderPolicy,
) -> Result<Settlement, SettlementError> {
    if participants.is_empty() {
        return Err(SettlementError::NoParticipants);
    }
    check_unique(participants)?;

    let total: Won = receipts.iter().map(ExtractionResult::total).sum();
    let mut settlement = Settlement::default();
    settlement.distribute(total, participants, policy);
    Ok(settlement)
}

/// Split each item among the participants assigned to it and sum per participant.
pub fn itemized_split(
    items: &[AssignedItem],
    policy: RemainderPolicy,
) -> Result<Settlement, SettlementError> {
    let mut settlement = Settlement::default();
    for item in items {
        if item.participants.is_empty() {
            return Err(SettlementError::UnassignedItem(item.item_name.clone()));
        }
        check_unique(&item.participants)?;
        settlement.distribute(Won::new(item.total_amount), &item.participants, policy);
    }
    if settlement.shares.is_empty() {
        return Err(SettlementError::NoParticipants);
    }
    Ok(settlement)
}
