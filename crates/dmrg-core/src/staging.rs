//! Exposure of a previous attempt's output folder to a new attempt.

use crate::domain::{HostId, RemoteFolderRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingMode {
    Reference,
    Copy,
}

/// Handed to the job-submission collaborator, which performs the link or copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingInstruction {
    pub source_host: HostId,
    pub source_path: String,
    pub destination_alias: String,
    pub mode: StagingMode,
}

impl StagingInstruction {
    pub fn as_tuple(&self) -> (&HostId, &str, &str) {
        (&self.source_host, &self.source_path, &self.destination_alias)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StagingPlan {
    pub symlinks: Vec<StagingInstruction>,
    pub copies: Vec<StagingInstruction>,
}

impl StagingPlan {
    pub fn push(&mut self, instruction: StagingInstruction) {
        match instruction.mode {
            StagingMode::Reference => self.symlinks.push(instruction),
            StagingMode::Copy => self.copies.push(instruction),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symlinks.is_empty() && self.copies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.symlinks.len() + self.copies.len()
    }
}

pub fn staging_mode_for(target_host: &HostId, parent: &RemoteFolderRef) -> StagingMode {
    if parent.is_colocated_with(target_host) {
        StagingMode::Reference
    } else {
        StagingMode::Copy
    }
}

pub fn plan_parent_staging(
    target_host: &HostId,
    parent: Option<&RemoteFolderRef>,
    destination_alias: &str,
) -> Option<StagingInstruction> {
    let parent = parent?;
    Some(StagingInstruction {
        source_host: parent.host.clone(),
        source_path: parent.path.clone(),
        destination_alias: destination_alias.to_string(),
        mode: staging_mode_for(target_host, parent),
    })
}

/// One instruction per supplied folder, in input order.
pub fn plan_staging(
    target_host: &HostId,
    parents: &[(RemoteFolderRef, &str)],
) -> StagingPlan {
    let mut plan = StagingPlan::default();
    for (parent, alias) in parents {
        if let Some(instruction) = plan_parent_staging(target_host, Some(parent), alias) {
            plan.push(instruction);
        }
    }
    plan
}
