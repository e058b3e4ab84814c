//! Command-line options shared by the utility binaries.

use crate::endpoints::Params;
use clap::Args;

/// Parameters that select a cache slot and are forwarded upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct SlotArgs {
    /// Period start (`from`)
    #[arg(long, value_name = "DATE")]
    pub from: Option<String>,

    /// Period end (`to`)
    #[arg(long, value_name = "DATE")]
    pub to: Option<String>,

    /// Agent id (`agentId`)
    #[arg(long = "agent-id", alias = "agentId", value_name = "ID")]
    pub agent_id: Option<String>,
}

impl SlotArgs {
    pub fn to_params(&self) -> Params {
        [
            ("from", &self.from),
            ("to", &self.to),
            ("agentId", &self.agent_id),
        ]
        .into_iter()
        .filter_map(|(name, value)| Some((name.to_string(), value.clone()?)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.agent_id.is_none()
    }
}
