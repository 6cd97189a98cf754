use std::sync::Arc;

use tracing::{debug, info};
use xmpp_parsers::ns;

use ignore_groups_core::SettingsSource;

use crate::filter::{FilterOutcome, RosterGroupFilter};
use crate::pipeline::{ProcessorContext, ProcessorResult, StanzaClass, StanzaProcessor};
use crate::stanza::Stanza;

pub struct IgnoreGroupsProcessor {
    filter: RosterGroupFilter,
}

impl IgnoreGroupsProcessor {
    pub fn new(settings: Arc<dyn SettingsSource>) -> Self {
        Self {
            filter: RosterGroupFilter::new(settings),
        }
    }

    /// The only stanza class this processor intercepts.
    pub fn class() -> StanzaClass {
        StanzaClass::new("query", ns::ROSTER)
    }
}

impl StanzaProcessor for IgnoreGroupsProcessor {
    fn name(&self) -> &str {
        "ignore_groups"
    }

    fn process_inbound(&self, stanza: &mut Stanza, ctx: &ProcessorContext) -> ProcessorResult {
        let Some(payload) = stanza.iq_payload_mut() else {
            return ProcessorResult::Continue;
        };

        match self.filter.filter_query(payload, &ctx.session) {
            FilterOutcome::Mutated { removed_groups } => {
                info!(
                    session = %ctx.session,
                    removed = removed_groups,
                    "server-sent roster groups ignored"
                );
            }
            FilterOutcome::Unchanged => {
                debug!(session = %ctx.session, "roster passed through with groups");
            }
        }

        ProcessorResult::Continue
    }
}
