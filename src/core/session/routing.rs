use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::info;

/// Alternate backend target installed by a client `config` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTarget {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub region: Option<String>,
}

/// Per-session routing handle.
///
/// Written by the inbound decode path, read by the coordinator on every
/// tool call. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct SessionRouting {
    slot: Arc<ArcSwapOption<RoutingTarget>>,
}

impl SessionRouting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current target.
    pub fn current(&self) -> Option<Arc<RoutingTarget>> {
        self.slot.load_full()
    }

    /// Install, replace, or clear the routing target.
    pub fn install(&self, target: Option<RoutingTarget>) {
        let previous = self.slot.swap(target.clone().map(Arc::new));
        match (previous, target) {
            (None, Some(next)) => info!(
                agent_id = %next.agent_id,
                agent_alias_id = %next.agent_alias_id,
                "Routing target configured"
            ),
            (Some(prev), Some(next)) if *prev != next => info!(
                previous_agent_id = %prev.agent_id,
                agent_id = %next.agent_id,
                agent_alias_id = %next.agent_alias_id,
                "Routing target replaced"
            ),
            (Some(_), None) => info!("Routing target cleared"),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str) -> RoutingTarget {
        RoutingTarget {
            agent_id: id.to_string(),
            agent_alias_id: "alias".to_string(),
            region: None,
        }
    }

    #[test]
    fn test_clones_share_slot() {
        let routing = SessionRouting::new();
        let reader = routing.clone();
        assert!(reader.current().is_none());

        routing.install(Some(target("A")));
        assert_eq!(reader.current().unwrap().agent_id, "A");

        routing.install(Some(target("B")));
        assert_eq!(reader.current().unwrap().agent_id, "B");

        routing.install(None);
        assert!(reader.current().is_none());
    }
}
