//! Static routing table and the topology derived from it.
//!
//! Every queue is bound to exactly one exchange using its own name as the
//! routing key, and carries exactly one [`CommandKind`]. The set of queues is
//! fixed at compile time.

use std::collections::BTreeSet;

use super::CommandKind;

/// Exchange carrying kwek commands.
pub const KWEK_EXCHANGE: &str = "kwek-exchange";
/// Exchange carrying user commands.
pub const USER_EXCHANGE: &str = "user-exchange";

/// One queue and the exchange and command kind it is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueBinding {
    /// Queue name; also the routing key.
    pub queue: &'static str,
    /// Exchange the queue is bound to.
    pub exchange: &'static str,
    /// Command kind every delivery on this queue decodes into.
    pub kind: CommandKind,
}

impl QueueBinding {
    /// Routing key used both for binding and for publishing.
    pub const fn routing_key(&self) -> &'static str {
        self.queue
    }
}

/// The fixed routing table consumed by the worker.
pub const ROUTING_TABLE: [QueueBinding; 6] = [
    QueueBinding {
        queue: "kwek.create",
        exchange: KWEK_EXCHANGE,
        kind: CommandKind::CreateKwek,
    },
    QueueBinding {
        queue: "kwek.update",
        exchange: KWEK_EXCHANGE,
        kind: CommandKind::UpdateKwek,
    },
    QueueBinding {
        queue: "kwek.delete",
        exchange: KWEK_EXCHANGE,
        kind: CommandKind::DeleteKwek,
    },
    QueueBinding {
        queue: "user.create",
        exchange: USER_EXCHANGE,
        kind: CommandKind::CreateUser,
    },
    QueueBinding {
        queue: "user.update",
        exchange: USER_EXCHANGE,
        kind: CommandKind::UpdateUser,
    },
    QueueBinding {
        queue: "user.delete",
        exchange: USER_EXCHANGE,
        kind: CommandKind::DeleteUser,
    },
];

/// Look up the binding that carries `kind`.
pub fn binding_for_kind(kind: CommandKind) -> Option<&'static QueueBinding> {
    ROUTING_TABLE.iter().find(|binding| binding.kind == kind)
}

/// Exchanges and queues to declare before consuming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyPlan {
    exchanges: Vec<&'static str>,
    queues: Vec<QueueBinding>,
}

impl TopologyPlan {
    /// Derive the plan from a routing table.
    ///
    /// Exchanges are deduplicated and sorted so repeated declarations happen
    /// in a stable order.
    ///
    /// # Examples
    /// ```
    /// use kwekker_worker::domain::{ROUTING_TABLE, TopologyPlan};
    ///
    /// let plan = TopologyPlan::from_bindings(&ROUTING_TABLE);
    /// assert_eq!(plan.exchanges(), ["kwek-exchange", "user-exchange"]);
    /// assert_eq!(plan.queues().len(), 6);
    /// ```
    pub fn from_bindings(bindings: &[QueueBinding]) -> Self {
        let exchanges = bindings
            .iter()
            .map(|binding| binding.exchange)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            exchanges,
            queues: bindings.to_vec(),
        }
    }

    /// Distinct exchange names.
    pub fn exchanges(&self) -> &[&'static str] {
        &self.exchanges
    }

    /// Queue bindings in table order.
    pub fn queues(&self) -> &[QueueBinding] {
        &self.queues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn queue_names_are_unique() {
        let names = ROUTING_TABLE
            .iter()
            .map(|binding| binding.queue)
            .collect::<BTreeSet<_>>();
        assert_eq!(names.len(), ROUTING_TABLE.len());
    }

    #[rstest]
    fn plan_declares_each_exchange_once() {
        let doubled = [ROUTING_TABLE, ROUTING_TABLE].concat();
        let plan = TopologyPlan::from_bindings(&doubled);

        assert_eq!(plan.exchanges(), [KWEK_EXCHANGE, USER_EXCHANGE]);
    }

    #[rstest]
    fn queues_are_bound_with_their_own_name() {
        let plan = TopologyPlan::from_bindings(&ROUTING_TABLE);

        for binding in plan.queues() {
            assert_eq!(binding.routing_key(), binding.queue);
        }
    }

    #[rstest]
    #[case(CommandKind::CreateKwek, "kwek.create", KWEK_EXCHANGE)]
    #[case(CommandKind::UpdateKwek, "kwek.update", KWEK_EXCHANGE)]
    #[case(CommandKind::DeleteKwek, "kwek.delete", KWEK_EXCHANGE)]
    #[case(CommandKind::CreateUser, "user.create", USER_EXCHANGE)]
    #[case(CommandKind::UpdateUser, "user.update", USER_EXCHANGE)]
    #[case(CommandKind::DeleteUser, "user.delete", USER_EXCHANGE)]
    fn every_kind_has_one_binding(
        #[case] kind: CommandKind,
        #[case] queue: &str,
        #[case] exchange: &str,
    ) {
        let binding = binding_for_kind(kind).expect("binding exists");
        assert_eq!(binding.queue, queue);
        assert_eq!(binding.exchange, exchange);
    }
}
