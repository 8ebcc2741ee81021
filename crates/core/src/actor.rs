//! Actors that act on orders: warehouse staff, forwarders and automated systems.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::order::Order;

/// Under what authority a change was made.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// Warehouse employee.
    Staff,
    /// Forwarder account acting as order-management admin.
    Forwarder,
    /// Automated caller such as an inbound webhook.
    System,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::Staff => "staff",
            ActorType::Forwarder => "forwarder",
            ActorType::System => "system",
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an actor type string that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown actor type: {0}")]
pub struct UnknownActorType(pub String);

impl FromStr for ActorType {
    type Err = UnknownActorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(ActorType::Staff),
            "forwarder" => Ok(ActorType::Forwarder),
            "system" => Ok(ActorType::System),
            _ => Err(UnknownActorType(s.to_string())),
        }
    }
}

/// Role used by the status policy.
///
/// Unknown role strings deserialize to [`Role::Unrecognized`] so that the
/// policy can refuse them instead of the request failing to parse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    WarehouseWorker,
    Supervisor,
    Manager,
    /// Admin override held by forwarder accounts.
    Forwarder,
    /// Automated callers.
    System,
    #[serde(other)]
    Unrecognized,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::WarehouseWorker => "warehouse_worker",
            Role::Supervisor => "supervisor",
            Role::Manager => "manager",
            Role::Forwarder => "forwarder",
            Role::System => "system",
            Role::Unrecognized => "unrecognized",
        }
    }

    /// Roles a staff member can hold. The admin override belongs to
    /// forwarder accounts and `system` to automated callers, never to staff.
    pub fn is_staff_role(&self) -> bool {
        matches!(self, Role::WarehouseWorker | Role::Supervisor | Role::Manager)
    }

    /// Parse a role string. Never fails; unknown values become `Unrecognized`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "warehouse_worker" => Role::WarehouseWorker,
            "supervisor" => Role::Supervisor,
            "manager" => Role::Manager,
            "forwarder" => Role::Forwarder,
            "system" => Role::System,
            _ => Role::Unrecognized,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Someone (or something) requesting an order change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub actor_type: ActorType,
    pub role: Role,
    /// Forwarder the actor belongs to (staff) or is (forwarder accounts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarder_id: Option<String>,
    /// Warehouses a staff member is assigned to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warehouse_ids: Vec<String>,
}

impl Actor {
    /// Staff member with a role and warehouse assignments.
    pub fn staff(id: impl Into<String>, role: Role, warehouse_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            actor_type: ActorType::Staff,
            role,
            forwarder_id: None,
            warehouse_ids,
        }
    }

    /// Forwarder account acting as admin over its own orders.
    pub fn forwarder(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            forwarder_id: Some(id.clone()),
            id,
            actor_type: ActorType::Forwarder,
            role: Role::Forwarder,
            warehouse_ids: Vec::new(),
        }
    }

    /// Automated caller, not bound to a warehouse.
    pub fn system(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            actor_type: ActorType::System,
            role: Role::System,
            forwarder_id: None,
            warehouse_ids: Vec::new(),
        }
    }

    /// Actor with no recognizable authority.
    pub fn anonymous() -> Self {
        Self {
            id: "anonymous".to_string(),
            actor_type: ActorType::Staff,
            role: Role::Unrecognized,
            forwarder_id: None,
            warehouse_ids: Vec::new(),
        }
    }

    /// Set the forwarder the actor belongs to.
    pub fn with_forwarder(mut self, forwarder_id: impl Into<String>) -> Self {
        self.forwarder_id = Some(forwarder_id.into());
        self
    }

    /// Role the status policy evaluates.
    ///
    /// Forwarder accounts always act with the admin override, whatever role
    /// string they carry. Staff carrying a non-staff role are unrecognized.
    pub fn effective_role(&self) -> Role {
        match self.actor_type {
            ActorType::Forwarder => Role::Forwarder,
            ActorType::System => Role::System,
            ActorType::Staff if self.role.is_staff_role() => self.role,
            ActorType::Staff => Role::Unrecognized,
        }
    }

    /// Whether the actor may act on this order at all.
    pub fn can_access(&self, order: &Order) -> bool {
        self.in_scope(&order.forwarder_id, &order.warehouse_id)
    }

    /// Whether the actor may act on orders of `forwarder_id` handled at
    /// `warehouse_id`. Staff need the warehouse (and matching forwarder when
    /// they belong to one), forwarders need ownership, system actors are
    /// unscoped.
    pub fn in_scope(&self, forwarder_id: &str, warehouse_id: &str) -> bool {
        match self.actor_type {
            ActorType::System => true,
            ActorType::Forwarder => self.forwarder_id.as_deref() == Some(forwarder_id),
            ActorType::Staff => {
                let forwarder_ok = self.forwarder_id.as_deref().is_none_or(|f| f == forwarder_id);
                forwarder_ok && self.warehouse_ids.iter().any(|w| w == warehouse_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("warehouse_worker"), Role::WarehouseWorker);
        assert_eq!(Role::parse("Manager"), Role::Manager);
        assert_eq!(Role::parse("janitor"), Role::Unrecognized);
        assert_eq!(Role::parse(""), Role::Unrecognized);
    }

    #[test]
    fn test_unknown_role_deserializes_as_unrecognized() {
        let role: Role = serde_json::from_str("\"janitor\"").unwrap();
        assert_eq!(role, Role::Unrecognized);

        let role: Role = serde_json::from_str("\"supervisor\"").unwrap();
        assert_eq!(role, Role::Supervisor);
    }

    #[test]
    fn test_forwarder_always_has_admin_override() {
        let mut actor = Actor::forwarder("fwd-1");
        actor.role = Role::WarehouseWorker;
        assert_eq!(actor.effective_role(), Role::Forwarder);
    }

    #[test]
    fn test_staff_effective_role_is_own_role() {
        let actor = Actor::staff("s-1", Role::Supervisor, vec![]);
        assert_eq!(actor.effective_role(), Role::Supervisor);
    }

    #[test]
    fn test_staff_cannot_borrow_non_staff_roles() {
        for role in [Role::Forwarder, Role::System, Role::Unrecognized] {
            let actor = Actor::staff("s-1", role, vec!["wh-1".to_string()]);
            assert_eq!(actor.effective_role(), Role::Unrecognized, "{}", role);
        }
        assert!(Role::Manager.is_staff_role());
        assert!(!Role::Forwarder.is_staff_role());
    }

    #[test]
    fn test_actor_type_from_str() {
        assert_eq!("staff".parse::<ActorType>().unwrap(), ActorType::Staff);
        assert_eq!("FORWARDER".parse::<ActorType>().unwrap(), ActorType::Forwarder);
        assert!("robot".parse::<ActorType>().is_err());
    }

    #[test]
    fn test_staff_scope_requires_assigned_warehouse() {
        let order = fixtures::order("wh-1", "fwd-1", crate::order::OrderStatus::Incoming);

        let assigned = Actor::staff("s-1", Role::WarehouseWorker, vec!["wh-1".to_string()]);
        let elsewhere = Actor::staff("s-2", Role::WarehouseWorker, vec!["wh-2".to_string()]);
        let other_tenant = Actor::staff("s-3", Role::Manager, vec!["wh-1".to_string()])
            .with_forwarder("fwd-2");

        assert!(assigned.can_access(&order));
        assert!(!elsewhere.can_access(&order));
        assert!(!other_tenant.can_access(&order));
    }

    #[test]
    fn test_forwarder_scope_requires_ownership() {
        let order = fixtures::order("wh-1", "fwd-1", crate::order::OrderStatus::Incoming);

        assert!(Actor::forwarder("fwd-1").can_access(&order));
        assert!(!Actor::forwarder("fwd-2").can_access(&order));
    }

    #[test]
    fn test_system_is_unscoped() {
        let order = fixtures::order("wh-9", "fwd-9", crate::order::OrderStatus::Packed);
        assert!(Actor::system("courier-webhook").can_access(&order));
    }
}
