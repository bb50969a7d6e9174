//! Domain records persisted by the store

mod activity;
mod agent;
mod decision;
mod notification;
mod policy;
mod task;

pub use activity::{Activity, ActivityDetail, ActivityKind, ActivityTarget};
pub use agent::{Agent, AgentPatch, AgentStatus, NewAgent};
pub use decision::{NewRouterDecision, RouterDecision, RouterStats};
pub use notification::{NewNotification, Notification, NotificationKind, Reference};
pub use policy::{AUTO_APPROVE, AutoApprovePolicy, Policy, PolicyValue};
pub use task::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
