//! Per-kind checkers
//!
//! One [`ObjectChecker`](crate::checker::ObjectChecker) per mesh object kind.
//! Each runs the conflict detector for its kind (if any) and merges in the
//! per-object leaf checks.

pub mod authorization_policies;
pub mod destination_rules;
pub mod gateways;
pub mod peer_authentications;
pub mod sidecars;
pub mod virtual_services;

pub use authorization_policies::AuthorizationPolicyChecker;
pub use destination_rules::DestinationRuleChecker;
pub use gateways::GatewayChecker;
pub use peer_authentications::PeerAuthenticationChecker;
pub use sidecars::SidecarChecker;
pub use virtual_services::VirtualServiceChecker;
