use log::trace;

use super::{PeerId, PeerRole, TableKey};

/// Who a route is going from and to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportParams {
    pub from_peer_id: PeerId,
    pub from_role: PeerRole,
    pub to_peer_id: PeerId,
    pub to_role: PeerRole,
    pub table_key: TableKey,
}

/// Export policy applied per destination peer.
/// `None` means the destination must not see the route.
pub trait RoutingPolicies<A> {
    fn apply_export_policies(&self, params: &ExportParams, attributes: &A) -> Option<A>;
}

/// Every route goes everywhere, unmodified
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl<A: Clone> RoutingPolicies<A> for AcceptAll {
    fn apply_export_policies(&self, _params: &ExportParams, attributes: &A) -> Option<A> {
        Some(attributes.clone())
    }
}

/// iBGP split horizon with route reflection: routes learned over iBGP
/// only go to eBGP peers and reflector clients, anything learned from a
/// client or an external peer is reflected everywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct RouteReflection;

impl<A: Clone> RoutingPolicies<A> for RouteReflection {
    fn apply_export_policies(&self, params: &ExportParams, attributes: &A) -> Option<A> {
        use PeerRole::*;
        let allowed = match (params.from_role, params.to_role) {
            (Ibgp, Ibgp) => false,
            (_, Internal) => false,
            _ => true,
        };
        if allowed {
            Some(attributes.clone())
        } else {
            trace!(
                "Export from {} ({}) to {} ({}) rejected",
                params.from_peer_id,
                params.from_role,
                params.to_peer_id,
                params.to_role
            );
            None
        }
    }
}
