//! Classifies a method+path pair against the static table of intercepted
//! routes (`spec.md` §4.2 step 3).

use gateway_core::ArrayFamily;
use http::Method;

/// A request the gateway must enforce policy/quota on, versus one that
/// passes straight through to the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptedRoute {
    CreateVolume,
    DeleteVolume,
    Map,
    Unmap,
    Mount,
    Unmount,
    SnapshotCreate,
    SnapshotDelete,
    Query,
    RegisterSdc,
}

impl InterceptedRoute {
    /// Whether a successful response should trigger `PublishCreated`
    /// (`true`) or `PublishDeleted` (`false`), or neither (`None`) for
    /// routes that don't touch the quota ledger.
    pub fn publishes_creation(&self) -> Option<bool> {
        match self {
            InterceptedRoute::CreateVolume | InterceptedRoute::SnapshotCreate => Some(true),
            InterceptedRoute::DeleteVolume | InterceptedRoute::SnapshotDelete => Some(false),
            _ => None,
        }
    }
}

/// Matches `method`/`path` against each family's static route table.
/// Returns `None` for anything not intercepted (plain reverse-proxy).
pub fn classify(family: ArrayFamily, method: &Method, path: &str) -> Option<InterceptedRoute> {
    match family {
        ArrayFamily::PowerFlex => classify_powerflex(method, path),
        ArrayFamily::PowerMax => classify_powermax(method, path),
        ArrayFamily::PowerScale => classify_powerscale(method, path),
    }
}

fn classify_powerflex(method: &Method, path: &str) -> Option<InterceptedRoute> {
    match (method, path) {
        (&Method::POST, "/api/types/Volume/instances/") => Some(InterceptedRoute::CreateVolume),
        (&Method::POST, p) if p.starts_with("/api/instances/Volume::") && p.ends_with("/action/removeVolume") => {
            Some(InterceptedRoute::DeleteVolume)
        }
        (&Method::POST, p) if p.starts_with("/api/instances/Volume::") && p.ends_with("/action/addMappedSdc") => {
            Some(InterceptedRoute::Map)
        }
        (&Method::POST, p) if p.starts_with("/api/instances/Volume::") && p.ends_with("/action/removeMappedSdc") => {
            Some(InterceptedRoute::Unmap)
        }
        (&Method::POST, p) if p.starts_with("/api/instances/Volume::") && p.ends_with("/action/snapshotVolumes") => {
            Some(InterceptedRoute::SnapshotCreate)
        }
        (&Method::POST, "/api/types/Sdc/instances/") => Some(InterceptedRoute::RegisterSdc),
        _ => None,
    }
}

fn classify_powermax(method: &Method, path: &str) -> Option<InterceptedRoute> {
    let is_storage_group = path.contains("/sloprovisioning/symmetrix/") && path.contains("/storagegroup/");
    match (method, is_storage_group) {
        (&Method::PUT, true) => Some(InterceptedRoute::CreateVolume),
        (&Method::GET, true) => Some(InterceptedRoute::Query),
        _ => None,
    }
}

fn classify_powerscale(method: &Method, path: &str) -> Option<InterceptedRoute> {
    match (method, path) {
        (&Method::POST, p) if p.starts_with("/namespace/") => Some(InterceptedRoute::CreateVolume),
        (&Method::DELETE, p) if p.starts_with("/namespace/") => Some(InterceptedRoute::DeleteVolume),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powerflex_create_volume_is_intercepted() {
        let route = classify(ArrayFamily::PowerFlex, &Method::POST, "/api/types/Volume/instances/");
        assert_eq!(route, Some(InterceptedRoute::CreateVolume));
    }

    #[test]
    fn powerflex_remove_volume_is_intercepted() {
        let route = classify(
            ArrayFamily::PowerFlex,
            &Method::POST,
            "/api/instances/Volume::abc123/action/removeVolume",
        );
        assert_eq!(route, Some(InterceptedRoute::DeleteVolume));
    }

    #[test]
    fn powerflex_unrelated_route_passes_through() {
        let route = classify(ArrayFamily::PowerFlex, &Method::GET, "/api/version");
        assert_eq!(route, None);
    }

    #[test]
    fn powermax_storage_group_put_is_intercepted() {
        let route = classify(
            ArrayFamily::PowerMax,
            &Method::PUT,
            "/univmax/restapi/100/sloprovisioning/symmetrix/sid1/storagegroup/sg1/",
        );
        assert_eq!(route, Some(InterceptedRoute::CreateVolume));
    }

    #[test]
    fn powerscale_namespace_post_is_intercepted() {
        let route = classify(ArrayFamily::PowerScale, &Method::POST, "/namespace/ifs/data/v1");
        assert_eq!(route, Some(InterceptedRoute::CreateVolume));
    }
}
