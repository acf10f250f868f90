//! Parses the `Forwarded` header and normalizes plugin ids to a family
//! (`spec.md` §4.2 step 1, §6 "Forwarded header format").

use gateway_core::ArrayFamily;

/// The parsed target of a proxied request: where it's going and which
/// family handles it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedTarget {
    pub endpoint: String,
    pub array_id: String,
    pub family: Option<ArrayFamily>,
}

const SENTINEL: &str = "csm-authorization";

/// Accepts both header forms (`spec.md` §6):
/// - `for=<endpoint>;<array-id>`, `by=<plugin-id>`
/// - `for=csm-authorization;<endpoint>;<array-id>`, `by=csm-authorization;<plugin-id>`
///
/// Returns `None` if the header is missing either directive or malformed.
pub fn parse(header_value: &str) -> Option<ForwardedTarget> {
    let mut for_value = None;
    let mut by_value = None;

    for directive in header_value.split(',') {
        for part in directive.split(';') {
            let part = part.trim();
            if let Some(v) = part.strip_prefix("for=") {
                for_value = Some(v.trim());
            } else if let Some(v) = part.strip_prefix("by=") {
                by_value = Some(v.trim());
            }
        }
    }

    let (endpoint, array_id) = parse_for(for_value?)?;
    let plugin_id = parse_by(by_value?)?;
    let family = ArrayFamily::from_alias(plugin_id);

    Some(ForwardedTarget {
        endpoint,
        array_id,
        family,
    })
}

fn parse_for(value: &str) -> Option<(String, String)> {
    let fields: Vec<&str> = value.split(';').map(str::trim).collect();
    match fields.as_slice() {
        [endpoint, array_id] => Some((endpoint.to_string(), array_id.to_string())),
        [sentinel, endpoint, array_id] if *sentinel == SENTINEL => {
            Some((endpoint.to_string(), array_id.to_string()))
        }
        _ => None,
    }
}

fn parse_by(value: &str) -> Option<&str> {
    let fields: Vec<&str> = value.split(';').map(str::trim).collect();
    match fields.as_slice() {
        [plugin_id] => Some(plugin_id),
        [sentinel, plugin_id] if *sentinel == SENTINEL => Some(plugin_id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn old_form_parses() {
        let target = parse("for=https://10.0.0.1;12345, by=csi-vxflexos").unwrap();
        assert_eq!(target.endpoint, "https://10.0.0.1");
        assert_eq!(target.array_id, "12345");
        assert_eq!(target.family, Some(ArrayFamily::PowerFlex));
    }

    #[test]
    fn sentinel_form_parses_identically() {
        let target = parse("for=csm-authorization;https://10.0.0.1;12345, by=csm-authorization;csi-vxflexos").unwrap();
        assert_eq!(target.endpoint, "https://10.0.0.1");
        assert_eq!(target.array_id, "12345");
        assert_eq!(target.family, Some(ArrayFamily::PowerFlex));
    }

    #[test]
    fn scenario_6_from_spec_dispatches_to_powerflex() {
        let target = parse(
            "for=csm-authorization;https://10.0.0.1;12345, by=csm-authorization;csi-vxflexos",
        )
        .unwrap();
        assert_eq!(target.family, Some(ArrayFamily::PowerFlex));
        assert_eq!(target.array_id, "12345");
    }

    #[test]
    fn unknown_alias_yields_no_family() {
        let target = parse("for=https://10.0.0.1;99999, by=not-a-real-plugin").unwrap();
        assert_eq!(target.family, None);
    }

    #[test]
    fn missing_by_directive_is_none() {
        assert!(parse("for=https://10.0.0.1;12345").is_none());
    }
}
