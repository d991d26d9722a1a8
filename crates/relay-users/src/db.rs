use std::collections::HashMap;

use relay_core::types::PermissionLevel;

use crate::types::{AuthKey, BARE_ID_PLATFORMS};

/// Parse one config section (e.g. `auth.admin_users`) into ledger bindings.
///
/// Entries take two shapes:
///   - `transport:id`  — binds exactly that (transport, user) pair.
///   - `id`            — a bare identifier, bound on every platform in
///     [`BARE_ID_PLATFORMS`].
pub fn parse_bindings(entries: &[String], level: PermissionLevel) -> HashMap<AuthKey, PermissionLevel> {
    let mut map = HashMap::new();
    for entry in entries {
        if let Some((transport, id)) = entry.split_once(':') {
            map.insert(AuthKey::new(transport, id), level);
        } else {
            for platform in BARE_ID_PLATFORMS {
                map.insert(AuthKey::new(*platform, entry.as_str()), level);
            }
        }
    }
    map
}

/// Build the full static binding table from the three configured lists,
/// admin entries taking precedence over operator, operator over trusted,
/// on key collision.
pub fn build_bindings(
    admin_users: &[String],
    operator_users: &[String],
    trusted_users: &[String],
) -> HashMap<AuthKey, PermissionLevel> {
    let mut map = parse_bindings(trusted_users, PermissionLevel::Trusted);
    map.extend(parse_bindings(operator_users, PermissionLevel::Operator));
    map.extend(parse_bindings(admin_users, PermissionLevel::Admin));
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_id_binds_every_platform() {
        let map = parse_bindings(&["alice".to_string()], PermissionLevel::Admin);
        assert_eq!(map.get(&AuthKey::new("discord", "alice")), Some(&PermissionLevel::Admin));
        assert_eq!(map.get(&AuthKey::new("signal", "alice")), Some(&PermissionLevel::Admin));
    }

    #[test]
    fn explicit_transport_binds_only_that_transport() {
        let map = parse_bindings(&["discord:bob".to_string()], PermissionLevel::Operator);
        assert_eq!(map.get(&AuthKey::new("discord", "bob")), Some(&PermissionLevel::Operator));
        assert_eq!(map.get(&AuthKey::new("signal", "bob")), None);
    }

    #[test]
    fn admin_overrides_lower_bindings_for_same_key() {
        let map = build_bindings(
            &["discord:carol".to_string()],
            &["discord:carol".to_string()],
            &["discord:carol".to_string()],
        );
        assert_eq!(map.get(&AuthKey::new("discord", "carol")), Some(&PermissionLevel::Admin));
    }
}
