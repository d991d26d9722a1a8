use relay_core::types::PermissionLevel;

/// Pure level comparison — kept as a named helper so call sites read as
/// intent ("requires at least operator") rather than a bare `>=`.
pub fn satisfies(level: PermissionLevel, required: PermissionLevel) -> bool {
    level >= required
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_order_holds() {
        assert!(PermissionLevel::Admin > PermissionLevel::Operator);
        assert!(PermissionLevel::Operator > PermissionLevel::Trusted);
        assert!(PermissionLevel::Trusted > PermissionLevel::Public);
    }

    #[test]
    fn satisfies_is_reflexive() {
        assert!(satisfies(PermissionLevel::Trusted, PermissionLevel::Trusted));
        assert!(!satisfies(PermissionLevel::Trusted, PermissionLevel::Operator));
    }
}
