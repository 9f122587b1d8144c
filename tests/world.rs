//! The embedding surface: everything a session layer needs to stand up a
//! world must be reachable from outside the crate.

use endless::world::tile::KeyTable;
use endless::{Limits, ServerConfig, WorldState};

#[test]
fn world_is_constructible_from_outside_the_crate() {
    let limits = Limits::default();
    let world = WorldState::new(limits, KeyTable::default());
    assert_eq!(world.map_count(), 0);
    assert_eq!(world.limits(), limits);
}

#[test]
fn config_limits_reachable_through_server_config() {
    let config = ServerConfig::default();
    let limits = config.limits();
    assert_eq!(limits.chest_slots, config.chest_slots);
    assert_eq!(limits.door_close_ms, config.door_close_ms);
}
