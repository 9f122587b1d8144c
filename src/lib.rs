mod assets;
pub mod config;
pub mod entities;
pub mod net;
pub mod telemetry;
pub mod world;

pub use config::{Limits, ServerConfig};
pub use net::packet::{
    decode_number, encode_number, Packet, PacketAction, PacketBuilder, PacketFamily, PacketReader,
};
pub use world::map::{Map, MapItem};
pub use world::state::{now_ms, WorldState, CHEST_RESPAWN_INTERVAL_MS};
pub use world::walk::WalkResult;

pub fn run(args: &[String]) -> Result<(), String> {
    let app = config::AppConfig::from_args(args)?;
    telemetry::logging::init(&app.root)?;
    let server = config::ServerConfig::load(&app.root)?;
    let map_dir = server.map_dir(&app.root);
    let summary = assets::scan(&map_dir)?;

    let mut world = world::state::WorldState::new(
        server.limits(),
        world::tile::KeyTable::default(),
    );
    let now = world::state::now_ms();
    let loaded = world.load(&map_dir, now)?;

    println!("endless: world load");
    println!("- root: {}", app.root.display());
    println!("- map files: {}", summary.map_files);
    println!("- maps online: {}", loaded);
    println!("- {}", world.summary());
    Ok(())
}
