pub mod chest;
pub mod cron;
pub mod map;
pub mod map_file;
pub mod npc;
pub mod position;
pub mod state;
pub mod tile;
pub mod walk;
