//! Memory layout constants for Isaac: Rebirth data structures
//!
//! Every value here is tied to one build of the 32-bit `isaac-ng.exe`.
//! Pointers inside the game are 4 bytes wide. The compiled-in defaults can be
//! overridden with a JSON file when the game is patched.
//!
//! # Structure Overview
//!
//! ```text
//! [manager_slot] ──► PlayerManager
//!                      +0x0000  current floor (i32)
//!                      +curse_flags
//!                      +player_list ──► [begin, end)  Player* vector
//!                      +floor_flags       (read as u8 AND as u32)
//!                      +room_index ──┐
//!                      +room_table + room_index * 4 ──► current room id
//!                      +boss_room         boss room id
//!                      +boss_fight ──► BossFight
//!                                         +took_red_damage (u8)
//!                      +deal_prev_floor   floor of last devil door (0 = never)
//!
//! *begin ──► Player
//!              +speed / +range / +tears_delay / +shot_speed / +damage / +luck
//!              +collectibles + item_id * 4   owned count per collectible
//!              +active_item                  active item id
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Width of a pointer in the 32-bit game image
pub const POINTER_SIZE: u64 = 4;

/// Offsets inside the Player structure
pub mod player {
    pub const SPEED: u64 = 0xCB4;
    /// Stored negated
    pub const RANGE: u64 = 0xBF4;
    pub const TEARS_DELAY: u64 = 0xBE0;
    pub const SHOT_SPEED: u64 = 0xBE4;
    pub const DAMAGE: u64 = 0xBF0;
    pub const LUCK: u64 = 0xCB8;
    pub const ACTIVE_ITEM: u64 = 0xCF4;
    /// Start of the per-collectible owned-count array (u32 per item id)
    pub const COLLECTIBLES: u64 = 0xDA4;
}

/// Offsets inside the PlayerManager structure
pub mod manager {
    pub const FLOOR: u64 = 0x0;
    pub const CURSE_FLAGS: u64 = 0xC;
    pub const ROOM_INDEX: u64 = 0x5AC0;
    pub const ROOM_TABLE: u64 = 0x5AC4;
    pub const BOSS_ROOM: u64 = 0x5A5C;
    pub const BOSS_FIGHT: u64 = 0x5A74;
    pub const FLOOR_FLAGS: u64 = 0x5CA0;
    pub const DEAL_PREV_FLOOR: u64 = 0x1B0B8;
}

/// Offsets inside the BossFight structure
pub mod boss_fight {
    pub const TOOK_RED_DAMAGE: u64 = 0xE8C;
}

/// Collectible identifiers
pub mod item {
    pub const BOOK_OF_BELIAL: u32 = 34;
    pub const PENTAGRAM: u32 = 51;
    pub const BOOK_OF_REVELATIONS: u32 = 78;
    pub const GOAT_HEAD: u32 = 215;
    pub const BLACK_CANDLE: u32 = 260;
}

/// Curse flag value for Curse of the Labyrinth
pub const LABYRINTH_CURSE: i32 = 0x2;

/// Bit positions inside the floor flags field
pub mod floor_flag {
    /// Checked through the byte-wide read
    pub const BEGGAR_KILLED: u32 = 0;
    /// Checked through the word-wide read
    pub const RED_HEART_DAMAGE: u32 = 2;
    /// Checked through the word-wide read
    pub const SHOPKEEPER_BOMBED: u32 = 6;
}

/// Complete, overridable description of the game's memory layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameLayout {
    pub version: String,

    pub player_speed: u64,
    pub player_range: u64,
    pub player_tears_delay: u64,
    pub player_shot_speed: u64,
    pub player_damage: u64,
    pub player_luck: u64,
    pub player_active_item: u64,
    pub player_collectibles: u64,

    pub manager_floor: u64,
    pub manager_curse_flags: u64,
    pub manager_room_index: u64,
    pub manager_room_table: u64,
    pub manager_boss_room: u64,
    pub manager_boss_fight: u64,
    pub manager_floor_flags: u64,
    pub manager_deal_prev_floor: u64,

    pub boss_fight_took_red_damage: u64,

    pub labyrinth_curse: i32,
    pub flag_beggar_killed: u32,
    pub flag_red_heart_damage: u32,
    pub flag_shopkeeper_bombed: u32,

    pub item_goat_head: u32,
    pub item_pentagram: u32,
    pub item_black_candle: u32,
    pub item_book_of_revelations: u32,
    pub item_book_of_belial: u32,
}

impl Default for GameLayout {
    fn default() -> Self {
        Self {
            version: "rebirth-1.05".to_string(),

            player_speed: player::SPEED,
            player_range: player::RANGE,
            player_tears_delay: player::TEARS_DELAY,
            player_shot_speed: player::SHOT_SPEED,
            player_damage: player::DAMAGE,
            player_luck: player::LUCK,
            player_active_item: player::ACTIVE_ITEM,
            player_collectibles: player::COLLECTIBLES,

            manager_floor: manager::FLOOR,
            manager_curse_flags: manager::CURSE_FLAGS,
            manager_room_index: manager::ROOM_INDEX,
            manager_room_table: manager::ROOM_TABLE,
            manager_boss_room: manager::BOSS_ROOM,
            manager_boss_fight: manager::BOSS_FIGHT,
            manager_floor_flags: manager::FLOOR_FLAGS,
            manager_deal_prev_floor: manager::DEAL_PREV_FLOOR,

            boss_fight_took_red_damage: boss_fight::TOOK_RED_DAMAGE,

            labyrinth_curse: LABYRINTH_CURSE,
            flag_beggar_killed: floor_flag::BEGGAR_KILLED,
            flag_red_heart_damage: floor_flag::RED_HEART_DAMAGE,
            flag_shopkeeper_bombed: floor_flag::SHOPKEEPER_BOMBED,

            item_goat_head: item::GOAT_HEAD,
            item_pentagram: item::PENTAGRAM,
            item_black_candle: item::BLACK_CANDLE,
            item_book_of_revelations: item::BOOK_OF_REVELATIONS,
            item_book_of_belial: item::BOOK_OF_BELIAL,
        }
    }
}

impl GameLayout {
    /// Offset of the owned-count slot for a collectible inside the Player structure
    pub fn collectible_offset(&self, item_id: u32) -> u64 {
        self.player_collectibles + item_id as u64 * 4
    }
}

pub fn load_layout<P: AsRef<Path>>(path: P) -> Result<GameLayout> {
    let content = fs::read_to_string(&path)?;
    let data = serde_json::from_str(&content)?;
    Ok(data)
}

pub fn save_layout<P: AsRef<Path>>(path: P, layout: &GameLayout) -> Result<()> {
    let content = serde_json::to_string_pretty(layout)?;
    fs::write(path, content)?;
    Ok(())
}
