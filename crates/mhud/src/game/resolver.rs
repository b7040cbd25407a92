//! Pointer chains from the static PlayerManager slot to live game structures.
//!
//! Nothing here is cached: the game frees and reallocates its run state when
//! a run ends, so every accessor walks the chain again from the root slot.
//! `None` means "no data available" (no run in progress, player not spawned
//! yet, ...) and is a normal condition.

use crate::memory::{GameLayout, ReadMemory, layout::POINTER_SIZE};
use crate::offset::ResolvedOffsets;

pub struct PointerChainResolver<R: ReadMemory> {
    reader: R,
    offsets: ResolvedOffsets,
    layout: GameLayout,
}

impl<R: ReadMemory> PointerChainResolver<R> {
    pub fn new(reader: R, offsets: ResolvedOffsets, layout: GameLayout) -> Self {
        Self {
            reader,
            offsets,
            layout,
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn offsets(&self) -> &ResolvedOffsets {
        &self.offsets
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    pub fn read_u8(&self, address: u64) -> Option<u8> {
        if address == 0 {
            return None;
        }
        self.reader.read_u8(address).ok()
    }

    pub fn read_u32(&self, address: u64) -> Option<u32> {
        if address == 0 {
            return None;
        }
        self.reader.read_u32(address).ok()
    }

    pub fn read_i32(&self, address: u64) -> Option<i32> {
        if address == 0 {
            return None;
        }
        self.reader.read_i32(address).ok()
    }

    pub fn read_f32(&self, address: u64) -> Option<f32> {
        if address == 0 {
            return None;
        }
        self.reader.read_f32(address).ok()
    }

    /// Dereference a 32-bit pointer, treating null as absent
    pub fn read_ptr(&self, address: u64) -> Option<u64> {
        self.read_u32(address)
            .filter(|&ptr| ptr != 0)
            .map(|ptr| ptr as u64)
    }

    /// PlayerManager instance; absent until the game creates it
    pub fn resolve_manager_instance(&self) -> Option<u64> {
        self.read_ptr(self.offsets.manager_slot)
    }

    /// Address of the player list (a `[begin, end)` pointer pair) inside the
    /// manager instance.
    pub fn resolve_player_list(&self) -> Option<u64> {
        if self.offsets.player_list_offset == 0 {
            return None;
        }
        let manager = self.resolve_manager_instance()?;
        Some(manager + self.offsets.player_list_offset as u64)
    }

    /// First player in the list
    pub fn resolve_current_player(&self) -> Option<u64> {
        let list = self.resolve_player_list()?;
        let begin = self.read_ptr(list)?;
        self.read_ptr(begin)
    }

    /// Id of the room the player is standing in
    pub fn resolve_current_room(&self) -> Option<u32> {
        let manager = self.resolve_manager_instance()?;
        let index = self.read_u32(manager + self.layout.manager_room_index)?;
        self.read_u32(manager + self.layout.manager_room_table + index as u64 * POINTER_SIZE)
    }

    /// Id of the current floor's boss room
    pub fn resolve_boss_room(&self) -> Option<u32> {
        let manager = self.resolve_manager_instance()?;
        self.read_u32(manager + self.layout.manager_boss_room)
    }

    /// Boss fight record of the current floor
    pub fn resolve_boss_fight(&self) -> Option<u64> {
        let manager = self.resolve_manager_instance()?;
        self.read_ptr(manager + self.layout.manager_boss_fight)
    }

    /// Number of players in the list, `None` when the list is unreachable
    pub fn player_count(&self) -> Option<i64> {
        let list = self.resolve_player_list()?;
        let begin = self.read_u32(list)? as i64;
        let end = self.read_u32(list + POINTER_SIZE)? as i64;
        Some((end - begin) / POINTER_SIZE as i64)
    }

    /// A run is active while the game holds at least one player.
    pub fn is_run_active(&self) -> bool {
        self.player_count().is_some_and(|count| count > 0)
    }
}
