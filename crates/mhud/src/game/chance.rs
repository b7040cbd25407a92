//! Deal with the Devil chance.
//!
//! Mirrors how the game rolls for a devil door after the boss of a floor is
//! beaten. Each input is read lazily so that ineligible floors cost one or
//! two reads.

use crate::memory::GameLayout;

/// Live values the model draws from. Missing data (no run, no player) must
/// already be resolved to zero by the implementor.
pub trait ChanceInputs {
    /// Floor number as stored by the game (1-based, labyrinth not applied)
    fn floor(&self) -> i32;
    fn curse_flags(&self) -> i32;
    /// Owned count of a passive collectible
    fn item_count(&self, item_id: u32) -> u32;
    fn active_item(&self) -> u32;
    /// Floor flags read one byte wide
    fn floor_flags_byte(&self) -> u8;
    /// Floor flags read four bytes wide, from the same address as the byte
    fn floor_flags_word(&self) -> u32;
    fn current_room(&self) -> u32;
    fn boss_room(&self) -> u32;
    /// Red-damage marker of the floor's boss fight record
    fn boss_took_red_damage(&self) -> u8;
    /// Floor on which a devil door was last seen, 0 if never
    fn deal_prev_floor(&self) -> u32;
}

/// State carried between evaluations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbabilityState {
    pub boss_fight_took_damage: bool,
    /// Last evaluated floor, labyrinth applied
    pub last_floor: i32,
}

const BASE_CHANCE: f32 = 0.01;
const PENTAGRAM_BONUS: f32 = 0.20;
const EXTRA_PENTAGRAM_BONUS: f32 = 0.10;
const BLACK_CANDLE_BONUS: f32 = 0.30;
const BOOK_OF_REVELATIONS_BONUS: f32 = 0.35;
const BOOK_OF_BELIAL_BONUS: f32 = 25.00;
const BEGGAR_KILLED_BONUS: f32 = 0.35;
const NO_RED_HEART_DAMAGE_BONUS: f32 = 0.99;
const SHOPKEEPER_BOMBED_BONUS: f32 = 0.10;
const NO_BOSS_DAMAGE_BONUS: f32 = 0.35;

const LAST_ELIGIBLE_FLOOR: i32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbabilityModel {
    labyrinth_curse: i32,
    goat_head: u32,
    pentagram: u32,
    black_candle: u32,
    book_of_revelations: u32,
    book_of_belial: u32,
    beggar_killed_bit: u32,
    red_heart_damage_bit: u32,
    shopkeeper_bombed_bit: u32,
}

impl ProbabilityModel {
    pub fn new(layout: &GameLayout) -> Self {
        Self {
            labyrinth_curse: layout.labyrinth_curse,
            goat_head: layout.item_goat_head,
            pentagram: layout.item_pentagram,
            black_candle: layout.item_black_candle,
            book_of_revelations: layout.item_book_of_revelations,
            book_of_belial: layout.item_book_of_belial,
            beggar_killed_bit: layout.flag_beggar_killed,
            red_heart_damage_bit: layout.flag_red_heart_damage,
            shopkeeper_bombed_bit: layout.flag_shopkeeper_bombed,
        }
    }

    pub fn compute_rare_event_chance<I: ChanceInputs + ?Sized>(
        &self,
        inputs: &I,
        state: &mut ProbabilityState,
    ) -> f32 {
        let raw_floor = inputs.floor();
        let mut floor = raw_floor;
        if inputs.curse_flags() == self.labyrinth_curse {
            floor = floor.wrapping_add(1);
        }
        state.last_floor = floor;

        // No natural devil door on the first floor or past the Womb, even
        // with Goat Head
        if floor == 1 || floor > LAST_ELIGIBLE_FLOOR {
            return 0.0;
        }

        if inputs.item_count(self.goat_head) != 0 {
            return 1.0;
        }

        let mut chance = BASE_CHANCE;

        let pentagrams = inputs.item_count(self.pentagram);
        if pentagrams != 0 {
            chance += PENTAGRAM_BONUS;
        }
        if pentagrams > 1 {
            chance += EXTRA_PENTAGRAM_BONUS;
        }
        if inputs.item_count(self.black_candle) != 0 {
            chance += BLACK_CANDLE_BONUS;
        }

        let active = inputs.active_item();
        if active == self.book_of_revelations {
            chance += BOOK_OF_REVELATIONS_BONUS;
        } else if active == self.book_of_belial {
            chance += BOOK_OF_BELIAL_BONUS;
        }

        // The byte and the word overlap in memory; both reads are kept
        if bit_set(inputs.floor_flags_byte() as u32, self.beggar_killed_bit) {
            chance += BEGGAR_KILLED_BONUS;
        }
        let floor_flags = inputs.floor_flags_word();
        if !bit_set(floor_flags, self.red_heart_damage_bit) {
            chance += NO_RED_HEART_DAMAGE_BONUS;
        }
        if bit_set(floor_flags, self.shopkeeper_bombed_bit) {
            chance += SHOPKEEPER_BOMBED_BONUS;
        }

        // The first roll after the boss honours boss damage. Later rolls that
        // keep the door open always get the bonus, so the flag is dropped as
        // soon as the player is seen outside the boss room.
        if inputs.current_room() == inputs.boss_room() {
            if inputs.boss_took_red_damage() == 1 {
                state.boss_fight_took_damage = true;
            }
        } else if state.boss_fight_took_damage {
            state.boss_fight_took_damage = false;
        }
        if !state.boss_fight_took_damage {
            chance += NO_BOSS_DAMAGE_BONUS;
        }

        let prev_floor = inputs.deal_prev_floor();
        if prev_floor > 0 {
            // The game measures this with the floor before the labyrinth bump.
            // Both values come straight from memory, so stale reads must wrap.
            let floors_ago = raw_floor.wrapping_sub(prev_floor as i32);
            if floors_ago < 2 {
                chance *= 0.25;
            } else if floors_ago == 2 {
                chance *= 0.5;
            }
        }

        chance.min(1.0)
    }
}

impl Default for ProbabilityModel {
    fn default() -> Self {
        Self::new(&GameLayout::default())
    }
}

fn bit_set(value: u32, bit: u32) -> bool {
    (value >> bit) & 1 != 0
}
