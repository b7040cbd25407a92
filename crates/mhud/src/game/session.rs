use std::cell::OnceCell;
use std::fmt;
use std::time::Duration;

use strum::IntoEnumIterator;
use tracing::trace;

use crate::game::{
    ChanceInputs, PlayerStat, PointerChainResolver, ProbabilityModel, ProbabilityState, StatKind,
    StatTracker,
};
use crate::memory::ReadMemory;

/// One HUD line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatReading {
    pub stat: PlayerStat,
    pub value: f32,
    /// Zero unless the stat changed within the tracker window
    pub recent_delta: f32,
}

impl StatReading {
    pub fn value_text(&self) -> String {
        match self.stat.kind() {
            StatKind::Float => format!("{:.2}", self.value),
            StatKind::Int => format!("{}", self.value as i32),
            StatKind::Derived => format!("{:.1}%", self.value * 100.0),
        }
    }

    pub fn delta_text(&self) -> Option<String> {
        if self.recent_delta == 0.0 {
            return None;
        }
        Some(match self.stat.kind() {
            StatKind::Float => format!("{:+.2}", self.recent_delta),
            StatKind::Int => format!("{:+}", self.recent_delta as i32),
            StatKind::Derived => format!("{:+.1}%", self.recent_delta * 100.0),
        })
    }

    /// Whether the recent change made the player stronger
    pub fn is_improvement(&self) -> bool {
        if self.stat.lower_is_better() {
            self.recent_delta < 0.0
        } else {
            self.recent_delta > 0.0
        }
    }
}

impl fmt::Display for StatReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stat, self.value_text())?;
        if let Some(delta) = self.delta_text() {
            write!(f, " ({})", delta)?;
        }
        Ok(())
    }
}

/// Everything the presenter draws for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HudSnapshot {
    pub run_active: bool,
    /// Empty while no run is active
    pub readings: Vec<StatReading>,
}

impl HudSnapshot {
    pub fn reading(&self, stat: PlayerStat) -> Option<&StatReading> {
        self.readings.iter().find(|r| r.stat == stat)
    }

    pub fn lines(&self) -> Vec<String> {
        self.readings.iter().map(|r| r.to_string()).collect()
    }
}

/// Reads HUD stats from the game and remembers their recent changes.
pub struct GameReader<R: ReadMemory> {
    resolver: PointerChainResolver<R>,
    tracker: StatTracker<PlayerStat>,
    model: ProbabilityModel,
    state: ProbabilityState,
}

impl<R: ReadMemory> GameReader<R> {
    pub fn new(resolver: PointerChainResolver<R>, stat_window: Duration) -> Self {
        let model = ProbabilityModel::new(resolver.layout());
        Self {
            resolver,
            tracker: StatTracker::with_window(stat_window),
            model,
            state: ProbabilityState::default(),
        }
    }

    pub fn resolver(&self) -> &PointerChainResolver<R> {
        &self.resolver
    }

    pub fn tracker(&self) -> &StatTracker<PlayerStat> {
        &self.tracker
    }

    pub fn probability_state(&self) -> ProbabilityState {
        self.state
    }

    pub fn is_run_active(&self) -> bool {
        self.resolver.is_run_active()
    }

    fn stat_offset(&self, stat: PlayerStat) -> Option<u64> {
        let layout = self.resolver.layout();
        match stat {
            PlayerStat::Speed => Some(layout.player_speed),
            PlayerStat::Range => Some(layout.player_range),
            PlayerStat::TearsDelay => Some(layout.player_tears_delay),
            PlayerStat::ShotSpeed => Some(layout.player_shot_speed),
            PlayerStat::Damage => Some(layout.player_damage),
            PlayerStat::Luck => Some(layout.player_luck),
            PlayerStat::DealWithDevil => None,
        }
    }

    /// Read a float stat and record it. Returns 0.0 without recording when
    /// there is no player.
    pub fn player_stat_f(&mut self, stat: PlayerStat) -> f32 {
        if stat == PlayerStat::DealWithDevil {
            return self.deal_with_devil_chance();
        }

        let Some(player) = self.resolver.resolve_current_player() else {
            return 0.0;
        };
        let Some(offset) = self.stat_offset(stat) else {
            return 0.0;
        };
        let Some(mut value) = self.resolver.read_f32(player + offset) else {
            return 0.0;
        };

        // Range is stored negated
        if stat == PlayerStat::Range {
            value = -value;
        }

        self.tracker.update(stat, value);
        value
    }

    /// Read an integer stat and record it.
    pub fn player_stat_i(&mut self, stat: PlayerStat) -> i32 {
        let Some(player) = self.resolver.resolve_current_player() else {
            return 0;
        };
        let Some(offset) = self.stat_offset(stat) else {
            return 0;
        };
        let Some(value) = self.resolver.read_i32(player + offset) else {
            return 0;
        };

        self.tracker.update(stat, value as f32);
        value
    }

    /// Current chance of a devil door, recorded like any other stat.
    pub fn deal_with_devil_chance(&mut self) -> f32 {
        let chance = match self.resolver.resolve_manager_instance() {
            Some(manager) => {
                let inputs = LiveChanceInputs::new(&self.resolver, manager);
                self.model
                    .compute_rare_event_chance(&inputs, &mut self.state)
            }
            None => 0.0,
        };

        self.tracker.update(PlayerStat::DealWithDevil, chance);
        chance
    }

    pub fn recent_delta_f(&self, stat: PlayerStat) -> f32 {
        self.tracker.recent_delta_f32(stat)
    }

    pub fn recent_delta_i(&self, stat: PlayerStat) -> i32 {
        self.tracker.recent_delta_i32(stat)
    }

    pub fn read_stat(&mut self, stat: PlayerStat) -> StatReading {
        let (value, recent_delta) = match stat.kind() {
            StatKind::Int => {
                let value = self.player_stat_i(stat) as f32;
                (value, self.recent_delta_i(stat) as f32)
            }
            StatKind::Float | StatKind::Derived => {
                let value = self.player_stat_f(stat);
                (value, self.recent_delta_f(stat))
            }
        };

        StatReading {
            stat,
            value,
            recent_delta,
        }
    }

    pub fn snapshot(&mut self) -> HudSnapshot {
        if !self.is_run_active() {
            trace!("No active run");
            return HudSnapshot::default();
        }

        HudSnapshot {
            run_active: true,
            readings: PlayerStat::iter().map(|stat| self.read_stat(stat)).collect(),
        }
    }
}

/// Adapts the pointer chains to the probability model. Anything unreachable
/// reads as zero.
struct LiveChanceInputs<'a, R: ReadMemory> {
    resolver: &'a PointerChainResolver<R>,
    manager: u64,
    player: OnceCell<Option<u64>>,
}

impl<'a, R: ReadMemory> LiveChanceInputs<'a, R> {
    fn new(resolver: &'a PointerChainResolver<R>, manager: u64) -> Self {
        Self {
            resolver,
            manager,
            player: OnceCell::new(),
        }
    }

    fn player(&self) -> Option<u64> {
        *self
            .player
            .get_or_init(|| self.resolver.resolve_current_player())
    }

    fn manager_u32(&self, offset: u64) -> u32 {
        self.resolver.read_u32(self.manager + offset).unwrap_or(0)
    }

    fn player_u32(&self, offset: u64) -> u32 {
        self.player()
            .and_then(|player| self.resolver.read_u32(player + offset))
            .unwrap_or(0)
    }
}

impl<R: ReadMemory> ChanceInputs for LiveChanceInputs<'_, R> {
    fn floor(&self) -> i32 {
        self.manager_u32(self.resolver.layout().manager_floor) as i32
    }

    fn curse_flags(&self) -> i32 {
        self.manager_u32(self.resolver.layout().manager_curse_flags) as i32
    }

    fn item_count(&self, item_id: u32) -> u32 {
        self.player_u32(self.resolver.layout().collectible_offset(item_id))
    }

    fn active_item(&self) -> u32 {
        self.player_u32(self.resolver.layout().player_active_item)
    }

    fn floor_flags_byte(&self) -> u8 {
        self.resolver
            .read_u8(self.manager + self.resolver.layout().manager_floor_flags)
            .unwrap_or(0)
    }

    fn floor_flags_word(&self) -> u32 {
        self.manager_u32(self.resolver.layout().manager_floor_flags)
    }

    fn current_room(&self) -> u32 {
        self.resolver.resolve_current_room().unwrap_or(0)
    }

    fn boss_room(&self) -> u32 {
        self.manager_u32(self.resolver.layout().manager_boss_room)
    }

    fn boss_took_red_damage(&self) -> u8 {
        self.resolver
            .resolve_boss_fight()
            .and_then(|fight| {
                self.resolver
                    .read_u8(fight + self.resolver.layout().boss_fight_took_red_damage)
            })
            .unwrap_or(0)
    }

    fn deal_prev_floor(&self) -> u32 {
        self.manager_u32(self.resolver.layout().manager_deal_prev_floor)
    }
}
