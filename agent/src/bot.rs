//! Input policy of the headless bot.

use blobber_core::WorldState;
use blobber_env::{Movement, PlayerId, PlayerInput};
use rand::rngs::StdRng;
use rand::Rng;

/// Ticks spent running straight after dropping a bomb.
const FLEE_TICKS: u32 = 30;

/// Wanders in straight runs and drops bombs now and then.
pub struct Bot {
    player: PlayerId,
    rng: StdRng,
    bomb_rate: f64,
    heading: Movement,
    /// Ticks left on the current heading
    hold: u32,
}

impl Bot {
    pub fn new(player: PlayerId, rng: StdRng, bomb_rate: f64) -> Self {
        Self {
            player,
            rng,
            bomb_rate: bomb_rate.clamp(0.0, 1.0),
            heading: Movement::default(),
            hold: 0,
        }
    }

    /// Follows an identity change announced by the relay.
    pub fn set_player(&mut self, player: PlayerId) {
        self.player = player;
    }

    /// Picks the input for the tick after the one `world` just applied.
    ///
    /// Returns `None` once the game is over; a fresh session starts the bot
    /// again.
    pub fn decide(&mut self, world: &WorldState) -> Option<PlayerInput> {
        if world.game_over {
            return None;
        }
        if self.hold == 0 {
            self.heading = self.random_heading();
            self.hold = self.rng.gen_range(5..20);
        }
        self.hold -= 1;

        let can_bomb = world
            .players
            .get(&self.player)
            .map_or(false, |p| p.bombs_placed < p.max_bombs);
        let place_bomb = can_bomb && self.rng.gen_bool(self.bomb_rate);
        if place_bomb {
            self.heading = self.random_heading();
            self.hold = FLEE_TICKS;
        }

        Some(PlayerInput {
            movement: Some(self.heading),
            place_bomb,
            ..PlayerInput::idle(self.player.clone())
        })
    }

    fn random_heading(&mut self) -> Movement {
        loop {
            let (dx, dy): (i32, i32) = (self.rng.gen_range(-1..=1), self.rng.gen_range(-1..=1));
            if (dx, dy) != (0, 0) {
                return Movement {
                    up: dy < 0,
                    down: dy > 0,
                    left: dx < 0,
                    right: dx > 0,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobber_core::EngineConfig;
    use blobber_env::TickRecord;
    use rand::SeedableRng;

    fn bot(bomb_rate: f64) -> Bot {
        Bot::new(PlayerId::new("bot"), StdRng::seed_from_u64(9), bomb_rate)
    }

    #[test]
    fn test_always_moves_while_playing() {
        let world = WorldState::new(EngineConfig::default());
        let mut bot = bot(0.0);
        for _ in 0..100 {
            let input = bot.decide(&world).unwrap();
            assert_eq!(input.player_id, PlayerId::new("bot"));
            assert_ne!(input.axes(), (0, 0));
            assert!(!input.place_bomb);
        }
    }

    #[test]
    fn test_respects_bomb_limit() {
        let mut world = WorldState::new(EngineConfig::default().with_size(15, 15));
        let _ = world.apply_tick(&TickRecord::new(0, vec![PlayerInput::idle(PlayerId::new("bot"))]));
        let mut bot = bot(1.0);

        assert!(bot.decide(&world).unwrap().place_bomb);
        if let Some(player) = world.players.get_mut(&PlayerId::new("bot")) {
            player.bombs_placed = player.max_bombs;
        }
        assert!(!bot.decide(&world).unwrap().place_bomb);
    }

    #[test]
    fn test_idle_after_game_over() {
        let mut world = WorldState::new(EngineConfig::default().with_max_ticks(0));
        let _ = world.apply_tick(&TickRecord::empty(0));
        assert!(world.game_over);
        assert!(bot(0.5).decide(&world).is_none());
    }
}
