//! The deterministic state transition.
//!
//! ```text
//! advance(state, tick N) -> state'
//!
//!   1. game over check        (tick >= max_ticks)
//!   2. bomb fuses             (detonate, break walls, reveal power-ups)
//!   3. chain reactions + hits (same tick as the detonation)
//!   4. paint active explosions
//!   5. player intents         (spawn, move, place bombs)   skipped once over
//!   6. power-up pickup
//! ```
//!
//! Nothing here reads the clock, touches I/O or uses a global generator.
//! Bad input is logged and skipped; it never panics.

use crate::bomb::{detonate, Bomb, Explosion};
use crate::collision::footprint_clear;
use crate::config::{EngineConfig, PLAYER_RADIUS, POWERUP_IMMUNITY_TICKS};
use crate::grid::{CellContent, CellPos, Grid, PlayerIndex};
use crate::player::PlayerState;
use crate::powerup::{spawn_check, PowerUp, PowerUpKind};
use crate::rng::SeededRng;
use crate::spawn::{find_spawn, SpawnTier};
use blobber_env::{Direction, PlayerId, PlayerInput, TickRecord};
use nalgebra::Vector2;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::f64::consts::FRAC_1_SQRT_2;
use tracing::{debug, info, warn};

/// Something notable that happened during a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WorldEvent {
    PlayerJoined {
        player: PlayerId,
        position: Vector2<f64>,
        tier: SpawnTier,
    },
    BombPlaced {
        player: PlayerId,
        cell: CellPos,
    },
    BombDetonated {
        owner: PlayerId,
        cell: CellPos,
        chained: bool,
    },
    WallBroken {
        cell: CellPos,
    },
    PowerUpSpawned {
        kind: PowerUpKind,
        cell: CellPos,
    },
    PlayerHit {
        player: PlayerId,
        by: PlayerId,
        tiles_lost: u32,
    },
    PlayerJumped {
        player: PlayerId,
        to: CellPos,
    },
    PowerUpCollected {
        player: PlayerId,
        kind: PowerUpKind,
    },
    PowerUpDestroyed {
        kind: PowerUpKind,
        cell: CellPos,
    },
    GameOver {
        winner: Option<PlayerId>,
    },
}

/// Result of feeding one tick record to the engine.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum TickOutcome {
    Applied(Vec<WorldEvent>),
    /// The record was not newer than the current tick; nothing changed.
    Stale { tick: u64, current: u64 },
}

impl TickOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TickOutcome::Applied(_))
    }

    /// Events of an applied tick; empty for a stale one.
    pub fn into_events(self) -> Vec<WorldEvent> {
        match self {
            TickOutcome::Applied(events) => events,
            TickOutcome::Stale { .. } => Vec::new(),
        }
    }
}

/// Everything a client knows about the world.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldState {
    pub config: EngineConfig,
    pub grid: Grid,
    /// Player ids by join order; `PlayerIndex` points in here
    pub roster: Vec<PlayerId>,
    pub players: BTreeMap<PlayerId, PlayerState>,
    pub bombs: Vec<Bomb>,
    pub explosions: Vec<Explosion>,
    pub power_ups: Vec<PowerUp>,
    pub painted_counts: BTreeMap<PlayerId, u32>,
    /// Last applied tick; `None` until the first record arrives
    pub current_tick: Option<u64>,
    pub max_ticks: u64,
    pub tick_interval_ms: u64,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
    /// Seeded lazily on the first tick, together with the grid
    #[serde(skip)]
    rng: Option<SeededRng>,
}

/// Pure form of [`WorldState::apply_tick`]: the input state is untouched.
pub fn advance(state: &WorldState, record: &TickRecord) -> WorldState {
    let mut next = state.clone();
    let _ = next.apply_tick(record);
    next
}

impl WorldState {
    /// Creates a world that will be generated on its first tick.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            grid: Grid::empty(config.width, config.height),
            roster: Vec::new(),
            players: BTreeMap::new(),
            bombs: Vec::new(),
            explosions: Vec::new(),
            power_ups: Vec::new(),
            painted_counts: BTreeMap::new(),
            current_tick: None,
            max_ticks: config.max_ticks,
            tick_interval_ms: config.tick_interval_ms,
            game_over: false,
            winner: None,
            rng: None,
            config,
        }
    }

    /// Creates a world over a hand-built grid (scenario tests).
    ///
    /// The PRNG is still seeded from the config, but no walls are generated.
    pub fn with_grid(config: EngineConfig, grid: Grid) -> Self {
        let mut state = Self::new(config);
        state.grid = grid;
        state.rng = Some(SeededRng::new(state.config.seed));
        state
    }

    /// True once the grid has been generated.
    pub fn is_initialized(&self) -> bool {
        self.rng.is_some()
    }

    /// Painted count of a player (0 for unknown ids).
    pub fn painted(&self, player: &PlayerId) -> u32 {
        self.painted_counts.get(player).copied().unwrap_or(0)
    }

    /// Serializes a snapshot for renderers.
    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Applies one tick record in place.
    pub fn apply_tick(&mut self, record: &TickRecord) -> TickOutcome {
        let tick = record.tick;
        if let Some(current) = self.current_tick {
            if tick <= current {
                warn!("Ignoring stale tick {} (current {})", tick, current);
                return TickOutcome::Stale { tick, current };
            }
            if tick > current + 1 {
                warn!("Tick gap: {} -> {}", current, tick);
            }
        }

        let mut rng = self.rng.take().unwrap_or_else(|| {
            let mut rng = SeededRng::new(self.config.seed);
            self.grid = Grid::generate(
                self.config.width,
                self.config.height,
                self.config.breakable_density,
                &mut rng,
            );
            debug!("Generated {}x{} grid (seed={})", self.config.width, self.config.height, self.config.seed);
            rng
        });

        self.current_tick = Some(tick);
        let mut events = Vec::new();

        self.check_game_over(tick, &mut events);
        self.resolve_bombs(tick, &mut events);
        self.paint_explosions(tick, &mut events);

        for player in self.players.values_mut() {
            player.expire_buffs(tick);
        }
        for input in &record.inputs {
            self.ensure_player(&input.player_id, &mut rng, &mut events);
            if !self.game_over {
                self.apply_intent(input, tick, &mut events);
            }
        }

        self.collect_power_ups(tick, &mut events);

        self.rng = Some(rng);
        TickOutcome::Applied(events)
    }

    fn check_game_over(&mut self, tick: u64, events: &mut Vec<WorldEvent>) {
        if self.game_over || tick < self.max_ticks {
            return;
        }
        self.game_over = true;
        self.winner = leader(&self.painted_counts);
        info!(
            "Game over at tick {}, winner: {}",
            tick,
            self.winner.as_ref().map_or("none", |w| w.as_str())
        );
        events.push(WorldEvent::GameOver {
            winner: self.winner.clone(),
        });
    }

    fn resolve_bombs(&mut self, tick: u64, events: &mut Vec<WorldEvent>) {
        let mut queued = vec![false; self.bombs.len()];
        let mut queue = VecDeque::new();
        for (i, bomb) in self.bombs.iter().enumerate() {
            if !bomb.exploded && bomb.fuse_elapsed(tick) {
                queued[i] = true;
                queue.push_back((i, false));
            }
        }

        while let Some((i, chained)) = queue.pop_front() {
            let owner = self.bombs[i].owner.clone();
            let center = self.bombs[i].cell();
            self.bombs[i].exploded = true;

            let radius = match self.players.get_mut(&owner) {
                Some(player) => {
                    player.bombs_placed = player.bombs_placed.saturating_sub(1);
                    player.explosion_radius
                }
                None => crate::config::DEFAULT_EXPLOSION_RADIUS,
            };

            let blast = detonate(&mut self.grid, owner.clone(), center, radius, tick);
            events.push(WorldEvent::BombDetonated {
                owner: owner.clone(),
                cell: center,
                chained,
            });
            for cell in blast.broken {
                events.push(WorldEvent::WallBroken { cell });
                if let Some(kind) = spawn_check(self.config.seed, cell) {
                    self.power_ups.push(PowerUp {
                        kind,
                        cell,
                        spawned_at: tick,
                    });
                    events.push(WorldEvent::PowerUpSpawned { kind, cell });
                }
            }

            let explosion = blast.explosion;
            for (j, other) in self.bombs.iter().enumerate() {
                if !other.exploded && !queued[j] && explosion.covers(other.cell()) {
                    queued[j] = true;
                    queue.push_back((j, true));
                }
            }
            self.hit_players(&explosion, tick, events);
            self.explosions.push(explosion);
        }

        self.bombs.retain(|bomb| !bomb.exploded);
    }

    fn hit_players(&mut self, explosion: &Explosion, tick: u64, events: &mut Vec<WorldEvent>) {
        let victims: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|(id, player)| {
                explosion.covers(player.cell()) && !player.shielded && self.painted(id) > 0
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in victims {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            let tiles_lost = self.grid.clear_paint(player.index);
            player.reset_stats();
            self.painted_counts.insert(id.clone(), 0);
            debug!("Tick {}: {} hit by {}, lost {} tiles", tick, id, explosion.owner, tiles_lost);
            events.push(WorldEvent::PlayerHit {
                player: id,
                by: explosion.owner.clone(),
                tiles_lost,
            });
        }
    }

    fn paint_explosions(&mut self, tick: u64, events: &mut Vec<WorldEvent>) {
        self.explosions.retain(|explosion| explosion.is_active(tick));

        for explosion in &self.explosions {
            let Some(owner) = self.players.get(&explosion.owner).map(|p| p.index) else {
                continue;
            };
            let cells = explosion.cells();
            for cell in &cells {
                let previous = self.grid.paint(*cell, owner);
                if previous == Some(owner) || self.grid.content(*cell) != CellContent::Empty {
                    continue;
                }
                if let Some(previous) = previous {
                    if let Some(count) = self
                        .roster
                        .get(previous.0 as usize)
                        .and_then(|id| self.painted_counts.get_mut(id))
                    {
                        *count = count.saturating_sub(1);
                    }
                }
                *self.painted_counts.entry(explosion.owner.clone()).or_insert(0) += 1;
            }

            self.power_ups.retain(|power_up| {
                let destroyed = cells.contains(&power_up.cell)
                    && tick.saturating_sub(power_up.spawned_at) >= POWERUP_IMMUNITY_TICKS;
                if destroyed {
                    events.push(WorldEvent::PowerUpDestroyed {
                        kind: power_up.kind,
                        cell: power_up.cell,
                    });
                }
                !destroyed
            });
        }
    }

    fn ensure_player(&mut self, id: &PlayerId, rng: &mut SeededRng, events: &mut Vec<WorldEvent>) {
        if self.players.contains_key(id) {
            return;
        }
        let Ok(slot) = u16::try_from(self.roster.len()) else {
            warn!("Player roster full, ignoring {}", id);
            return;
        };
        let occupied: Vec<Vector2<f64>> = self.players.values().map(|p| p.position).collect();
        let (position, tier) = find_spawn(&self.grid, &occupied, rng);

        self.roster.push(id.clone());
        self.players
            .insert(id.clone(), PlayerState::new(id, PlayerIndex(slot), position));
        self.painted_counts.insert(id.clone(), 0);
        info!("Player {} joined at ({:.1}, {:.1}) via {:?}", id, position.x, position.y, tier);
        events.push(WorldEvent::PlayerJoined {
            player: id.clone(),
            position,
            tier,
        });
    }

    fn apply_intent(&mut self, input: &PlayerInput, tick: u64, events: &mut Vec<WorldEvent>) {
        let id = &input.player_id;
        let Some(player) = self.players.get_mut(id) else {
            return;
        };

        let (dx, dy) = input.axes();
        if (dx, dy) != (0, 0) {
            player.last_direction = match (dx, dy) {
                (1, _) => Direction::Right,
                (-1, _) => Direction::Left,
                (_, 1) => Direction::Down,
                _ => Direction::Up,
            };

            let scale = if dx != 0 && dy != 0 { FRAC_1_SQRT_2 } else { 1.0 };
            let step = Vector2::new(f64::from(dx), f64::from(dy)) * player.speed() * scale;
            let target = player.position + step;

            if footprint_clear(&self.grid, &target, PLAYER_RADIUS) {
                player.position = target;
            } else if dx != 0 && dy != 0 {
                let slide_x = player.position + Vector2::new(step.x, 0.0);
                if footprint_clear(&self.grid, &slide_x, PLAYER_RADIUS) {
                    player.position = slide_x;
                }
                let slide_y = player.position + Vector2::new(0.0, step.y);
                if footprint_clear(&self.grid, &slide_y, PLAYER_RADIUS) {
                    player.position = slide_y;
                }
            } else if player.can_jump {
                let landing = player.cell().step(player.last_direction, 2);
                let obstacle = player.cell().step(player.last_direction, 1);
                if !self.grid.is_empty(obstacle)
                    && footprint_clear(&self.grid, &landing.center(), PLAYER_RADIUS)
                {
                    player.position = landing.center();
                    player.can_jump = false;
                    events.push(WorldEvent::PlayerJumped {
                        player: id.clone(),
                        to: landing,
                    });
                }
            }
        }

        if input.place_bomb && player.bombs_placed < player.max_bombs {
            let cell = player.cell();
            let occupied = self.bombs.iter().any(|bomb| bomb.cell() == cell);
            if !occupied && self.grid.is_empty(cell) {
                player.bombs_placed += 1;
                self.bombs.push(Bomb {
                    owner: id.clone(),
                    position: cell.center(),
                    placed_at: tick,
                    fuse_multiplier: player.fuse_multiplier,
                    exploded: false,
                });
                events.push(WorldEvent::BombPlaced {
                    player: id.clone(),
                    cell,
                });
            }
        }
    }

    fn collect_power_ups(&mut self, tick: u64, events: &mut Vec<WorldEvent>) {
        for (id, player) in self.players.iter_mut() {
            let cell = player.cell();
            if let Some(i) = self.power_ups.iter().position(|p| p.cell == cell) {
                let power_up = self.power_ups.remove(i);
                power_up.kind.apply(player, tick);
                events.push(WorldEvent::PowerUpCollected {
                    player: id.clone(),
                    kind: power_up.kind,
                });
            }
        }
    }
}

/// The player with the strictly highest count; any tie at the top yields
/// no winner.
fn leader(counts: &BTreeMap<PlayerId, u32>) -> Option<PlayerId> {
    let best = counts.values().copied().max()?;
    let mut leaders = counts.iter().filter(|(_, count)| **count == best);
    let (winner, _) = leaders.next()?;
    if leaders.next().is_some() {
        None
    } else {
        Some(winner.clone())
    }
}
