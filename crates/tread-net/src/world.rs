//! Server-authored world state carried by [`WorldSnapshot`](crate::messages::WorldSnapshot)
//! and [`JoinResponse`](crate::messages::JoinResponse).
//!
//! The client treats these as opaque data for renderers and the HUD; nothing
//! in the sync layer interprets them.

use serde::{Deserialize, Serialize};

/// 2D vector.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

/// 3D vector.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Team a tank or projectile belongs to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TeamColor {
    #[default]
    Neutral,
    Red,
    Blue,
    Npc,
}

/// Kinds of pickup.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PowerUpType {
    #[default]
    None,
    Shield,
    Cloak,
    Speed,
    RapidFire,
}

/// A power-up currently affecting a tank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivePowerUp {
    pub power_up_type: PowerUpType,
    pub duration_remaining: f32,
    pub total_duration: f32,
}

/// Authoritative tank state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TankState {
    pub entity_id: u32,
    pub player_id: String,
    pub display_name: String,
    pub position: Vector3,
    /// Hull heading in radians.
    pub body_rotation: f32,
    /// Turret heading in radians.
    pub turret_rotation: f32,
    pub health: u32,
    pub max_health: u32,
    pub team: TeamColor,
    pub active_powerups: Vec<ActivePowerUp>,
    pub is_invulnerable: bool,
    pub invulnerability_remaining: f32,
}

/// A projectile in flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectileState {
    pub entity_id: u32,
    pub owner_id: String,
    pub position: Vector3,
    pub velocity: Vector3,
    pub damage: u32,
    pub team: TeamColor,
    pub lifetime_remaining: f32,
}

/// A pickup on the map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PowerUpState {
    pub entity_id: u32,
    pub power_up_type: PowerUpType,
    pub position: Vector3,
    pub is_available: bool,
    pub respawn_timer: f32,
}

/// Scoreboard row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerScore {
    pub player_id: String,
    pub display_name: String,
    pub kills: u32,
    pub deaths: u32,
    pub score: i32,
}

/// A discrete gameplay event reported alongside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEvent {
    /// Server time of the event (Unix milliseconds).
    pub timestamp_ms: u64,
    pub kind: GameEventKind,
}

/// What happened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GameEventKind {
    PlayerJoined {
        player_id: String,
        display_name: String,
        entity_id: u32,
    },
    PlayerLeft {
        player_id: String,
        display_name: String,
    },
    TankDestroyed {
        victim_entity_id: u32,
        victim_player_id: String,
        killer_entity_id: u32,
        killer_player_id: String,
        explosion_position: Vector3,
    },
    PowerUpPickedUp {
        player_id: String,
        tank_entity_id: u32,
        power_up_type: PowerUpType,
        power_up_entity_id: u32,
    },
    ProjectileHit {
        projectile_entity_id: u32,
        target_entity_id: u32,
        hit_position: Vector3,
        damage_dealt: u32,
    },
    Chat {
        player_id: String,
        display_name: String,
        message: String,
    },
    RoundStarted {
        round_number: u32,
        round_duration: f32,
    },
    RoundEnded {
        round_number: u32,
        final_scores: Vec<PlayerScore>,
        winner_player_id: String,
    },
}

/// Match settings handed to a client when it joins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    pub tick_rate: u32,
    pub max_players: u32,
    /// Seconds.
    pub round_duration: f32,
    /// Seconds.
    pub respawn_time: f32,
    /// Seconds.
    pub invulnerability_time: f32,
    pub map_size: Vector2,
}
