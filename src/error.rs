use thiserror::Error;

/// Errors raised when a `MatchmakingConfig` fails validation at construction time.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tick_interval must be positive, got {0}")]
    InvalidTickInterval(f64),

    #[error("num_skill_buckets must be at least 1, got {0}")]
    InvalidSkillBuckets(usize),

    #[error("top_k_candidates must be at least 1, got {0}")]
    InvalidTopK(usize),

    #[error("{field} must be non-negative, got {value}")]
    NegativeParameter { field: &'static str, value: f64 },

    #[error("{field}_max ({max}) must be >= {field}_initial ({initial})")]
    BackoffCeilingBelowFloor {
        field: &'static str,
        initial: f64,
        max: f64,
    },

    #[error("distance-metric weights (geo, skill, input, platform) cannot all be zero")]
    AllDistanceWeightsZero,

    #[error("party_player_fraction must be in [0, 1], got {0}")]
    InvalidPartyFraction(f64),

    #[error("gamma must be positive, got {0}")]
    InvalidGamma(f64),

    #[error("blowout thresholds must satisfy mild < moderate < severe, got {mild}, {moderate}, {severe}")]
    InvalidBlowoutThresholds {
        mild: f64,
        moderate: f64,
        severe: f64,
    },

    #[error("skill_update_batch_size must be at least 1 when skill evolution is enabled")]
    InvalidSkillUpdateBatch,

    #[error("retention_config.retention_floor must be in [0, 1], got {0}")]
    InvalidRetentionFloor(f64),

    #[error("unknown or non-numeric config parameter: {0}")]
    UnknownParameter(String),
}

/// Errors raised by the engine's public surface outside of normal per-tick operation.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("generate_population must be called before tick()")]
    PopulationNotGenerated,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised by the party-management data-model operations.
#[derive(Debug, Error, PartialEq)]
pub enum PartyError {
    #[error("cannot create a party with no players")]
    EmptyParty,

    #[error("party size cannot exceed {max} players")]
    PartyTooLarge { max: usize },

    #[error("player {0} does not exist")]
    UnknownPlayer(usize),

    #[error("party {0} does not exist")]
    UnknownParty(usize),

    #[error("player {0} is already in a party")]
    AlreadyInParty(usize),

    #[error("player {0} is not in a valid state to join or leave a party")]
    InvalidPlayerState(usize),

    #[error("player {player} is not a member of party {party}")]
    NotAMember { player: usize, party: usize },

    #[error("party {0} is at maximum capacity")]
    PartyFull(usize),
}
