//! Danger assessment for a single visible hostile.
//! Pure and memoryless: the same inputs always give the same recommendation.

/// Ordered from least to most dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ThreatTier {
    Safe,
    Low,
    Medium,
    High,
    Critical,
    NeverMelee,
}

impl ThreatTier {
    fn raised(self) -> ThreatTier {
        match self {
            ThreatTier::Safe => ThreatTier::Low,
            ThreatTier::Low => ThreatTier::Medium,
            ThreatTier::Medium => ThreatTier::High,
            ThreatTier::High | ThreatTier::Critical => ThreatTier::Critical,
            ThreatTier::NeverMelee => ThreatTier::NeverMelee,
        }
    }

    /// Minimum HP ratio required before meleeing a hostile of this tier.
    pub fn engage_threshold(self) -> f32 {
        match self {
            ThreatTier::Safe => 0.0,
            ThreatTier::Low => 0.25,
            ThreatTier::Medium => 0.4,
            ThreatTier::High => 0.6,
            ThreatTier::Critical => 0.9,
            ThreatTier::NeverMelee => f32::INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatDecision {
    Engage,
    Flee,
    Ignore,
}

#[derive(Debug, Clone, Copy)]
pub struct ThreatContext {
    pub symbol: char,
    pub hp: i32,
    pub max_hp: i32,
    pub xp_level: i32,
    pub depth: i32,
    /// Hostile stands on the agent's next intended step.
    pub blocking: bool,
    /// Other hostiles close by, not counting this one.
    pub nearby_hostiles: usize,
    pub in_corridor: bool,
}

impl ThreatContext {
    pub fn hp_ratio(&self) -> f32 {
        if self.max_hp <= 0 {
            return 1.0;
        }
        (self.hp as f32 / self.max_hp as f32).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreatAssessment {
    pub tier: ThreatTier,
    pub decision: ThreatDecision,
    pub reason: String,
}

/// Touching these, or hitting them, can end the run outright.
pub const NEVER_MELEE: [char; 2] = ['c', 'e'];
const CRITICAL: [char; 5] = ['D', 'L', 'V', '&', ';'];
const HIGH: [char; 8] = ['H', 'T', 'U', 'X', 'N', 'C', 'n', 'q'];
const MEDIUM: [char; 8] = ['a', 's', 'S', 'o', 'h', 'G', 'f', 'Z'];
const LOW: [char; 8] = ['d', 'r', 'k', 'b', 'j', 'F', 'y', 'w'];
const SAFE: [char; 3] = ['x', ':', 'z'];

/// Every symbol with a fixed tier entry.
pub fn known_symbols() -> impl Iterator<Item = char> {
    NEVER_MELEE
        .into_iter()
        .chain(CRITICAL)
        .chain(HIGH)
        .chain(MEDIUM)
        .chain(LOW)
        .chain(SAFE)
}

/// Danger tier from the symbol, scaled by the agent's situation.
pub fn threat_tier(ctx: &ThreatContext) -> ThreatTier {
    let symbol = ctx.symbol;
    if NEVER_MELEE.contains(&symbol) {
        return ThreatTier::NeverMelee;
    }
    if CRITICAL.contains(&symbol) {
        return ThreatTier::Critical;
    }
    if HIGH.contains(&symbol) {
        return ThreatTier::High;
    }

    let base = if MEDIUM.contains(&symbol) {
        ThreatTier::Medium
    } else if LOW.contains(&symbol) {
        ThreatTier::Low
    } else if SAFE.contains(&symbol) {
        ThreatTier::Safe
    } else if symbol.is_uppercase() {
        if ctx.depth > 4 || ctx.xp_level < 5 {
            ThreatTier::High
        } else {
            ThreatTier::Medium
        }
    } else if ctx.depth >= 8 {
        ThreatTier::Medium
    } else {
        ThreatTier::Low
    };

    let mut tier = base;
    if base >= ThreatTier::Low && ctx.depth > ctx.xp_level * 2 {
        tier = tier.raised();
    }
    if ctx.hp_ratio() < 0.33 && tier != ThreatTier::Safe {
        tier = tier.raised();
    }
    tier
}

/// Engage, flee or ignore a visible hostile.
pub fn assess(ctx: &ThreatContext) -> ThreatAssessment {
    let tier = threat_tier(ctx);
    let ratio = ctx.hp_ratio();
    let verdict = |decision, reason: String| ThreatAssessment {
        tier,
        decision,
        reason,
    };

    if tier == ThreatTier::NeverMelee {
        return verdict(
            ThreatDecision::Flee,
            format!("'{}' must never be meleed", ctx.symbol),
        );
    }
    if ctx.nearby_hostiles >= 2 && !ctx.in_corridor {
        return verdict(
            ThreatDecision::Flee,
            format!(
                "outnumbered by {} others in the open",
                ctx.nearby_hostiles
            ),
        );
    }

    let threshold = tier.engage_threshold();
    if matches!(tier, ThreatTier::Safe | ThreatTier::Low) {
        if !ctx.blocking {
            return verdict(
                ThreatDecision::Ignore,
                format!("'{}' is {:?} and not in the way", ctx.symbol, tier),
            );
        }
        if ratio >= threshold {
            return verdict(
                ThreatDecision::Engage,
                format!("'{}' blocks the path, hp {:.0}%", ctx.symbol, ratio * 100.0),
            );
        }
        return verdict(
            ThreatDecision::Flee,
            format!("'{}' blocks the path but hp is {:.0}%", ctx.symbol, ratio * 100.0),
        );
    }

    if ratio >= threshold {
        verdict(
            ThreatDecision::Engage,
            format!("{:?} '{}' with hp {:.0}%", tier, ctx.symbol, ratio * 100.0),
        )
    } else {
        verdict(
            ThreatDecision::Flee,
            format!(
                "{:?} '{}' needs hp {:.0}%, have {:.0}%",
                tier,
                ctx.symbol,
                threshold * 100.0,
                ratio * 100.0
            ),
        )
    }
}
