//! Stamina pool.
//!
//! Stamina regenerates and decays at configured rates, shaped by fill
//! curves. Named drains and gains add continuous rates on top, and one-off
//! costs are paid through [`StaminaGate::try_use`]. When the pool empties
//! it enters a cooldown that clears all drains and refuses new costs.
//!
//! The pool is ticked with real (unscaled) time.

use std::collections::BTreeMap;
use std::time::Duration;

use bevy::prelude::*;

/// Narrow contract the locomotion controller uses to pay for actions.
pub trait StaminaGate {
    /// Pay `amount` at once. Returns false and leaves the pool untouched when
    /// the balance is short or the pool is cooling down.
    fn try_use(&mut self, amount: f32) -> bool;
    /// Pay `amount` spread evenly over `seconds`.
    fn try_use_over(&mut self, amount: f32, seconds: f32) -> bool;
    /// Add a continuous drain. Adding an existing key has no effect.
    fn add_drain(&mut self, key: &str, rate: f32);
    fn remove_drain(&mut self, key: &str);
    fn is_empty(&self) -> bool;
    /// Balance as a fraction of the maximum, in `[0, 1]`.
    fn fill_fraction(&self) -> f32;
}

/// Rate multiplier as a function of the fill fraction.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum FillCurve {
    Constant(f32),
    /// Linear interpolation between the empty and full values.
    Linear { empty: f32, full: f32 },
}

impl Default for FillCurve {
    fn default() -> Self {
        Self::Constant(1.0)
    }
}

impl FillCurve {
    pub fn evaluate(&self, fill: f32) -> f32 {
        match *self {
            Self::Constant(value) => value,
            Self::Linear { empty, full } => empty + (full - empty) * fill.clamp(0.0, 1.0),
        }
    }
}

/// Notification recorded by the pool, forwarded as a [`StaminaEvent`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StaminaNotice {
    /// The balance moved by more than the change threshold this tick.
    Changed(f32),
    /// A cost was refused; the value is `balance - cost` (negative).
    Insufficient(f32),
}

/// Stamina notifications for an entity.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum StaminaEvent {
    Changed { entity: Entity, delta: f32 },
    Insufficient { entity: Entity, shortfall: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MeteredDrain {
    remaining: f32,
    rate: f32,
}

/// Stamina pool component.
///
/// # Example
///
/// ```rust
/// use rigid_locomotion::prelude::*;
///
/// let mut stamina = Stamina::new(100.0);
/// assert!(stamina.try_use(40.0));
/// assert!(!stamina.try_use(80.0));
/// assert_eq!(stamina.value, 60.0);
/// ```
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct Stamina {
    pub value: f32,
    pub min: f32,
    pub max: f32,
    /// Base regeneration per second.
    pub gain_rate: f32,
    /// Base decay per second.
    pub loss_rate: f32,
    /// Per-second change below which no `Changed` notice is emitted.
    pub change_threshold: f32,
    pub gain_curve: FillCurve,
    pub loss_curve: FillCurve,
    /// Regenerate even while drains are active.
    pub always_gain: bool,
    /// Cooldown after the pool empties (seconds).
    pub cooldown: f32,
    #[reflect(ignore)]
    drains: BTreeMap<String, f32>,
    #[reflect(ignore)]
    gains: BTreeMap<String, f32>,
    #[reflect(ignore)]
    metered: Vec<MeteredDrain>,
    #[reflect(ignore)]
    cooldown_timer: Option<Timer>,
    #[reflect(ignore)]
    notices: Vec<StaminaNotice>,
    last_value: f32,
    is_changing: bool,
}

impl Default for Stamina {
    fn default() -> Self {
        Self::new(1000.0)
    }
}

impl Stamina {
    /// Full pool with the given maximum.
    pub fn new(max: f32) -> Self {
        Self {
            value: max,
            min: 0.0,
            max,
            gain_rate: 20.0,
            loss_rate: 15.0,
            change_threshold: 1.0,
            gain_curve: FillCurve::default(),
            loss_curve: FillCurve::default(),
            always_gain: false,
            cooldown: 1.5,
            drains: BTreeMap::new(),
            gains: BTreeMap::new(),
            metered: Vec::new(),
            cooldown_timer: None,
            notices: Vec::new(),
            last_value: max,
            is_changing: false,
        }
    }

    /// Builder: set the current balance.
    pub fn with_value(mut self, value: f32) -> Self {
        self.value = value.clamp(self.min, self.max);
        self.last_value = self.value;
        self
    }

    /// Builder: set the base rates.
    pub fn with_rates(mut self, gain: f32, loss: f32) -> Self {
        self.gain_rate = gain;
        self.loss_rate = loss;
        self
    }

    /// Builder: set the fill curves.
    pub fn with_curves(mut self, gain: FillCurve, loss: FillCurve) -> Self {
        self.gain_curve = gain;
        self.loss_curve = loss;
        self
    }

    pub fn with_cooldown(mut self, seconds: f32) -> Self {
        self.cooldown = seconds;
        self
    }

    pub fn in_cooldown(&self) -> bool {
        self.cooldown_timer.is_some()
    }

    pub fn is_changing(&self) -> bool {
        self.is_changing
    }

    /// Total gain per second: base rate plus named gains.
    pub fn gain(&self) -> f32 {
        self.gain_rate + self.gains.values().sum::<f32>()
    }

    /// Total loss per second: base rate plus named drains.
    pub fn loss(&self) -> f32 {
        self.loss_rate + self.drains.values().sum::<f32>()
    }

    pub fn contains_drain(&self, key: &str) -> bool {
        self.drains.contains_key(key) && !self.in_cooldown()
    }

    /// Add a continuous gain. Adding an existing key has no effect.
    pub fn add_gain(&mut self, key: &str, rate: f32) {
        if rate == 0.0 || self.in_cooldown() {
            return;
        }
        self.gains.entry(key.to_owned()).or_insert(rate);
    }

    pub fn remove_gain(&mut self, key: &str) {
        self.gains.remove(key);
    }

    pub fn contains_gain(&self, key: &str) -> bool {
        self.gains.contains_key(key) && !self.in_cooldown()
    }

    /// Take the notices recorded since the last call.
    pub fn drain_notices(&mut self) -> impl Iterator<Item = StaminaNotice> + '_ {
        self.notices.drain(..)
    }

    /// Advance the pool by `delta` of real time.
    pub fn tick(&mut self, delta: Duration) {
        let dt = delta.as_secs_f32();

        if self.is_empty() && self.cooldown_timer.is_none() {
            let cooldown = if self.cooldown.is_finite() {
                self.cooldown.max(0.0)
            } else {
                0.0
            };
            debug!("stamina empty, cooling down for {cooldown}s");
            self.cooldown_timer = Some(Timer::from_seconds(cooldown, TimerMode::Once));
            self.drains.clear();
        }
        if let Some(timer) = self.cooldown_timer.as_mut() {
            timer.tick(delta);
            if timer.finished() {
                self.cooldown_timer = None;
            }
        }

        if self.gain_rate != self.loss_rate {
            let fill = self.fill_fraction();
            let regenerating = self.always_gain || self.drains.is_empty();
            if regenerating {
                self.value += self.gain_rate * dt * self.gain_curve.evaluate(fill);
            }
            self.value -= self.loss_rate * dt * self.loss_curve.evaluate(fill);
        }

        self.value -= self.drains.values().sum::<f32>() * dt;
        self.value += self.gains.values().sum::<f32>() * dt;

        for drain in &mut self.metered {
            let take = (drain.rate * dt).min(drain.remaining);
            drain.remaining -= take;
            self.value -= take;
        }
        self.metered.retain(|drain| drain.remaining > 0.0);

        self.value = self.value.clamp(self.min, self.max);

        let change = (self.last_value - self.value).abs();
        self.is_changing = self.last_value != self.value && change > self.change_threshold * dt;
        if self.is_changing {
            self.notices.push(StaminaNotice::Changed(change));
        }
        self.last_value = self.value;
    }

    fn refuse(&mut self, amount: f32) -> bool {
        trace!("stamina refused: cost {amount}, balance {}", self.value);
        self.notices.push(StaminaNotice::Insufficient(self.value - amount));
        false
    }
}

impl StaminaGate for Stamina {
    fn try_use(&mut self, amount: f32) -> bool {
        if self.value >= amount && !self.in_cooldown() {
            self.value -= amount;
            true
        } else {
            self.refuse(amount)
        }
    }

    fn try_use_over(&mut self, amount: f32, seconds: f32) -> bool {
        if self.value > amount && !self.in_cooldown() {
            self.metered.push(MeteredDrain {
                remaining: amount,
                rate: amount / seconds.max(f32::EPSILON),
            });
            true
        } else {
            self.refuse(amount)
        }
    }

    fn add_drain(&mut self, key: &str, rate: f32) {
        if rate == 0.0 || self.in_cooldown() {
            return;
        }
        self.drains.entry(key.to_owned()).or_insert(rate);
    }

    fn remove_drain(&mut self, key: &str) {
        self.drains.remove(key);
    }

    fn is_empty(&self) -> bool {
        self.value <= self.min
    }

    fn fill_fraction(&self) -> f32 {
        if self.max <= 0.0 {
            return 0.0;
        }
        (self.value / self.max).clamp(0.0, 1.0)
    }
}

/// Tick every stamina pool with real time and forward its notices.
pub fn tick_stamina(
    time: Res<Time<Real>>,
    mut q: Query<(Entity, &mut Stamina)>,
    mut events: EventWriter<StaminaEvent>,
) {
    for (entity, mut stamina) in &mut q {
        stamina.tick(time.delta());
        for notice in stamina.drain_notices() {
            events.write(match notice {
                StaminaNotice::Changed(delta) => StaminaEvent::Changed { entity, delta },
                StaminaNotice::Insufficient(shortfall) => {
                    StaminaEvent::Insufficient { entity, shortfall }
                }
            });
        }
    }
}
