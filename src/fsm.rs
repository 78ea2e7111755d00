//! Menu state machine of the clock.
//!
//! The engine sequences the user-facing modes (showing the time, editing the
//! date, time, alarm or brightness, and the alarm going off) from one
//! [`InputSnapshot`] per tick. Each state is a pure function from the snapshot
//! to an optional [`Transition`] request and an output [`Token`]; the caller
//! turns the token into display, clock and buzzer side effects.
//!
//! # Tick protocol
//!
//! 1. A transition requested on the previous tick is applied: exit hook of the
//!    old state, switch, enter hook of the new state.
//! 2. The current state's logic runs and yields a token.
//! 3. Outside [`StateId::Alarming`], an active alarm overrides whatever the
//!    state requested with [`Transition::ToAlarming`].
//!
//! A transition requested on tick N is only visible in [`Engine::current`]
//! from tick N+1, and the token of tick N reflects the decision taken in the
//! old state:
//!
//! ```rust
//! use as1115_clock::fsm::{Engine, InputSnapshot, StateId, Token};
//!
//! let mut engine = Engine::new();
//! let date = InputSnapshot { set_date_level: true, ..Default::default() };
//! assert_eq!(engine.execute(&date), Token::StartSetYear);
//! assert_eq!(engine.current(), StateId::Default);
//!
//! assert_eq!(engine.execute(&InputSnapshot::default()), Token::SetYear);
//! assert_eq!(engine.current(), StateId::SetYear);
//! ```

use core::fmt;
use core::str::FromStr;

/// The modes the clock can be in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateId {
    Default,
    Alarming,
    SetYear,
    SetMonth,
    SetDay,
    SetHour,
    SetMin,
    SetAlarmHour,
    SetAlarmMin,
    SetBrightness,
}

impl StateId {
    pub const ALL: [StateId; 10] = [
        StateId::Default,
        StateId::Alarming,
        StateId::SetYear,
        StateId::SetMonth,
        StateId::SetDay,
        StateId::SetHour,
        StateId::SetMin,
        StateId::SetAlarmHour,
        StateId::SetAlarmMin,
        StateId::SetBrightness,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            StateId::Default => "default",
            StateId::Alarming => "alarming",
            StateId::SetYear => "set_year",
            StateId::SetMonth => "set_month",
            StateId::SetDay => "set_day",
            StateId::SetHour => "set_hour",
            StateId::SetMin => "set_min",
            StateId::SetAlarmHour => "set_alarm_hour",
            StateId::SetAlarmMin => "set_alarm_min",
            StateId::SetBrightness => "set_brightness",
        }
    }

    fn logic(self) -> StateLogic {
        STATE_LOGIC[self as usize]
    }

    fn on_enter(self) {
        trace!("fsm: enter {}", self.name());
    }

    fn on_exit(self) {
        trace!("fsm: exit {}", self.name());
    }
}

impl FromStr for StateId {
    type Err = FsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateId::ALL
            .into_iter()
            .find(|state| state.name() == s)
            .ok_or(FsmError::UnknownState)
    }
}

/// Named transitions. Each one leads to exactly one state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    ToAlarming,
    ToSetYear,
    ToSetMonth,
    ToSetDay,
    ToSetHour,
    ToSetMin,
    ToSetAlarmHour,
    ToSetAlarmMin,
    ToSetBrightness,
    ToDefault,
}

impl Transition {
    pub const ALL: [Transition; 10] = [
        Transition::ToAlarming,
        Transition::ToSetYear,
        Transition::ToSetMonth,
        Transition::ToSetDay,
        Transition::ToSetHour,
        Transition::ToSetMin,
        Transition::ToSetAlarmHour,
        Transition::ToSetAlarmMin,
        Transition::ToSetBrightness,
        Transition::ToDefault,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Transition::ToAlarming => "toAlarming",
            Transition::ToSetYear => "toSetYear",
            Transition::ToSetMonth => "toSetMonth",
            Transition::ToSetDay => "toSetDay",
            Transition::ToSetHour => "toSetHour",
            Transition::ToSetMin => "toSetMin",
            Transition::ToSetAlarmHour => "toSetAlarmHour",
            Transition::ToSetAlarmMin => "toSetAlarmMin",
            Transition::ToSetBrightness => "toSetBrightness",
            Transition::ToDefault => "toDefault",
        }
    }

    /// State this transition leads to.
    pub const fn target(self) -> StateId {
        match self {
            Transition::ToAlarming => StateId::Alarming,
            Transition::ToSetYear => StateId::SetYear,
            Transition::ToSetMonth => StateId::SetMonth,
            Transition::ToSetDay => StateId::SetDay,
            Transition::ToSetHour => StateId::SetHour,
            Transition::ToSetMin => StateId::SetMin,
            Transition::ToSetAlarmHour => StateId::SetAlarmHour,
            Transition::ToSetAlarmMin => StateId::SetAlarmMin,
            Transition::ToSetBrightness => StateId::SetBrightness,
            Transition::ToDefault => StateId::Default,
        }
    }
}

impl FromStr for Transition {
    type Err = FsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transition::ALL
            .into_iter()
            .find(|transition| transition.name() == s)
            .ok_or(FsmError::UnknownTransition)
    }
}

/// Output of one tick, consumed by the caller to drive side effects.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Token {
    Default,
    StartSetYear,
    SetYear,
    StartSetMonth,
    SetMonth,
    StartSetDay,
    SetDay,
    EndSetDay,
    StartSetHour,
    SetHour,
    StartSetMin,
    SetMin,
    EndSetMin,
    StartSetAlarm,
    SetAlarmHour,
    StartSetAlarmMin,
    SetAlarmMin,
    EndSetAlarmMin,
    /// Alarm edit cancelled; the alarm is switched off
    SetNoAlarm,
    StartSetBrightness,
    SetBrightness,
    EndSetBrightness,
    /// Brightness edit cancelled
    SetNoBrightness,
    Alarming,
    EndAlarming,
}

impl Token {
    pub const fn as_str(self) -> &'static str {
        match self {
            Token::Default => "default",
            Token::StartSetYear => "start_set_year",
            Token::SetYear => "set_year",
            Token::StartSetMonth => "start_set_month",
            Token::SetMonth => "set_month",
            Token::StartSetDay => "start_set_day",
            Token::SetDay => "set_day",
            Token::EndSetDay => "end_set_day",
            Token::StartSetHour => "start_set_hour",
            Token::SetHour => "set_hour",
            Token::StartSetMin => "start_set_min",
            Token::SetMin => "set_min",
            Token::EndSetMin => "end_set_min",
            Token::StartSetAlarm => "start_set_alarm",
            Token::SetAlarmHour => "set_alarm_hour",
            Token::StartSetAlarmMin => "start_set_alarm_min",
            Token::SetAlarmMin => "set_alarm_min",
            Token::EndSetAlarmMin => "end_set_alarm_min",
            Token::SetNoAlarm => "set_no_alarm",
            Token::StartSetBrightness => "start_set_brightness",
            Token::SetBrightness => "set_brightness",
            Token::EndSetBrightness => "end_set_brightness",
            Token::SetNoBrightness => "set_no_brightness",
            Token::Alarming => "alarming",
            Token::EndAlarming => "end_alarming",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs sampled once per tick. Never modified by the engine.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputSnapshot {
    /// Encoder button released this tick
    pub enter_edge: bool,
    /// Back button held
    pub back_level: bool,
    /// Set-date button held
    pub set_date_level: bool,
    /// Set-time button held
    pub set_time_level: bool,
    /// Set-alarm button held
    pub set_alarm_level: bool,
    /// Brightness button held
    pub set_brightness_level: bool,
    /// Alarm is sounding
    pub alarm_status_level: bool,
}

/// Errors from looking up states or transitions by name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsmError {
    UnknownState,
    UnknownTransition,
}

type Step = (Option<Transition>, Token);
type StateLogic = fn(&InputSnapshot) -> Step;

// Indexed by `StateId as usize`.
const STATE_LOGIC: [StateLogic; 10] = [
    default_logic,
    alarming_logic,
    set_year_logic,
    set_month_logic,
    set_day_logic,
    set_hour_logic,
    set_min_logic,
    set_alarm_hour_logic,
    set_alarm_min_logic,
    set_brightness_logic,
];

fn default_logic(input: &InputSnapshot) -> Step {
    if input.set_date_level {
        (Some(Transition::ToSetYear), Token::StartSetYear)
    } else if input.set_time_level {
        (Some(Transition::ToSetHour), Token::StartSetHour)
    } else if input.set_alarm_level {
        (Some(Transition::ToSetAlarmHour), Token::StartSetAlarm)
    } else if input.set_brightness_level {
        (Some(Transition::ToSetBrightness), Token::StartSetBrightness)
    } else {
        (None, Token::Default)
    }
}

fn alarming_logic(input: &InputSnapshot) -> Step {
    if input.alarm_status_level {
        (None, Token::Alarming)
    } else {
        (Some(Transition::ToDefault), Token::EndAlarming)
    }
}

/// Shared shape of the edit states: enter advances, back leaves, otherwise
/// keep editing.
fn edit(input: &InputSnapshot, advance: Step, back: Token, idle: Token) -> Step {
    if input.enter_edge {
        advance
    } else if input.back_level {
        (Some(Transition::ToDefault), back)
    } else {
        (None, idle)
    }
}

fn set_year_logic(input: &InputSnapshot) -> Step {
    let advance = (Some(Transition::ToSetMonth), Token::StartSetMonth);
    edit(input, advance, Token::SetYear, Token::SetYear)
}

fn set_month_logic(input: &InputSnapshot) -> Step {
    let advance = (Some(Transition::ToSetDay), Token::StartSetDay);
    edit(input, advance, Token::SetMonth, Token::SetMonth)
}

fn set_day_logic(input: &InputSnapshot) -> Step {
    let advance = (Some(Transition::ToDefault), Token::EndSetDay);
    edit(input, advance, Token::SetDay, Token::SetDay)
}

fn set_hour_logic(input: &InputSnapshot) -> Step {
    let advance = (Some(Transition::ToSetMin), Token::StartSetMin);
    edit(input, advance, Token::SetHour, Token::SetHour)
}

// Back commits the edited time just like enter.
fn set_min_logic(input: &InputSnapshot) -> Step {
    let advance = (Some(Transition::ToDefault), Token::EndSetMin);
    edit(input, advance, Token::EndSetMin, Token::SetMin)
}

fn set_alarm_hour_logic(input: &InputSnapshot) -> Step {
    let advance = (Some(Transition::ToSetAlarmMin), Token::StartSetAlarmMin);
    edit(input, advance, Token::SetNoAlarm, Token::SetAlarmHour)
}

fn set_alarm_min_logic(input: &InputSnapshot) -> Step {
    let advance = (Some(Transition::ToDefault), Token::EndSetAlarmMin);
    edit(input, advance, Token::SetNoAlarm, Token::SetAlarmMin)
}

fn set_brightness_logic(input: &InputSnapshot) -> Step {
    let advance = (Some(Transition::ToDefault), Token::EndSetBrightness);
    edit(input, advance, Token::SetNoBrightness, Token::SetBrightness)
}

/// Global guard: an active alarm pulls every other state into `Alarming`.
fn alarm_guard(state: StateId, input: &InputSnapshot) -> Option<Transition> {
    (state != StateId::Alarming && input.alarm_status_level).then_some(Transition::ToAlarming)
}

/// The state machine engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    current: StateId,
    previous: Option<StateId>,
    pending: Option<Transition>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine in [`StateId::Default`].
    pub const fn new() -> Self {
        Self::starting_in(StateId::Default)
    }

    pub const fn starting_in(state: StateId) -> Self {
        Self {
            current: state,
            previous: None,
            pending: None,
        }
    }

    pub fn current(&self) -> StateId {
        self.current
    }

    /// State left by the most recent applied transition.
    pub fn previous(&self) -> Option<StateId> {
        self.previous
    }

    /// Transition that will be applied at the start of the next tick.
    pub fn pending(&self) -> Option<Transition> {
        self.pending
    }

    /// Queues `transition` for the next tick, replacing any earlier request.
    pub fn request(&mut self, transition: Transition) {
        self.pending = Some(transition);
    }

    /// Queues a transition by its name, e.g. `"toSetYear"`.
    ///
    /// # Errors
    /// Returns [`FsmError::UnknownTransition`] if no transition has that name.
    pub fn request_named(&mut self, name: &str) -> Result<(), FsmError> {
        let transition = name.parse()?;
        self.request(transition);
        Ok(())
    }

    fn apply_pending(&mut self) {
        if let Some(transition) = self.pending.take() {
            let from = self.current;
            from.on_exit();
            self.previous = Some(from);
            self.current = transition.target();
            self.current.on_enter();
            debug!(
                "fsm: {} -> {} ({})",
                from.name(),
                self.current.name(),
                transition.name()
            );
        }
    }

    /// Runs one tick and returns its output token.
    pub fn execute(&mut self, input: &InputSnapshot) -> Token {
        self.apply_pending();
        let (requested, token) = (self.current.logic())(input);
        if let Some(transition) = alarm_guard(self.current, input).or(requested) {
            self.request(transition);
        }
        token
    }
}
