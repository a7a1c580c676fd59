//! Field catalogue for controller simulation logs.
//!
//! Names are fixed by the external simulator that writes the logs. The
//! prefix identifies the producer:
//! - `Q_`: the learned (Q-learning) controller
//! - `PID_`: the baseline linear controller
//! - `Ref_`: the reference trajectory
//! - `DEBUG_`: per-update Q-learning instrumentation

// ---------------------------------------------------------------------------
// Learned controller
// ---------------------------------------------------------------------------

pub const Q_ERROR: &str = "Q_e";
pub const Q_ERROR_DERIVATIVE: &str = "Q_de";
pub const Q_ERROR_SECOND_DERIVATIVE: &str = "Q_de2";
pub const Q_STATE_VALUE: &str = "Q_stan_value";
pub const Q_STATE_INDEX: &str = "Q_stan_nr";
pub const Q_ACTION_VALUE: &str = "Q_akcja_value";
pub const Q_ACTION_VALUE_NO_PROJECTION: &str = "Q_akcja_value_bez_f_rzutujacej";
pub const Q_ACTION_INDEX: &str = "Q_akcja_nr";
pub const Q_PROJECTION: &str = "Q_funkcja_rzut";
pub const Q_REWARD: &str = "Q_R";
/// 1 = exploration, 0 = exploitation.
pub const Q_EXPLORATION: &str = "Q_losowanie";
pub const Q_OUTPUT: &str = "Q_y";
pub const Q_OUTPUT_DELTA: &str = "Q_delta_y";
pub const Q_CONTROL: &str = "Q_u";
pub const Q_CONTROL_INCREMENT: &str = "Q_u_increment";
pub const Q_CONTROL_INCREMENT_NO_PROJECTION: &str = "Q_u_increment_bez_f_rzutujacej";
pub const Q_TIME: &str = "Q_t";
pub const Q_DISTURBANCE: &str = "Q_d";
pub const Q_SETPOINT: &str = "Q_SP";
pub const Q_DISTURBANCE_TIME: &str = "Q_czas_zaklocenia";
pub const Q_MAX_STATE: &str = "Q_maxS";
pub const Q_TABLE_UPDATE: &str = "Q_table_update";

// ---------------------------------------------------------------------------
// Baseline controller and reference trajectory
// ---------------------------------------------------------------------------

pub const PI_ERROR: &str = "PID_e";
pub const PI_ERROR_DERIVATIVE: &str = "PID_de";
pub const PI_ERROR_SECOND_DERIVATIVE: &str = "PID_de2";
pub const PI_OUTPUT: &str = "PID_y";
pub const PI_CONTROL: &str = "PID_u";
pub const PI_OUTPUT_DELTA: &str = "PID_delta_y";

pub const REF_ERROR: &str = "Ref_e";
pub const REF_OUTPUT: &str = "Ref_y";
pub const REF_ERROR_DERIVATIVE: &str = "Ref_de";
pub const REF_ERROR_SECOND_DERIVATIVE: &str = "Ref_de2";
pub const REF_STATE_VALUE: &str = "Ref_stan_value";
pub const REF_STATE_INDEX: &str = "Ref_stan_nr";

// ---------------------------------------------------------------------------
// Q-learning instrumentation
// ---------------------------------------------------------------------------

pub const DEBUG_OLD_STATE: &str = "DEBUG_old_state";
pub const DEBUG_OLD_ACTION: &str = "DEBUG_old_action";
pub const DEBUG_OLD_REWARD: &str = "DEBUG_old_R";
pub const DEBUG_OLD_LEARNING: &str = "DEBUG_old_uczenie";
/// Next state as recorded after the delayed (dead-time) buffer.
pub const DEBUG_NEXT_STATE: &str = "DEBUG_stan_T0";
/// Next state actually used for the bootstrap term (after goal override).
pub const DEBUG_BOOTSTRAP_STATE: &str = "DEBUG_stan_T0_for_bootstrap";
/// State being updated (buffered).
pub const DEBUG_UPDATE_STATE: &str = "DEBUG_old_stan_T0";
/// Action being updated (buffered).
pub const DEBUG_UPDATE_ACTION: &str = "DEBUG_wyb_akcja_T0";
/// 1 when this step performed a Q-table update.
pub const DEBUG_LEARNING: &str = "DEBUG_uczenie_T0";
pub const DEBUG_REWARD: &str = "DEBUG_R_buffered";
pub const DEBUG_Q_OLD: &str = "DEBUG_Q_old_value";
pub const DEBUG_Q_NEW: &str = "DEBUG_Q_new_value";
pub const DEBUG_BOOTSTRAP: &str = "DEBUG_bootstrap";
pub const DEBUG_TD_ERROR: &str = "DEBUG_TD_error";
pub const DEBUG_GLOBAL_MAX_Q: &str = "DEBUG_global_max_Q";
pub const DEBUG_GLOBAL_MAX_STATE: &str = "DEBUG_global_max_state";
pub const DEBUG_GLOBAL_MAX_ACTION: &str = "DEBUG_global_max_action";
pub const DEBUG_GOAL_Q: &str = "DEBUG_goal_Q";
pub const DEBUG_IS_GOAL_STATE: &str = "DEBUG_is_goal_state";
pub const DEBUG_IS_UPDATING_GOAL: &str = "DEBUG_is_updating_goal";

/// Fields consulted, in order, to determine the sample count.
pub const SAMPLE_COUNT_CANDIDATES: &[&str] = &[Q_ERROR, Q_TIME, DEBUG_OLD_STATE];

pub const DEBUG_FIELDS: &[&str] = &[
    DEBUG_OLD_STATE,
    DEBUG_OLD_ACTION,
    DEBUG_OLD_REWARD,
    DEBUG_OLD_LEARNING,
    DEBUG_NEXT_STATE,
    DEBUG_BOOTSTRAP_STATE,
    DEBUG_UPDATE_STATE,
    DEBUG_UPDATE_ACTION,
    DEBUG_LEARNING,
    DEBUG_REWARD,
    DEBUG_Q_OLD,
    DEBUG_Q_NEW,
    DEBUG_BOOTSTRAP,
    DEBUG_TD_ERROR,
    DEBUG_GLOBAL_MAX_Q,
    DEBUG_GLOBAL_MAX_STATE,
    DEBUG_GLOBAL_MAX_ACTION,
    DEBUG_GOAL_Q,
    DEBUG_IS_GOAL_STATE,
    DEBUG_IS_UPDATING_GOAL,
];

pub const Q_CONTROLLER_FIELDS: &[&str] = &[
    Q_ERROR,
    Q_ERROR_DERIVATIVE,
    Q_ERROR_SECOND_DERIVATIVE,
    Q_STATE_VALUE,
    Q_STATE_INDEX,
    Q_ACTION_VALUE,
    Q_ACTION_VALUE_NO_PROJECTION,
    Q_ACTION_INDEX,
    Q_PROJECTION,
    Q_REWARD,
    Q_EXPLORATION,
    Q_OUTPUT,
    Q_OUTPUT_DELTA,
    Q_CONTROL,
    Q_CONTROL_INCREMENT,
    Q_CONTROL_INCREMENT_NO_PROJECTION,
    Q_TIME,
    Q_DISTURBANCE,
    Q_SETPOINT,
    Q_DISTURBANCE_TIME,
    Q_MAX_STATE,
    Q_TABLE_UPDATE,
];

pub const PI_CONTROLLER_FIELDS: &[&str] = &[
    PI_ERROR,
    PI_ERROR_DERIVATIVE,
    PI_ERROR_SECOND_DERIVATIVE,
    PI_OUTPUT,
    PI_CONTROL,
    PI_OUTPUT_DELTA,
];

pub const REF_TRAJECTORY_FIELDS: &[&str] = &[
    REF_ERROR,
    REF_OUTPUT,
    REF_ERROR_DERIVATIVE,
    REF_ERROR_SECOND_DERIVATIVE,
    REF_STATE_VALUE,
    REF_STATE_INDEX,
];

/// Well-known field families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    Debug,
    QController,
    PiController,
    Reference,
}

impl FieldGroup {
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            FieldGroup::Debug => DEBUG_FIELDS,
            FieldGroup::QController => Q_CONTROLLER_FIELDS,
            FieldGroup::PiController => PI_CONTROLLER_FIELDS,
            FieldGroup::Reference => REF_TRAJECTORY_FIELDS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldGroup::Debug => "debug",
            FieldGroup::QController => "q_controller",
            FieldGroup::PiController => "pi_controller",
            FieldGroup::Reference => "reference",
        }
    }

    pub fn all() -> [FieldGroup; 4] {
        [
            FieldGroup::Debug,
            FieldGroup::QController,
            FieldGroup::PiController,
            FieldGroup::Reference,
        ]
    }
}
