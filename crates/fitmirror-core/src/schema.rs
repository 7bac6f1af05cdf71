//! Fixed destination property names, one module per collection.

pub mod activity {
    pub const NAME: &str = "Activity Name";
    pub const DATE: &str = "Date";
    pub const CATEGORY: &str = "Activity Type";
    pub const SUBCATEGORY: &str = "Subactivity Type";
    pub const DISTANCE_KM: &str = "Distance (km)";
    pub const DURATION_MIN: &str = "Duration (min)";
    pub const CALORIES: &str = "Calories";
    pub const AVG_PACE: &str = "Avg Pace";
    pub const AVG_POWER: &str = "Avg Power";
    pub const MAX_POWER: &str = "Max Power";
    pub const TRAINING_EFFECT: &str = "Training Effect";
    pub const AEROBIC: &str = "Aerobic";
    pub const AEROBIC_EFFECT: &str = "Aerobic Effect";
    pub const ANAEROBIC: &str = "Anaerobic";
    pub const ANAEROBIC_EFFECT: &str = "Anaerobic Effect";
    pub const PERSONAL_RECORD: &str = "PR";
    pub const FAVORITE: &str = "Fav";
    pub const EXTERNAL_ID: &str = "Garmin ID";
}

pub mod steps {
    pub const TITLE: &str = "Activity Type";
    pub const TITLE_VALUE: &str = "Daily Steps";
    pub const DATE: &str = "Date";
    pub const TOTAL_STEPS: &str = "Total Steps";
    pub const TOTAL_DISTANCE_KM: &str = "Total Distance (km)";
    pub const STEP_GOAL: &str = "Step Goal";
}

pub mod sleep {
    pub const TITLE: &str = "Date";
    pub const DATE: &str = "Long Date";
    pub const TIMES: &str = "Times";
    pub const TOTAL: &str = "Total Sleep";
    pub const TOTAL_HOURS: &str = "Total Sleep (h)";
    pub const DEEP: &str = "Deep Sleep";
    pub const DEEP_HOURS: &str = "Deep Sleep (h)";
    pub const LIGHT: &str = "Light Sleep";
    pub const LIGHT_HOURS: &str = "Light Sleep (h)";
    pub const REM: &str = "REM Sleep";
    pub const REM_HOURS: &str = "REM Sleep (h)";
    pub const AWAKE: &str = "Awake Time";
    pub const AWAKE_HOURS: &str = "Awake Time (h)";
    pub const RESTING_HR: &str = "Resting HR";
    pub const GOAL_MET: &str = "Sleep Goal";
    /// Seven hours.
    pub const GOAL_SECONDS: f64 = 25_200.0;
}

pub mod records {
    pub const TITLE: &str = "Record";
    pub const DATE: &str = "Date";
    pub const CATEGORY: &str = "Activity Type";
    pub const TYPE_ID: &str = "typeId";
    pub const CURRENT: &str = "PR";
    pub const VALUE: &str = "Value";
    pub const PACE: &str = "Pace";
}
