//! Age-appropriate presentation settings per grade, fixed at build time.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonSize {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub primary_color: &'static str,
    pub secondary_color: &'static str,
    pub background_color: &'static str,
    pub font_size: &'static str,
    pub button_size: ButtonSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub show_complexity_level: bool,
    pub show_time_tracking: bool,
    pub show_detailed_progress: bool,
    pub allow_skipping: bool,
    pub require_confirmation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interactions {
    pub has_audio: bool,
    pub has_animations: bool,
    pub drag_and_drop: bool,
    pub touch_optimized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    pub show_breadcrumbs: bool,
    pub max_menu_depth: u8,
    pub auto_advance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeUiConfig {
    pub grade_level: &'static str,
    pub theme: Theme,
    pub features: Features,
    pub interactions: Interactions,
    pub navigation: Navigation,
}

const EARLY_FEATURES: Features = Features {
    show_complexity_level: false,
    show_time_tracking: false,
    show_detailed_progress: false,
    allow_skipping: false,
    require_confirmation: true,
};

const UPPER_FEATURES: Features = Features {
    show_complexity_level: true,
    show_time_tracking: true,
    show_detailed_progress: true,
    allow_skipping: true,
    require_confirmation: false,
};

const TOUCH_INTERACTIONS: Interactions = Interactions {
    has_audio: true,
    has_animations: true,
    drag_and_drop: true,
    touch_optimized: true,
};

const fn interactions(has_animations: bool, drag_and_drop: bool) -> Interactions {
    Interactions {
        has_audio: false,
        has_animations,
        drag_and_drop,
        touch_optimized: false,
    }
}

const fn theme(
    primary_color: &'static str,
    secondary_color: &'static str,
    background_color: &'static str,
    font_size: &'static str,
    button_size: ButtonSize,
) -> Theme {
    Theme {
        primary_color,
        secondary_color,
        background_color,
        font_size,
        button_size,
    }
}

const fn navigation(show_breadcrumbs: bool, max_menu_depth: u8, auto_advance: bool) -> Navigation {
    Navigation {
        show_breadcrumbs,
        max_menu_depth,
        auto_advance,
    }
}

static CONFIGS: [GradeUiConfig; 9] = [
    GradeUiConfig {
        grade_level: "K",
        theme: theme("#FF6B6B", "#4ECDC4", "#FFF9C4", "18px", ButtonSize::Large),
        features: EARLY_FEATURES,
        interactions: TOUCH_INTERACTIONS,
        navigation: navigation(false, 1, true),
    },
    GradeUiConfig {
        grade_level: "1",
        theme: theme("#45B7D1", "#96CEB4", "#FFEAA7", "17px", ButtonSize::Large),
        features: EARLY_FEATURES,
        interactions: TOUCH_INTERACTIONS,
        navigation: navigation(false, 2, true),
    },
    GradeUiConfig {
        grade_level: "2",
        theme: theme("#6C5CE7", "#A29BFE", "#DDA0DD", "16px", ButtonSize::Medium),
        features: Features {
            show_time_tracking: true,
            ..EARLY_FEATURES
        },
        interactions: TOUCH_INTERACTIONS,
        navigation: navigation(true, 2, false),
    },
    GradeUiConfig {
        grade_level: "3",
        theme: theme("#00B894", "#55A3FF", "#E8F4FD", "16px", ButtonSize::Medium),
        features: UPPER_FEATURES,
        interactions: interactions(true, true),
        navigation: navigation(true, 3, false),
    },
    GradeUiConfig {
        grade_level: "4",
        theme: theme("#E17055", "#FDCB6E", "#F8F9FA", "15px", ButtonSize::Medium),
        features: UPPER_FEATURES,
        interactions: interactions(true, true),
        navigation: navigation(true, 3, false),
    },
    GradeUiConfig {
        grade_level: "5",
        theme: theme("#0984E3", "#74B9FF", "#F1F3F4", "15px", ButtonSize::Medium),
        features: UPPER_FEATURES,
        interactions: interactions(false, true),
        navigation: navigation(true, 4, false),
    },
    GradeUiConfig {
        grade_level: "6",
        theme: theme("#6C5CE7", "#A29BFE", "#FFFFFF", "14px", ButtonSize::Medium),
        features: UPPER_FEATURES,
        interactions: interactions(false, true),
        navigation: navigation(true, 4, false),
    },
    GradeUiConfig {
        grade_level: "7",
        theme: theme("#00B894", "#00CEC9", "#FFFFFF", "14px", ButtonSize::Small),
        features: UPPER_FEATURES,
        interactions: interactions(false, false),
        navigation: navigation(true, 5, false),
    },
    GradeUiConfig {
        grade_level: "8",
        theme: theme("#2D3436", "#636E72", "#FFFFFF", "14px", ButtonSize::Small),
        features: UPPER_FEATURES,
        interactions: interactions(false, false),
        navigation: navigation(true, 5, false),
    },
];

pub fn ui_config(grade_code: &str) -> Option<&'static GradeUiConfig> {
    CONFIGS.iter().find(|config| config.grade_level == grade_code)
}
