pub mod settings_controller;

pub use settings_controller::{
    apply_style_command, install_defaults, reset_to_defaults, toggle_styles, update_settings,
};
