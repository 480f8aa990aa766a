pub mod settings_cache;
pub mod settings_record;
pub mod storage_change;

pub use settings_cache::{CursorPreferences, SettingsCache, SharedSettingsCache};
pub use settings_record::{
    CursorSize, CursorTheme, FontSize, FontStyle, FontWeight, SettingsPatch, SettingsRecord,
    ThemeMode, keys, local_keys,
};
pub use storage_change::{ChangeBatch, StorageArea, StorageChange};
